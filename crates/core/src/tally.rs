//! Vote tally and tie-breaking

use rand::seq::SliceRandom;
use rand::Rng;

/// Winning option chosen from a set of per-option counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TallyOutcome {
    /// Index into the round's reveal order
    pub option_index: usize,
    /// Votes for the winning option
    pub votes: u32,
    /// Votes across all options
    pub total_votes: u32,
    pub tie_broken: bool,
    /// How many options shared the maximum
    pub tied_count: u32,
}

/// Pick the option with the most votes, breaking ties uniformly at random.
///
/// Returns `None` when no votes were cast.
pub fn select_winner<R: Rng + ?Sized>(counts: &[u32], rng: &mut R) -> Option<TallyOutcome> {
    let total_votes: u32 = counts.iter().sum();
    if total_votes == 0 {
        return None;
    }

    let max = counts.iter().copied().max()?;
    let leaders: Vec<usize> = counts
        .iter()
        .enumerate()
        .filter(|(_, &count)| count == max)
        .map(|(index, _)| index)
        .collect();

    let option_index = *leaders.choose(rng)?;
    let tied_count = leaders.len() as u32;

    Some(TallyOutcome {
        option_index,
        votes: max,
        total_votes,
        tie_broken: tied_count > 1,
        tied_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_clear_winner() {
        let mut rng = StdRng::seed_from_u64(1);
        let outcome = select_winner(&[1, 3, 0], &mut rng).unwrap();
        assert_eq!(outcome.option_index, 1);
        assert_eq!(outcome.votes, 3);
        assert_eq!(outcome.total_votes, 4);
        assert!(!outcome.tie_broken);
        assert_eq!(outcome.tied_count, 1);
    }

    #[test]
    fn test_two_way_tie() {
        let mut rng = StdRng::seed_from_u64(2);
        let outcome = select_winner(&[1, 1, 0], &mut rng).unwrap();
        assert!(outcome.tie_broken);
        assert_eq!(outcome.tied_count, 2);
        assert!(outcome.option_index < 2);
        assert_eq!(outcome.votes, 1);
    }

    #[test]
    fn test_tie_break_reaches_every_tied_option() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut seen = HashSet::new();
        for _ in 0..200 {
            let outcome = select_winner(&[2, 0, 2, 2], &mut rng).unwrap();
            assert_eq!(outcome.tied_count, 3);
            seen.insert(outcome.option_index);
        }
        assert_eq!(seen, HashSet::from([0, 2, 3]));
    }

    #[test]
    fn test_no_votes() {
        let mut rng = StdRng::seed_from_u64(4);
        assert!(select_winner(&[0, 0], &mut rng).is_none());
        assert!(select_winner(&[], &mut rng).is_none());
    }
}

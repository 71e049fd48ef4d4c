//! Room model - the aggregate root of one spin-and-vote session

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MatchType, Member, Restaurant};
use crate::error::{Error, Result};
use crate::registry::MemberRegistry;

/// Lowest and highest 4-digit room codes
pub const MIN_ROOM_CODE: u16 = 1000;
pub const MAX_ROOM_CODE: u16 = 9999;

/// 4-digit numeric room code, unique across active rooms
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(u16);

impl RoomCode {
    pub fn new(value: u16) -> Result<Self> {
        if (MIN_ROOM_CODE..=MAX_ROOM_CODE).contains(&value) {
            Ok(Self(value))
        } else {
            Err(Error::Validation(format!(
                "room code must be 4 digits, got {}",
                value
            )))
        }
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

impl std::fmt::Display for RoomCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

impl FromStr for RoomCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != 4 || !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::Validation(format!("invalid room code '{}'", s)));
        }
        let value = s
            .parse::<u16>()
            .map_err(|e| Error::Validation(format!("invalid room code '{}': {}", s, e)))?;
        Self::new(value)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.to_string()
    }
}

/// Room lifecycle states. `Complete` loops back to `Spinning` on a new round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomState {
    Waiting,
    Spinning,
    Revealing,
    Voting,
    Complete,
}

impl RoomState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomState::Waiting => "waiting",
            RoomState::Spinning => "spinning",
            RoomState::Revealing => "revealing",
            RoomState::Voting => "voting",
            RoomState::Complete => "complete",
        }
    }
}

impl std::fmt::Display for RoomState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One member's matched restaurant for a round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spin {
    pub member_id: String,
    pub member_name: String,
    /// Copy of the matched row; `None` only when the dataset was empty
    pub restaurant: Option<Restaurant>,
    pub match_type: MatchType,
    pub round: u32,
    pub revealed: bool,
}

/// A member's ballot for the current round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    /// Index into the round's reveal order
    pub option_index: usize,
    pub confirmed: bool,
}

/// The option the room settled on for a round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Winner {
    pub restaurant: Option<Restaurant>,
    pub member_id: String,
    pub member_name: String,
    pub match_type: MatchType,
    pub option_index: usize,
    /// Confirmed votes for the winning option
    pub votes: u32,
    /// All confirmed votes in the round
    pub total_votes: u32,
    pub tie_broken: bool,
    pub tied_count: u32,
    pub selected_at: DateTime<Utc>,
}

/// A room session, stored and loaded as a single document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub code: RoomCode,
    pub state: RoomState,
    pub current_round: u32,
    pub members: MemberRegistry,
    pub turn_order: Vec<String>,
    pub current_turn_index: usize,
    pub spins: Vec<Spin>,
    pub reveal_order: Vec<usize>,
    pub votes: BTreeMap<String, Vote>,
    pub winner: Option<Winner>,
    /// Bumped on every committed write, used for compare-and-swap
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Room {
    pub fn new(code: RoomCode, owner: Member) -> Self {
        let now = Utc::now();
        Self {
            code,
            state: RoomState::Waiting,
            current_round: 0,
            members: MemberRegistry::new(owner),
            turn_order: Vec::new(),
            current_turn_index: 0,
            spins: Vec::new(),
            reveal_order: Vec::new(),
            votes: BTreeMap::new(),
            winner: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Member due to spin next, while spinning
    pub fn current_turn_member_id(&self) -> Option<&str> {
        if self.state != RoomState::Spinning {
            return None;
        }
        self.turn_order
            .get(self.current_turn_index)
            .map(|s| s.as_str())
    }

    /// Confirmed votes per option, indexed like `reveal_order`
    pub fn confirmed_vote_counts(&self) -> Vec<u32> {
        let mut counts = vec![0u32; self.reveal_order.len()];
        for vote in self.votes.values().filter(|v| v.confirmed) {
            if let Some(count) = counts.get_mut(vote.option_index) {
                *count += 1;
            }
        }
        counts
    }

    pub fn confirmed_vote_total(&self) -> u32 {
        self.votes.values().filter(|v| v.confirmed).count() as u32
    }

    /// The spin shown at a given reveal position
    pub fn option(&self, option_index: usize) -> Option<&Spin> {
        self.reveal_order
            .get(option_index)
            .and_then(|&spin_index| self.spins.get(spin_index))
    }

    /// Current round's spins in reveal order
    pub fn revealed_options(&self) -> Vec<Spin> {
        self.reveal_order
            .iter()
            .filter_map(|&i| self.spins.get(i).cloned())
            .collect()
    }

    pub fn has_spun(&self, member_id: &str) -> bool {
        self.spins.iter().any(|s| s.member_id == member_id)
    }

    pub fn has_confirmed(&self, member_id: &str) -> bool {
        self.votes.get(member_id).is_some_and(|v| v.confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DiningPreferences;

    #[test]
    fn test_room_code_parse() {
        let code: RoomCode = "4821".parse().unwrap();
        assert_eq!(code.value(), 4821);
        assert_eq!(code.to_string(), "4821");

        assert!("482".parse::<RoomCode>().is_err());
        assert!("0999".parse::<RoomCode>().is_err());
        assert!("12a4".parse::<RoomCode>().is_err());
        assert!(RoomCode::new(10_000).is_err());
    }

    #[test]
    fn test_room_code_serializes_as_string() {
        let code = RoomCode::new(1234).unwrap();
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"1234\"");
        let back: RoomCode = serde_json::from_str("\"1234\"").unwrap();
        assert_eq!(back, code);
    }

    #[test]
    fn test_new_room_is_waiting() {
        let owner = Member::owner("Ana".into(), DiningPreferences::new("SoHo", "$$"));
        let room = Room::new(RoomCode::new(1234).unwrap(), owner);
        assert_eq!(room.state, RoomState::Waiting);
        assert_eq!(room.current_round, 0);
        assert!(room.winner.is_none());
        assert!(room.current_turn_member_id().is_none());
        assert_eq!(room.members.len(), 1);
    }
}

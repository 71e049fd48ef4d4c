//! Room state machine transitions
//!
//! Every transition validates its precondition against the room as given and
//! either applies the whole effect or leaves the room untouched. Callers are
//! expected to run these against a freshly loaded copy and commit with a
//! compare-and-swap.

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::matcher::match_restaurant;
use crate::models::{Room, RoomCode, RoomState, Spin, Vote, Winner};
use crate::storage::RestaurantCatalog;
use crate::tally::select_winner;

/// Result of confirming a vote
#[derive(Debug, Clone)]
pub struct ConfirmOutcome {
    /// False when the vote had already been confirmed
    pub changed: bool,
    /// Set when this confirmation completed the round
    pub winner: Option<Winner>,
}

/// Per-member progress shown in a status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberStatus {
    pub id: String,
    pub name: String,
    pub has_spun: bool,
    pub has_confirmed: bool,
}

/// Read-only snapshot of a room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomStatus {
    pub code: RoomCode,
    pub state: RoomState,
    pub current_round: u32,
    pub current_turn_member_id: Option<String>,
    /// Confirmed votes per option, in reveal order
    pub vote_counts_by_option: Vec<u32>,
    pub members: Vec<MemberStatus>,
    pub winner: Option<Winner>,
}

impl Room {
    /// waiting -> spinning
    pub fn start_spinning(&mut self) -> Result<()> {
        if self.state != RoomState::Waiting {
            return Err(Error::wrong_state("waiting"));
        }
        self.begin_round();
        Ok(())
    }

    /// complete -> spinning, with a fresh turn order
    pub fn start_new_round(&mut self) -> Result<()> {
        if self.state != RoomState::Complete {
            return Err(Error::wrong_state("complete"));
        }
        self.begin_round();
        Ok(())
    }

    fn begin_round(&mut self) {
        self.current_round += 1;
        self.turn_order = self.members.ids();
        self.current_turn_index = 0;
        self.spins.clear();
        self.votes.clear();
        self.reveal_order.clear();
        self.winner = None;
        self.state = RoomState::Spinning;
        self.touch();

        info!(
            room = %self.code,
            round = self.current_round,
            members = self.turn_order.len(),
            "Round started"
        );
    }

    /// Spin for the member whose turn it is; the last spin moves to revealing
    pub fn spin_for_member<C, R>(&mut self, member_id: &str, catalog: &C, rng: &mut R) -> Result<Spin>
    where
        C: RestaurantCatalog + ?Sized,
        R: Rng + ?Sized,
    {
        let member = self.members.require(member_id)?;

        if self.state != RoomState::Spinning {
            return Err(Error::wrong_state("spinning"));
        }
        if self.current_turn_member_id() != Some(member_id) {
            return Err(Error::not_your_turn());
        }

        let matched = match_restaurant(catalog, &member.preferences, rng)?;
        let spin = Spin {
            member_id: member.id.clone(),
            member_name: member.name.clone(),
            restaurant: matched.restaurant,
            match_type: matched.match_type,
            round: self.current_round,
            revealed: false,
        };

        self.spins.push(spin.clone());
        self.current_turn_index += 1;
        if self.current_turn_index == self.turn_order.len() {
            self.state = RoomState::Revealing;
        }
        self.touch();

        info!(
            room = %self.code,
            member_id = %member_id,
            match_type = %spin.match_type,
            "Member spun"
        );
        Ok(spin)
    }

    /// revealing -> voting; returns the options in reveal order
    pub fn reveal_options<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Vec<Spin>> {
        if self.state != RoomState::Revealing {
            return Err(Error::wrong_state("revealing"));
        }

        let round = self.current_round;
        for spin in self.spins.iter_mut().filter(|s| s.round == round) {
            spin.revealed = true;
        }

        let mut order: Vec<usize> = (0..self.spins.len()).collect();
        order.shuffle(rng);
        self.reveal_order = order;
        self.votes.clear();
        self.state = RoomState::Voting;
        self.touch();

        debug!(room = %self.code, reveal_order = ?self.reveal_order, "Options revealed");
        Ok(self.revealed_options())
    }

    /// Record or overwrite an unconfirmed vote
    pub fn vote(&mut self, member_id: &str, option_index: usize) -> Result<()> {
        self.members.require(member_id)?;

        if self.state != RoomState::Voting {
            return Err(Error::wrong_state("voting"));
        }
        if option_index >= self.reveal_order.len() {
            return Err(Error::Validation(format!(
                "option {} is out of range",
                option_index
            )));
        }
        if !self.turn_order.iter().any(|id| id == member_id) {
            return Err(Error::StateViolation(
                "not participating in this round".into(),
            ));
        }
        if self.has_confirmed(member_id) {
            return Err(Error::StateViolation("vote already confirmed".into()));
        }

        self.votes.insert(
            member_id.to_string(),
            Vote {
                option_index,
                confirmed: false,
            },
        );
        self.touch();

        debug!(room = %self.code, member_id = %member_id, option_index, "Vote recorded");
        Ok(())
    }

    /// Lock in a member's vote. Idempotent. The confirmation that completes
    /// the round also tallies and picks the winner.
    pub fn confirm_vote<R: Rng + ?Sized>(
        &mut self,
        member_id: &str,
        rng: &mut R,
    ) -> Result<ConfirmOutcome> {
        self.members.require(member_id)?;

        let vote = self
            .votes
            .get_mut(member_id)
            .ok_or_else(|| Error::StateViolation("no vote to confirm".into()))?;

        if vote.confirmed {
            return Ok(ConfirmOutcome {
                changed: false,
                winner: None,
            });
        }
        vote.confirmed = true;
        self.touch();

        let everyone_confirmed = self.turn_order.iter().all(|id| self.has_confirmed(id));
        let winner = if self.state == RoomState::Voting && everyone_confirmed {
            Some(self.tally_votes_and_select_winner(rng)?)
        } else {
            None
        };

        Ok(ConfirmOutcome {
            changed: true,
            winner,
        })
    }

    /// voting -> complete, once every member in the turn order confirmed
    pub(crate) fn tally_votes_and_select_winner<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<Winner> {
        if self.state != RoomState::Voting {
            return Err(Error::wrong_state("voting"));
        }

        let counts = self.confirmed_vote_counts();
        let outcome = select_winner(&counts, rng)
            .ok_or_else(|| Error::StateViolation("no confirmed votes to tally".into()))?;
        let spin = self
            .option(outcome.option_index)
            .ok_or_else(|| Error::StateViolation("winning option has no spin".into()))?;

        let winner = Winner {
            restaurant: spin.restaurant.clone(),
            member_id: spin.member_id.clone(),
            member_name: spin.member_name.clone(),
            match_type: spin.match_type,
            option_index: outcome.option_index,
            votes: outcome.votes,
            total_votes: outcome.total_votes,
            tie_broken: outcome.tie_broken,
            tied_count: outcome.tied_count,
            selected_at: Utc::now(),
        };

        self.winner = Some(winner.clone());
        self.state = RoomState::Complete;
        self.touch();

        info!(
            room = %self.code,
            round = self.current_round,
            option = outcome.option_index,
            votes = outcome.votes,
            tie_broken = outcome.tie_broken,
            "Winner selected"
        );
        Ok(winner)
    }

    pub fn status(&self) -> RoomStatus {
        RoomStatus {
            code: self.code,
            state: self.state,
            current_round: self.current_round,
            current_turn_member_id: self.current_turn_member_id().map(str::to_string),
            vote_counts_by_option: self.confirmed_vote_counts(),
            members: self
                .members
                .get_all_members()
                .iter()
                .map(|m| MemberStatus {
                    id: m.id.clone(),
                    name: m.name.clone(),
                    has_spun: self.has_spun(&m.id),
                    has_confirmed: self.has_confirmed(&m.id),
                })
                .collect(),
            winner: self.winner.clone(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

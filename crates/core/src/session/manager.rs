//! Session manager - room lifecycle over a versioned store
//!
//! Mutations load the room, apply a transition to the loaded copy and commit
//! it with a compare-and-swap on the room version. Losing the swap means
//! another caller committed first; the transition is then re-validated
//! against the newer state, so a precondition that no longer holds fails
//! cleanly instead of overwriting the other write. Nothing here waits on
//! another member.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use super::events::{EventSink, RoomEvent};
use super::machine::{ConfirmOutcome, RoomStatus};
use crate::error::{Error, Result};
use crate::invariants::assert_room_invariants;
use crate::models::{
    DiningPreferences, Member, Room, RoomCode, Spin, MAX_ROOM_CODE, MIN_ROOM_CODE,
};
use crate::storage::Storage;

/// Commit attempts before a mutation gives up with a conflict
pub const MAX_CAS_ATTEMPTS: u32 = 8;

/// Random draws before room creation gives up on finding a free code
const MAX_CODE_ATTEMPTS: u32 = 64;

/// Entry point for every room operation
pub struct SessionManager<S> {
    storage: S,
    events: Arc<dyn EventSink>,
    rng: Mutex<StdRng>,
}

impl<S: Storage> SessionManager<S> {
    /// Manager with entropy-seeded randomness
    pub fn new(storage: S, events: Arc<dyn EventSink>) -> Self {
        Self::from_rng(storage, events, StdRng::from_entropy())
    }

    /// Manager whose shuffles, picks and codes are reproducible
    pub fn with_seed(storage: S, events: Arc<dyn EventSink>, seed: u64) -> Self {
        Self::from_rng(storage, events, StdRng::seed_from_u64(seed))
    }

    fn from_rng(storage: S, events: Arc<dyn EventSink>, rng: StdRng) -> Self {
        Self {
            storage,
            events,
            rng: Mutex::new(rng),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Independent generator for one operation, so the shared one is only
    /// held for the draw of a seed
    fn operation_rng(&self) -> StdRng {
        let mut master = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        StdRng::seed_from_u64(master.gen())
    }

    /// Create a room under a fresh 4-digit code with the caller as owner
    pub fn create_room(&self, owner_name: &str, preferences: DiningPreferences) -> Result<Room> {
        let owner_name = owner_name.trim();
        if owner_name.is_empty() {
            return Err(Error::Validation("name is required".into()));
        }
        preferences.validate()?;

        let mut rng = self.operation_rng();
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = RoomCode::new(rng.gen_range(MIN_ROOM_CODE..=MAX_ROOM_CODE))?;
            let room = Room::new(code, Member::owner(owner_name.to_string(), preferences.clone()));

            if self.storage.insert_room(&room)? {
                info!(room = %code, owner = %owner_name, "Room created");
                return Ok(room);
            }
            debug!(room = %code, "Room code taken, drawing another");
        }

        Err(Error::Conflict("no free room code available".into()))
    }

    /// Join a room. A `user_id` makes the member id `user_<id>`, and joining
    /// again with it returns the existing member unchanged.
    pub fn join_room(
        &self,
        code: RoomCode,
        name: &str,
        preferences: DiningPreferences,
        user_id: Option<&str>,
    ) -> Result<Member> {
        let member_id = user_id.map(|id| format!("user_{}", id));
        self.add_guest_member(code, name, preferences, member_id)
    }

    /// Append a member to the room's registry
    pub fn add_guest_member(
        &self,
        code: RoomCode,
        name: &str,
        preferences: DiningPreferences,
        id: Option<String>,
    ) -> Result<Member> {
        if let Some(id) = &id {
            if let Some(existing) = self.room(code)?.members.get_member_by_id(id) {
                return Ok(existing.clone());
            }
        }
        preferences.validate()?;

        let (_, (member, added)) = self.mutate(code, "join", |room, _| {
            room.members
                .add_guest_member(name, preferences.clone(), id.clone())
        })?;

        // A racing rejoin with the same id resolves to the stored member
        if added {
            self.events.publish(
                code,
                RoomEvent::MemberJoined {
                    member: member.clone(),
                },
            );
        }
        Ok(member)
    }

    pub fn room(&self, code: RoomCode) -> Result<Room> {
        self.storage
            .find_room(code)?
            .ok_or_else(|| Error::room_not_found(code))
    }

    pub fn status(&self, code: RoomCode) -> Result<RoomStatus> {
        Ok(self.room(code)?.status())
    }

    pub fn get_all_members(&self, code: RoomCode) -> Result<Vec<Member>> {
        Ok(self.room(code)?.members.get_all_members().to_vec())
    }

    pub fn start_spinning(&self, code: RoomCode) -> Result<()> {
        let (room, ()) = self.mutate(code, "start_spinning", |room, _| room.start_spinning())?;
        self.events.publish(
            code,
            RoomEvent::SpinStarted {
                round: room.current_round,
                turn_order: room.turn_order,
            },
        );
        Ok(())
    }

    pub fn spin_for_member(&self, code: RoomCode, member_id: &str) -> Result<Spin> {
        let catalog = &self.storage;
        let (room, spin) = self.mutate(code, "spin", |room, rng| {
            room.spin_for_member(member_id, catalog, rng)
        })?;

        self.events.publish(
            code,
            RoomEvent::SpinResult {
                spin: spin.clone(),
                next_member_id: room.current_turn_member_id().map(str::to_string),
            },
        );
        Ok(spin)
    }

    /// Options come back in reveal order
    pub fn reveal_options(&self, code: RoomCode) -> Result<Vec<Spin>> {
        let (_, options) = self.mutate(code, "reveal", |room, rng| room.reveal_options(rng))?;
        self.events.publish(
            code,
            RoomEvent::OptionsRevealed {
                options: options.clone(),
            },
        );
        Ok(options)
    }

    pub fn vote(&self, code: RoomCode, member_id: &str, option_index: usize) -> Result<()> {
        self.mutate(code, "vote", |room, _| room.vote(member_id, option_index))?;
        Ok(())
    }

    pub fn confirm_vote(&self, code: RoomCode, member_id: &str) -> Result<ConfirmOutcome> {
        let (room, outcome) =
            self.mutate(code, "confirm_vote", |room, rng| room.confirm_vote(member_id, rng))?;

        if outcome.changed {
            self.events.publish(
                code,
                RoomEvent::VoteUpdate {
                    counts: room.confirmed_vote_counts(),
                    confirmed: room.confirmed_vote_total(),
                    eligible: room.turn_order.len() as u32,
                },
            );
        }
        if let Some(winner) = &outcome.winner {
            self.events.publish(
                code,
                RoomEvent::WinnerSelected {
                    winner: winner.clone(),
                },
            );
        }
        Ok(outcome)
    }

    pub fn start_new_round(&self, code: RoomCode) -> Result<()> {
        let (room, ()) = self.mutate(code, "start_new_round", |room, _| room.start_new_round())?;
        self.events.publish(
            code,
            RoomEvent::RoundStarted {
                round: room.current_round,
                turn_order: room.turn_order,
            },
        );
        Ok(())
    }

    /// Close a room on behalf of its owner, freeing the code
    pub fn close_room(&self, code: RoomCode, member_id: &str) -> Result<()> {
        let room = self.room(code)?;
        if !room.members.require(member_id)?.is_owner() {
            return Err(Error::StateViolation(
                "only the owner can close the room".into(),
            ));
        }

        self.storage.delete_room(code)?;
        self.release(code);
        info!(room = %code, "Room closed");
        Ok(())
    }

    /// Close rooms untouched for longer than `max_idle`
    pub fn close_idle_rooms(&self, max_idle: std::time::Duration) -> Result<Vec<RoomCode>> {
        let cutoff = chrono::Duration::from_std(max_idle)
            .ok()
            .and_then(|idle| Utc::now().checked_sub_signed(idle));
        match cutoff {
            Some(cutoff) => self.close_rooms_idle_since(cutoff),
            None => Ok(Vec::new()),
        }
    }

    /// Close every room with no committed change since `cutoff`
    pub fn close_rooms_idle_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<RoomCode>> {
        let closed = self.storage.delete_rooms_idle_since(cutoff)?;
        for code in &closed {
            self.release(*code);
        }
        if !closed.is_empty() {
            info!(count = closed.len(), %cutoff, "Closed idle rooms");
        }
        Ok(closed)
    }

    /// Last word to observers of a deleted room, then drop its channel
    fn release(&self, code: RoomCode) {
        self.events.publish(code, RoomEvent::RoomClosed);
        self.events.close(code);
    }

    pub fn active_rooms(&self) -> Result<Vec<RoomCode>> {
        self.storage.list_room_codes()
    }

    /// Load, transition, compare-and-swap. Returns the committed room.
    fn mutate<T, F>(&self, code: RoomCode, op: &'static str, mut transition: F) -> Result<(Room, T)>
    where
        F: FnMut(&mut Room, &mut StdRng) -> Result<T>,
    {
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let mut room = self.room(code)?;
            let expected = room.version;

            let mut rng = self.operation_rng();
            let value = transition(&mut room, &mut rng)?;
            room.version = expected + 1;
            room.updated_at = Utc::now();
            assert_room_invariants(&room);

            if self.storage.compare_and_swap(&room, expected)? {
                return Ok((room, value));
            }
            debug!(room = %code, op, attempt, "Lost compare-and-swap, re-validating");
        }

        warn!(room = %code, op, "Gave up after repeated compare-and-swap conflicts");
        Err(Error::Conflict(format!(
            "room {} kept changing during {}",
            code, op
        )))
    }
}

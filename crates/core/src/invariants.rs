//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible room states during development.
//! These checks are compiled out in release builds.

use std::collections::HashSet;

use crate::models::{Room, RoomState};

/// Validate that a room's state is internally consistent
pub fn assert_room_invariants(room: &Room) {
    // Every turn-order entry is a registered member, listed once
    let mut seen = HashSet::new();
    for id in &room.turn_order {
        debug_assert!(
            room.members.contains(id),
            "Room {} turn order names unknown member {}",
            room.code,
            id
        );
        debug_assert!(
            seen.insert(id.as_str()),
            "Room {} turn order lists {} twice",
            room.code,
            id
        );
    }

    // At most one spin per member per round, all from the current round
    let mut spun = HashSet::new();
    for spin in &room.spins {
        debug_assert!(
            spin.round == room.current_round,
            "Room {} holds a spin from round {} during round {}",
            room.code,
            spin.round,
            room.current_round
        );
        debug_assert!(
            spun.insert(spin.member_id.as_str()),
            "Room {} member {} spun twice in round {}",
            room.code,
            spin.member_id,
            room.current_round
        );
    }

    // Spins land strictly in turn order
    debug_assert!(
        room.spins.len() == room.current_turn_index.min(room.turn_order.len()),
        "Room {} has {} spins but turn index {}",
        room.code,
        room.spins.len(),
        room.current_turn_index
    );
    for (spin, id) in room.spins.iter().zip(&room.turn_order) {
        debug_assert!(
            &spin.member_id == id,
            "Room {} spin by {} out of turn (expected {})",
            room.code,
            spin.member_id,
            id
        );
    }

    if room.state == RoomState::Spinning {
        debug_assert!(
            room.current_turn_index < room.turn_order.len(),
            "Room {} spinning with no member due",
            room.code
        );
    }

    // Reveal order exists only after a reveal and permutes the spins
    let revealed = matches!(room.state, RoomState::Voting | RoomState::Complete);
    if revealed {
        let mut order = room.reveal_order.clone();
        order.sort_unstable();
        debug_assert!(
            order.iter().copied().eq(0..room.spins.len()),
            "Room {} reveal order {:?} is not a permutation of {} spins",
            room.code,
            room.reveal_order,
            room.spins.len()
        );
    } else {
        debug_assert!(
            room.reveal_order.is_empty(),
            "Room {} has a reveal order in state {}",
            room.code,
            room.state
        );
    }

    for (member_id, vote) in &room.votes {
        debug_assert!(
            vote.option_index < room.reveal_order.len(),
            "Room {} vote by {} points past the options",
            room.code,
            member_id
        );
    }

    debug_assert!(
        room.winner.is_some() == (room.state == RoomState::Complete),
        "Room {} in state {} with winner {:?}",
        room.code,
        room.state,
        room.winner.as_ref().map(|w| w.option_index)
    );
}

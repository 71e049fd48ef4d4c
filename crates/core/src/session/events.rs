//! Room events pushed to connected observers
//!
//! The core only emits well-formed events; delivery belongs to the transport.

use serde::{Deserialize, Serialize};

use crate::models::{Member, RoomCode, Spin, Winner};

/// A state change observers of a room should know about
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RoomEvent {
    MemberJoined {
        member: Member,
    },
    /// First round of a room began
    #[serde(rename = "start_spin")]
    SpinStarted {
        round: u32,
        turn_order: Vec<String>,
    },
    SpinResult {
        spin: Spin,
        /// Who spins next, `None` once everyone has
        next_member_id: Option<String>,
    },
    OptionsRevealed {
        options: Vec<Spin>,
    },
    VoteUpdate {
        /// Confirmed votes per option, in reveal order
        counts: Vec<u32>,
        confirmed: u32,
        /// Members expected to vote this round
        eligible: u32,
    },
    WinnerSelected {
        winner: Winner,
    },
    /// A later round began after a completed one
    RoundStarted {
        round: u32,
        turn_order: Vec<String>,
    },
    /// The room was closed or expired; its code may be reused
    RoomClosed,
}

impl RoomEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RoomEvent::MemberJoined { .. } => "member_joined",
            RoomEvent::SpinStarted { .. } => "start_spin",
            RoomEvent::SpinResult { .. } => "spin_result",
            RoomEvent::OptionsRevealed { .. } => "options_revealed",
            RoomEvent::VoteUpdate { .. } => "vote_update",
            RoomEvent::WinnerSelected { .. } => "winner_selected",
            RoomEvent::RoundStarted { .. } => "round_started",
            RoomEvent::RoomClosed => "room_closed",
        }
    }
}

/// Publish/subscribe channel keyed by room code
pub trait EventSink: Send + Sync {
    fn publish(&self, code: RoomCode, event: RoomEvent);

    /// The room is gone; release anything held for its observers
    fn close(&self, _code: RoomCode) {}
}

/// Sink that drops everything, for hosts without observers
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn publish(&self, code: RoomCode, event: RoomEvent) {
        tracing::trace!(room = %code, event = event.name(), "Dropping event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tags() {
        let event = RoomEvent::SpinStarted {
            round: 1,
            turn_order: vec!["owner".into()],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "start_spin");
        assert_eq!(event.name(), "start_spin");

        let event = RoomEvent::VoteUpdate {
            counts: vec![1, 0],
            confirmed: 1,
            eligible: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "vote_update");
        assert_eq!(json["counts"][0], 1);

        let json = serde_json::to_value(RoomEvent::RoomClosed).unwrap();
        assert_eq!(json, serde_json::json!({ "event": "room_closed" }));
    }
}

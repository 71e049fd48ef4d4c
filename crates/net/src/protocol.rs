//! Network protocol message types
//!
//! All messages are JSON-serialized and length-prefixed on the wire.
//! Clients send [`Request`]s; the server answers each with one [`Response`]
//! and interleaves [`Response::Event`] frames for the room the connection
//! is bound to.

use serde::{Deserialize, Serialize};

use dinewheel_core::{
    DiningPreferences, Error as CoreError, ErrorKind, Member, RoomCode, RoomEvent, RoomStatus, Spin,
};

/// Client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Create a room and bind this connection to it as the owner
    CreateRoom {
        name: String,
        preferences: DiningPreferences,
    },

    /// Join a room and bind this connection to it as the new member
    JoinRoom {
        code: RoomCode,
        name: String,
        preferences: DiningPreferences,
        #[serde(default)]
        user_id: Option<String>,
    },

    StartSpinning,

    /// Spin as the bound member
    Spin,

    Reveal,

    Vote { option_index: usize },

    ConfirmVote,

    StartNewRound,

    /// Close the bound room; only its owner may
    CloseRoom,

    /// Snapshot of the named room, or of the bound room
    Status {
        #[serde(default)]
        code: Option<RoomCode>,
    },

    Ping,
}

/// Server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    RoomCreated {
        code: RoomCode,
        member: Member,
    },

    Joined {
        code: RoomCode,
        member: Member,
    },

    /// Outcome of an operation that has no payload
    Ack {
        success: bool,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        kind: Option<ErrorKind>,
    },

    SpinResult {
        success: bool,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        spin: Option<Spin>,
    },

    /// Options in reveal order
    Revealed {
        success: bool,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        options: Vec<Spin>,
    },

    Status {
        status: RoomStatus,
    },

    /// Pushed state change for the bound room
    Event {
        code: RoomCode,
        event: RoomEvent,
    },

    Pong,

    /// The request could not be served
    Error {
        reason: String,
        #[serde(default)]
        kind: Option<ErrorKind>,
    },
}

impl Response {
    pub fn ok() -> Self {
        Response::Ack {
            success: true,
            error: None,
            kind: None,
        }
    }

    pub fn failed(err: &CoreError) -> Self {
        Response::Ack {
            success: false,
            error: Some(err.to_string()),
            kind: Some(err.kind()),
        }
    }

    pub fn error(err: &CoreError) -> Self {
        Response::Error {
            reason: err.to_string(),
            kind: Some(err.kind()),
        }
    }
}

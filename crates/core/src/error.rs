//! Error types for DineWheel Core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Malformed create/join input
    #[error("{0}")]
    Validation(String),

    /// Wrong member attempted to spin
    #[error("{0}")]
    TurnViolation(String),

    /// Operation invoked outside its required state
    #[error("{0}")]
    StateViolation(String),

    #[error("{0}")]
    NotFound(String),

    /// The room kept changing underneath a compare-and-swap
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Machine-checkable failure reason, independent of the message text
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    TurnViolation,
    StateViolation,
    NotFound,
    Conflict,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::TurnViolation(_) => ErrorKind::TurnViolation,
            Error::StateViolation(_) => ErrorKind::StateViolation,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Database(_) | Error::Io(_) | Error::Serialization(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn not_your_turn() -> Self {
        Error::TurnViolation("not your turn".into())
    }

    pub(crate) fn wrong_state(expected: &str) -> Self {
        Error::StateViolation(format!("not in {} state", expected))
    }

    pub(crate) fn member_not_found(member_id: &str) -> Self {
        Error::NotFound(format!("member not found: {}", member_id))
    }

    pub(crate) fn room_not_found(code: impl std::fmt::Display) -> Self {
        Error::NotFound(format!("room not found: {}", code))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_visible_strings() {
        assert_eq!(Error::not_your_turn().to_string(), "not your turn");
        assert_eq!(
            Error::wrong_state("spinning").to_string(),
            "not in spinning state"
        );
        assert_eq!(Error::not_your_turn().kind(), ErrorKind::TurnViolation);
        assert_eq!(Error::member_not_found("guest_9").kind(), ErrorKind::NotFound);
    }
}

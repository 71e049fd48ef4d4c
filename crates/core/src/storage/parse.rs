//! Database value parsing utilities
//!
//! Provides error-safe parsing of stored values.

use rusqlite::types::Type;
use rusqlite::Error as SqlError;
use serde::de::DeserializeOwned;

use crate::models::RoomCode;

fn conversion_error(
    column: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> SqlError {
    SqlError::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

/// Parse a JSON document column
pub fn parse_json<T: DeserializeOwned>(column: usize, s: &str) -> Result<T, SqlError> {
    serde_json::from_str(s).map_err(|e| conversion_error(column, e))
}

/// Parse a JSON string list, treating NULL as empty
pub fn parse_string_list(column: usize, s: Option<String>) -> Result<Vec<String>, SqlError> {
    match s {
        Some(s) if !s.trim().is_empty() => parse_json(column, &s),
        _ => Ok(Vec::new()),
    }
}

/// Parse a room code stored as an integer
pub fn parse_room_code(column: usize, value: i64) -> Result<RoomCode, SqlError> {
    u16::try_from(value)
        .ok()
        .and_then(|v| RoomCode::new(v).ok())
        .ok_or(SqlError::IntegralValueOutOfRange(column, value))
}

/// Extension trait for converting rusqlite Results to Option
pub trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, SqlError>;
}

impl<T> OptionalExt<T> for Result<T, SqlError> {
    fn optional(self) -> Result<Option<T>, SqlError> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(SqlError::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

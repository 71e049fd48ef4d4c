//! DineWheel Core Library
//!
//! Room models, the session state machine, restaurant matching and storage
//! for DineWheel.

pub mod error;
pub mod invariants;
pub mod matcher;
pub mod models;
pub mod registry;
pub mod session;
pub mod storage;
pub mod tally;

pub use error::{Error, ErrorKind, Result};
pub use matcher::{match_restaurant, MatchResult, RestaurantFilter, CASCADE};
pub use models::*;
pub use registry::MemberRegistry;
pub use session::*;
pub use storage::{
    load_restaurants_json, Database, MemoryStorage, RestaurantCatalog, RoomRepository, Storage,
};
pub use tally::{select_winner, TallyOutcome};

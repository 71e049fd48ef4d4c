//! Storage repository traits
//!
//! These traits define the storage interface, allowing the session manager
//! to run over SQLite or the in-memory backend.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::matcher::RestaurantFilter;
use crate::models::{Restaurant, Room, RoomCode};

/// Versioned room documents
pub trait RoomRepository {
    /// Insert a new room; `false` if the code is already taken
    fn insert_room(&self, room: &Room) -> Result<bool>;

    fn find_room(&self, code: RoomCode) -> Result<Option<Room>>;

    /// Replace the stored room only if its version is still `expected`.
    /// Returns `false` when another write got there first.
    fn compare_and_swap(&self, room: &Room, expected: u64) -> Result<bool>;

    fn delete_room(&self, code: RoomCode) -> Result<()>;

    /// Delete rooms last written before `cutoff`, returning their codes
    /// ascending
    fn delete_rooms_idle_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<RoomCode>>;

    /// Codes of all stored rooms, ascending
    fn list_room_codes(&self) -> Result<Vec<RoomCode>>;
}

/// Read-only restaurant dataset
pub trait RestaurantCatalog {
    /// All rows satisfying the filter
    fn find_restaurants(&self, filter: &RestaurantFilter) -> Result<Vec<Restaurant>>;
}

/// Combined storage interface shared across connection handlers
pub trait Storage: RoomRepository + RestaurantCatalog + Send + Sync {}

// Blanket implementation: any type implementing all traits implements Storage
impl<T> Storage for T where T: RoomRepository + RestaurantCatalog + Send + Sync {}

// A SQLite connection is not Sync, so shared use goes through a mutex. A
// poisoned lock still guards a consistent connection.

impl<T: RoomRepository> RoomRepository for Mutex<T> {
    fn insert_room(&self, room: &Room) -> Result<bool> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert_room(room)
    }

    fn find_room(&self, code: RoomCode) -> Result<Option<Room>> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .find_room(code)
    }

    fn compare_and_swap(&self, room: &Room, expected: u64) -> Result<bool> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .compare_and_swap(room, expected)
    }

    fn delete_room(&self, code: RoomCode) -> Result<()> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .delete_room(code)
    }

    fn delete_rooms_idle_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<RoomCode>> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .delete_rooms_idle_since(cutoff)
    }

    fn list_room_codes(&self) -> Result<Vec<RoomCode>> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .list_room_codes()
    }
}

impl<T: RestaurantCatalog> RestaurantCatalog for Mutex<T> {
    fn find_restaurants(&self, filter: &RestaurantFilter) -> Result<Vec<Restaurant>> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .find_restaurants(filter)
    }
}

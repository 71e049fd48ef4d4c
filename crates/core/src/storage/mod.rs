//! Storage layer: SQLite database and in-memory backend

mod memory;
mod migrations;
mod parse;
mod restaurants;
mod rooms;
mod traits;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use tracing::instrument;

use crate::error::Result;
use crate::matcher::RestaurantFilter;
use crate::models::{Restaurant, Room, RoomCode};

pub use memory::MemoryStorage;
pub use restaurants::{load_restaurants_json, RestaurantStore};
pub use rooms::RoomStore;
pub use traits::{RestaurantCatalog, RoomRepository, Storage};

/// Main database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        migrations::run_migrations(&conn)?;
        Ok(Self { conn })
    }

    pub fn schema_version(&self) -> u32 {
        migrations::current_version(&self.conn).unwrap_or(0)
    }

    pub fn rooms(&self) -> RoomStore<'_> {
        RoomStore::new(&self.conn)
    }

    pub fn restaurants(&self) -> RestaurantStore<'_> {
        RestaurantStore::new(&self.conn)
    }

    /// Load a dataset into the restaurants table, replacing rows by id
    pub fn import_restaurants(&self, restaurants: &[Restaurant]) -> Result<usize> {
        self.restaurants().import(restaurants)
    }
}

impl RoomRepository for Database {
    fn insert_room(&self, room: &Room) -> Result<bool> {
        self.rooms().insert(room)
    }

    fn find_room(&self, code: RoomCode) -> Result<Option<Room>> {
        self.rooms().find(code)
    }

    fn compare_and_swap(&self, room: &Room, expected: u64) -> Result<bool> {
        self.rooms().compare_and_swap(room, expected)
    }

    fn delete_room(&self, code: RoomCode) -> Result<()> {
        self.rooms().delete(code)
    }

    fn delete_rooms_idle_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<RoomCode>> {
        self.rooms().delete_idle_since(cutoff)
    }

    fn list_room_codes(&self) -> Result<Vec<RoomCode>> {
        self.rooms().list_codes()
    }
}

impl RestaurantCatalog for Database {
    fn find_restaurants(&self, filter: &RestaurantFilter) -> Result<Vec<Restaurant>> {
        self.restaurants().find(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dinewheel.db");

        {
            let db = Database::open(&path).unwrap();
            assert!(db.schema_version() >= 1);
            db.import_restaurants(&[Restaurant::new("1", "Lupa").priced("$$")])
                .unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.restaurants().count().unwrap(), 1);
    }
}

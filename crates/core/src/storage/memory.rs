//! In-memory storage for tests and database-less hosts

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use super::traits::{RestaurantCatalog, RoomRepository};
use crate::error::Result;
use crate::matcher::RestaurantFilter;
use crate::models::{Restaurant, Room, RoomCode};

/// Rooms behind a mutex, restaurants fixed at construction
#[derive(Debug, Default)]
pub struct MemoryStorage {
    rooms: Mutex<HashMap<RoomCode, Room>>,
    restaurants: Vec<Restaurant>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_restaurants(restaurants: Vec<Restaurant>) -> Self {
        Self {
            rooms: Mutex::default(),
            restaurants,
        }
    }

    fn rooms(&self) -> MutexGuard<'_, HashMap<RoomCode, Room>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RoomRepository for MemoryStorage {
    fn insert_room(&self, room: &Room) -> Result<bool> {
        let mut rooms = self.rooms();
        if rooms.contains_key(&room.code) {
            return Ok(false);
        }
        rooms.insert(room.code, room.clone());
        Ok(true)
    }

    fn find_room(&self, code: RoomCode) -> Result<Option<Room>> {
        Ok(self.rooms().get(&code).cloned())
    }

    fn compare_and_swap(&self, room: &Room, expected: u64) -> Result<bool> {
        let mut rooms = self.rooms();
        match rooms.get_mut(&room.code) {
            Some(stored) if stored.version == expected => {
                *stored = room.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn delete_room(&self, code: RoomCode) -> Result<()> {
        self.rooms().remove(&code);
        Ok(())
    }

    fn delete_rooms_idle_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<RoomCode>> {
        let mut rooms = self.rooms();
        let mut idle: Vec<RoomCode> = rooms
            .values()
            .filter(|room| room.updated_at < cutoff)
            .map(|room| room.code)
            .collect();
        for code in &idle {
            rooms.remove(code);
        }
        idle.sort_unstable();
        Ok(idle)
    }

    fn list_room_codes(&self) -> Result<Vec<RoomCode>> {
        let mut codes: Vec<RoomCode> = self.rooms().keys().copied().collect();
        codes.sort_unstable();
        Ok(codes)
    }
}

impl RestaurantCatalog for MemoryStorage {
    fn find_restaurants(&self, filter: &RestaurantFilter) -> Result<Vec<Restaurant>> {
        Ok(self
            .restaurants
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }
}

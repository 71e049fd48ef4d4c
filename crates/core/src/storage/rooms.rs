//! Room document storage

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::{debug, instrument};

use super::parse::{parse_json, parse_room_code, OptionalExt};
use crate::error::Result;
use crate::models::{Room, RoomCode};

pub struct RoomStore<'a> {
    conn: &'a Connection,
}

impl<'a> RoomStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a room unless its code is taken
    #[instrument(skip(self, room), fields(room = %room.code))]
    pub fn insert(&self, room: &Room) -> Result<bool> {
        let document = serde_json::to_string(room)?;
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO rooms (code, document, version, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                room.code.value(),
                document,
                room.version as i64,
                room.created_at.to_rfc3339(),
                room.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(inserted == 1)
    }

    #[instrument(skip(self))]
    pub fn find(&self, code: RoomCode) -> Result<Option<Room>> {
        let room = self
            .conn
            .query_row(
                "SELECT document FROM rooms WHERE code = ?1",
                params![code.value()],
                |row| parse_json::<Room>(0, &row.get::<_, String>(0)?),
            )
            .optional()?;
        Ok(room)
    }

    /// Write the room if the stored version still equals `expected`
    #[instrument(skip(self, room), fields(room = %room.code, version = room.version))]
    pub fn compare_and_swap(&self, room: &Room, expected: u64) -> Result<bool> {
        let document = serde_json::to_string(room)?;
        let updated = self.conn.execute(
            "UPDATE rooms SET document = ?1, version = ?2, updated_at = ?3
             WHERE code = ?4 AND version = ?5",
            params![
                document,
                room.version as i64,
                room.updated_at.to_rfc3339(),
                room.code.value(),
                expected as i64,
            ],
        )?;

        if updated == 0 {
            debug!(expected, "Room version moved on");
        }
        Ok(updated == 1)
    }

    #[instrument(skip(self))]
    pub fn delete(&self, code: RoomCode) -> Result<()> {
        self.conn
            .execute("DELETE FROM rooms WHERE code = ?1", params![code.value()])?;
        Ok(())
    }

    /// Delete rooms whose last write is older than `cutoff`
    #[instrument(skip(self))]
    pub fn delete_idle_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<RoomCode>> {
        let mut stmt = self
            .conn
            .prepare("DELETE FROM rooms WHERE updated_at < ?1 RETURNING code")?;
        let mut codes = stmt
            .query_map(params![cutoff.to_rfc3339()], |row| {
                parse_room_code(0, row.get(0)?)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        codes.sort_unstable();

        if !codes.is_empty() {
            debug!(count = codes.len(), "Idle rooms deleted");
        }
        Ok(codes)
    }

    pub fn list_codes(&self) -> Result<Vec<RoomCode>> {
        let mut stmt = self.conn.prepare("SELECT code FROM rooms ORDER BY code")?;
        let codes = stmt
            .query_map([], |row| parse_room_code(0, row.get(0)?))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(codes)
    }
}

#[cfg(test)]
mod tests {
    use super::super::Database;
    use crate::models::{DiningPreferences, Member, RoomState};
    use crate::storage::RoomRepository;

    use super::*;

    fn room(code: u16) -> Room {
        let owner = Member::owner(
            "Olivia".into(),
            DiningPreferences::new("SoHo", "$$").with_categories(["Thai"]),
        );
        Room::new(RoomCode::new(code).unwrap(), owner)
    }

    #[test]
    fn test_insert_and_find() {
        let db = Database::open_in_memory().unwrap();
        let room = room(4821);

        assert!(db.insert_room(&room).unwrap());
        assert!(!db.insert_room(&room).unwrap());

        let found = db.find_room(room.code).unwrap().unwrap();
        assert_eq!(found.code, room.code);
        assert_eq!(found.members.len(), 1);
        assert_eq!(found.state, RoomState::Waiting);
        assert!(db.find_room(RoomCode::new(1234).unwrap()).unwrap().is_none());
    }

    #[test]
    fn test_compare_and_swap() {
        let db = Database::open_in_memory().unwrap();
        let room = room(5000);
        db.insert_room(&room).unwrap();

        let mut next = room.clone();
        next.start_spinning().unwrap();
        next.version = 1;
        assert!(db.compare_and_swap(&next, 0).unwrap());

        // Same expected version again loses
        let mut stale = room.clone();
        stale.version = 1;
        assert!(!db.compare_and_swap(&stale, 0).unwrap());

        let stored = db.find_room(room.code).unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.state, RoomState::Spinning);
    }

    #[test]
    fn test_list_and_delete() {
        let db = Database::open_in_memory().unwrap();
        db.insert_room(&room(9000)).unwrap();
        db.insert_room(&room(1200)).unwrap();

        let codes: Vec<u16> = db
            .list_room_codes()
            .unwrap()
            .iter()
            .map(|c| c.value())
            .collect();
        assert_eq!(codes, vec![1200, 9000]);

        db.delete_room(RoomCode::new(1200).unwrap()).unwrap();
        assert_eq!(db.list_room_codes().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_idle_rooms() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();

        let mut old = room(1500);
        old.updated_at = now - chrono::Duration::days(3);
        let mut older = room(7100);
        older.updated_at = now - chrono::Duration::days(9);
        let active = room(4400);
        for r in [&old, &older, &active] {
            db.insert_room(r).unwrap();
        }

        let deleted = db
            .delete_rooms_idle_since(now - chrono::Duration::days(1))
            .unwrap();
        assert_eq!(deleted, vec![old.code, older.code]);
        assert_eq!(db.list_room_codes().unwrap(), vec![active.code]);

        // Freed codes can be taken again
        assert!(db.insert_room(&room(1500)).unwrap());
    }
}

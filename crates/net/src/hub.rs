//! Per-room event fan-out
//!
//! The session manager publishes into the hub; every connection bound to a
//! room holds a broadcast receiver for it. Channels are created on first
//! subscribe and dropped once nobody listens or the room is closed.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, trace};

use dinewheel_core::{EventSink, RoomCode, RoomEvent};

/// Events buffered per room before slow subscribers start lagging
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

pub struct RoomHub {
    channels: Mutex<HashMap<RoomCode, broadcast::Sender<RoomEvent>>>,
    capacity: usize,
}

impl Default for RoomHub {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl RoomHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<RoomCode, broadcast::Sender<RoomEvent>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self, code: RoomCode) -> broadcast::Receiver<RoomEvent> {
        self.channels()
            .entry(code)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    pub fn subscriber_count(&self, code: RoomCode) -> usize {
        self.channels()
            .get(&code)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

impl EventSink for RoomHub {
    fn publish(&self, code: RoomCode, event: RoomEvent) {
        let mut channels = self.channels();
        let Some(tx) = channels.get(&code) else {
            trace!(room = %code, event = event.name(), "No observers");
            return;
        };

        let name = event.name();
        match tx.send(event) {
            Ok(receivers) => debug!(room = %code, event = name, receivers, "Event published"),
            Err(_) => {
                channels.remove(&code);
                trace!(room = %code, event = name, "Observers gone, channel dropped");
            }
        }
    }

    /// Forget a room's channel; receivers drain what was sent, then see it close
    fn close(&self, code: RoomCode) {
        if self.channels().remove(&code).is_some() {
            debug!(room = %code, "Event channel closed");
        }
    }
}

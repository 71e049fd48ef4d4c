//! Application state management

use std::path::Path;
use std::sync::{Arc, Mutex};

use dinewheel_core::{load_restaurants_json, Database, Result, SessionManager};
use dinewheel_net::RoomHub;
use tracing::{info, warn};

use crate::config::AppConfig;

/// Shared handles the server runs on
pub struct AppState {
    pub sessions: Arc<SessionManager<Mutex<Database>>>,
    pub hub: Arc<RoomHub>,
}

impl AppState {
    pub fn new(config: &AppConfig, db_path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(db_path)?;
        info!(path = %db_path.display(), schema = db.schema_version(), "Database ready");

        if let Some(dataset) = &config.restaurants_path {
            let restaurants = load_restaurants_json(dataset)?;
            db.import_restaurants(&restaurants)?;
        }
        let available = db.restaurants().count()?;
        if available == 0 {
            warn!("Restaurant dataset is empty; every spin will match nothing");
        }

        let hub = Arc::new(RoomHub::default());
        let storage = Mutex::new(db);
        let sessions = match config.rng_seed {
            Some(seed) => SessionManager::with_seed(storage, hub.clone(), seed),
            None => SessionManager::new(storage, hub.clone()),
        };

        // Rooms left over from earlier runs
        if let Some(max_idle) = config.room_idle() {
            sessions.close_idle_rooms(max_idle)?;
        }
        info!(rooms = sessions.active_rooms()?.len(), "Rooms restored");

        Ok(Self {
            sessions: Arc::new(sessions),
            hub,
        })
    }
}

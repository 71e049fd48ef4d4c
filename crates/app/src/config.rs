//! Host configuration
//!
//! Read from `dinewheel.toml` in the platform config directory, or from a
//! path given on the command line. Missing keys take their defaults, and
//! `DINEWHEEL_PORT` / `DINEWHEEL_DB` override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use dinewheel_net::DEFAULT_PORT;

const CONFIG_FILE: &str = "dinewheel.toml";
const DATABASE_FILE: &str = "dinewheel.db";
const DEFAULT_MAX_PEERS: usize = 64;
const DEFAULT_ROOM_IDLE_HOURS: u64 = 24;

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("Could not determine config directory")]
    NoProjectDirs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub port: u16,
    /// Defaults to `dinewheel.db` in the platform data directory
    pub database_path: Option<PathBuf>,
    /// JSON dataset imported at startup
    pub restaurants_path: Option<PathBuf>,
    /// Fixed seed for reproducible spins, shuffles and tie-breaks
    pub rng_seed: Option<u64>,
    pub max_peers: usize,
    /// Rooms untouched this long are closed and their codes freed; 0 keeps
    /// rooms forever
    pub room_idle_hours: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_path: None,
            restaurants_path: None,
            rng_seed: None,
            max_peers: DEFAULT_MAX_PEERS,
            room_idle_hours: DEFAULT_ROOM_IDLE_HOURS,
        }
    }
}

fn project_dirs() -> Result<ProjectDirs, ConfigError> {
    ProjectDirs::from("dev", "onyx", "dinewheel").ok_or(ConfigError::NoProjectDirs)
}

impl AppConfig {
    /// Load from `explicit` if given (it must exist), otherwise from the
    /// default location if present, then apply environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) if !path.exists() => {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Some(path) => Self::from_file(path)?,
            None => {
                let path = project_dirs()?.config_dir().join(CONFIG_FILE);
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `DINEWHEEL_*` overrides looked up through `var`
    pub fn apply_overrides<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = var("DINEWHEEL_PORT") {
            self.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "DINEWHEEL_PORT",
                value: port.clone(),
            })?;
        }
        if let Some(db) = var("DINEWHEEL_DB") {
            self.database_path = Some(PathBuf::from(db));
        }
        Ok(())
    }

    /// How long a room may sit untouched, `None` when expiry is off
    pub fn room_idle(&self) -> Option<Duration> {
        (self.room_idle_hours > 0)
            .then(|| Duration::from_secs(self.room_idle_hours.saturating_mul(3600)))
    }

    /// Configured database path, or the platform default
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(project_dirs()?.data_dir().join(DATABASE_FILE)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_fill_missing_keys() {
        let config = AppConfig::from_toml("rng_seed = 7\n").unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.max_peers, 64);
        assert_eq!(config.rng_seed, Some(7));
        assert!(config.database_path.is_none());
        assert_eq!(config.room_idle(), Some(Duration::from_secs(24 * 3600)));
    }

    #[test]
    fn test_room_expiry_can_be_disabled() {
        let config = AppConfig::from_toml("room_idle_hours = 0\n").unwrap();
        assert_eq!(config.room_idle(), None);

        let config = AppConfig::from_toml("room_idle_hours = 2\n").unwrap();
        assert_eq!(config.room_idle(), Some(Duration::from_secs(7200)));
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 9000").unwrap();
        writeln!(file, "database_path = \"/tmp/rooms.db\"").unwrap();
        writeln!(file, "restaurants_path = \"data/nyc.json\"").unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(
            config.database_path().unwrap(),
            PathBuf::from("/tmp/rooms.db")
        );
        assert_eq!(config.restaurants_path, Some(PathBuf::from("data/nyc.json")));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            AppConfig::load(Some(&missing)),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn test_bad_toml_is_error() {
        assert!(matches!(
            AppConfig::from_toml("port = \"many\""),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> =
            HashMap::from([("DINEWHEEL_PORT", "7500"), ("DINEWHEEL_DB", "/srv/dw.db")]);
        let mut config = AppConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.port, 7500);
        assert_eq!(config.database_path, Some(PathBuf::from("/srv/dw.db")));

        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(|k| (k == "DINEWHEEL_PORT").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}

//! Durable local storage.
//!
//! JSON files in the platform-appropriate config directory:
//! - Linux: `~/.config/campusnet/`
//! - macOS: `~/Library/Application Support/campusnet/`
//! - Windows: `%APPDATA%\campusnet\`

use std::path::PathBuf;

use serde::{de::DeserializeOwned, Serialize};

/// Namespace prefix shared by every record this app persists.
pub const STORAGE_PREFIX: &str = "campusnet_user_data";

/// The profile blob.
pub const PROFILE_KEY: &str = "campusnet_user_data_profile";
/// The saved-event-id list.
pub const SAVED_EVENTS_KEY: &str = "campusnet_user_data_saved_events";
/// The registered-event-id list.
pub const REGISTERED_EVENTS_KEY: &str = "campusnet_user_data_registered_events";
/// The persisted auth session.
pub const SESSION_KEY: &str = "campusnet_user_data_session";

#[derive(Debug, Clone)]
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    /// Open storage rooted at the platform config directory.
    pub fn open_default() -> Self {
        let dir = dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("campusnet");
        Self { dir }
    }

    /// Open storage rooted at an explicit directory.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Save a value to persistent storage.
    ///
    /// Returns `true` if the operation succeeded.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> bool {
        let Ok(json) = serde_json::to_string(value) else {
            return false;
        };
        let Some(path) = self.file_path(key) else {
            return false;
        };
        std::fs::write(path, json).is_ok()
    }

    /// Load a value from persistent storage.
    ///
    /// Returns `None` if the key doesn't exist or deserialization fails.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.dir.join(Self::file_name(key));
        let json = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&json).ok()
    }

    /// Remove a value from persistent storage.
    pub fn remove(&self, key: &str) {
        let _ = std::fs::remove_file(self.dir.join(Self::file_name(key)));
    }

    /// Check if a key exists in storage.
    pub fn exists(&self, key: &str) -> bool {
        self.dir.join(Self::file_name(key)).exists()
    }

    fn file_path(&self, key: &str) -> Option<PathBuf> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir).ok()?;
        }
        Some(self.dir.join(Self::file_name(key)))
    }

    /// Sanitize a key to be a valid filename.
    fn file_name(key: &str) -> String {
        let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        format!("{safe_key}.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_storage() -> Storage {
        let dir = std::env::temp_dir()
            .join("campusnet-tests")
            .join(uuid::Uuid::new_v4().to_string());
        Storage::open(dir)
    }

    #[test]
    fn round_trips_json_values() {
        let storage = scratch_storage();
        assert!(storage.load::<Vec<String>>(SAVED_EVENTS_KEY).is_none());

        let ids = vec!["evt-1".to_string(), "evt-2".to_string()];
        assert!(storage.save(SAVED_EVENTS_KEY, &ids));
        assert!(storage.exists(SAVED_EVENTS_KEY));
        assert_eq!(storage.load::<Vec<String>>(SAVED_EVENTS_KEY), Some(ids));

        storage.remove(SAVED_EVENTS_KEY);
        assert!(!storage.exists(SAVED_EVENTS_KEY));
        // removing again is a no-op
        storage.remove(SAVED_EVENTS_KEY);
    }
}

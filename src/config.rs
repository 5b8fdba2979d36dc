use crate::db::KeyValueStore;
use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Storage key holding an optional JSON override of [`SyncConfig`].
pub const CONFIG_KEY: &str = "backgroundMusic.config";

pub const DEFAULT_SOURCE_URL: &str = "/assets/background-music.mp3";
pub const DEFAULT_ELEMENT_ID: &str = "globalBackgroundMusic";
pub const DEFAULT_VOLUME: f64 = 0.3;

/// Names of the keys written to the origin's local storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageKeys {
    pub playing: String,
    pub current_time: String,
    pub timestamp: String,
    pub volume: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            playing: "musicPlaying".to_string(),
            current_time: "musicCurrentTime".to_string(),
            timestamp: "musicTimestamp".to_string(),
            volume: "musicVolume".to_string(),
        }
    }
}

/// Background music settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub source_url: String,
    pub element_id: String,
    pub default_volume: f64,
    pub sync_interval_ms: u32,
    /// Settle time before resuming a track that was playing on the previous page.
    pub autoplay_delay_ms: u32,
    pub keys: StorageKeys,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            element_id: DEFAULT_ELEMENT_ID.to_string(),
            default_volume: DEFAULT_VOLUME,
            sync_interval_ms: 1000,
            autoplay_delay_ms: 500,
            keys: StorageKeys::default(),
        }
    }
}

impl SyncConfig {
    pub fn from_json(raw: &str) -> SyncResult<Self> {
        serde_json::from_str(raw).map_err(|e| SyncError::Config(e.to_string()))
    }

    /// Load overrides stored under `key`, falling back to defaults when the
    /// entry is missing or malformed.
    pub fn load(store: &dyn KeyValueStore, key: &str) -> Self {
        match store.get(key) {
            Some(raw) => match Self::from_json(&raw) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!(%err, key, "ignoring stored background music config");
                    Self::default()
                }
            },
            None => Self::default(),
        }
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.sync_interval_ms.max(1)))
    }

    pub fn autoplay_delay(&self) -> Duration {
        Duration::from_millis(u64::from(self.autoplay_delay_ms))
    }
}

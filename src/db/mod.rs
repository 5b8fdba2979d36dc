use crate::config::StorageKeys;
use crate::error::SyncResult;
use crate::utils::{clamp_volume, parse_stored_f64, parse_stored_millis};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[cfg(target_arch = "wasm32")]
use crate::error::SyncError;
#[cfg(target_arch = "wasm32")]
use gloo_storage::{LocalStorage, Storage};

/// String-keyed, string-valued persistence scoped to the browsing origin.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> SyncResult<()>;
    fn remove(&self, key: &str) -> SyncResult<()>;
}

/// `window.localStorage`. Values are written raw so plain page scripts can
/// read them back without JSON decoding.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserStore;

#[cfg(target_arch = "wasm32")]
impl KeyValueStore for BrowserStore {
    fn get(&self, key: &str) -> Option<String> {
        LocalStorage::raw().get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) -> SyncResult<()> {
        LocalStorage::raw()
            .set_item(key, value)
            .map_err(|e| SyncError::storage_unavailable(format!("{e:?}")))
    }

    fn remove(&self, key: &str) -> SyncResult<()> {
        LocalStorage::raw()
            .remove_item(key)
            .map_err(|e| SyncError::storage_unavailable(format!("{e:?}")))
    }
}

/// In-memory store used off the browser and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn contains(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> SyncResult<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> SyncResult<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// Last checkpoint written by a previous page.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PersistedState {
    pub playing: bool,
    /// Seconds into the track at `saved_at_ms`.
    pub position: f64,
    pub saved_at_ms: i64,
}

/// Typed access to the session keys plus the volume preference.
///
/// Write failures are logged and swallowed: losing a checkpoint only costs a
/// small jump on the next page.
#[derive(Clone)]
pub struct SessionStore {
    store: Rc<dyn KeyValueStore>,
    keys: StorageKeys,
}

impl SessionStore {
    pub fn new(store: Rc<dyn KeyValueStore>, keys: StorageKeys) -> Self {
        Self { store, keys }
    }

    pub fn load(&self) -> PersistedState {
        let playing = self.store.get(&self.keys.playing).as_deref() == Some("true");
        let position = parse_stored_f64(self.store.get(&self.keys.current_time).as_deref());
        let saved_at_ms = parse_stored_millis(self.store.get(&self.keys.timestamp).as_deref());
        PersistedState {
            playing,
            position,
            saved_at_ms,
        }
    }

    pub fn save_playing(&self, playing: bool) {
        let value = if playing { "true" } else { "false" };
        self.write(&self.keys.playing, value);
    }

    pub fn save_checkpoint(&self, position: f64, now_ms: i64) {
        self.write(&self.keys.current_time, &position.to_string());
        self.write(&self.keys.timestamp, &now_ms.to_string());
    }

    /// Drop the three session keys. The volume preference survives.
    pub fn clear(&self) {
        for key in [
            &self.keys.playing,
            &self.keys.current_time,
            &self.keys.timestamp,
        ] {
            if let Err(err) = self.store.remove(key) {
                tracing::warn!(%err, key = key.as_str(), "failed to clear background music key");
            }
        }
    }

    pub fn load_volume(&self) -> Option<f64> {
        let raw = self.store.get(&self.keys.volume)?;
        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|volume| !volume.is_nan())
            .map(clamp_volume)
    }

    pub fn save_volume(&self, volume: f64) {
        self.write(&self.keys.volume, &volume.to_string());
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(err) = self.store.set(key, value) {
            tracing::warn!(%err, key, "failed to persist background music state");
        }
    }
}

//! Background music that survives page navigations.
//!
//! A single looping track is checkpointed to local storage while it plays and
//! projected forward on the next page load, so the music appears to continue
//! uninterrupted. When the browser blocks autoplay, a floating toggle appears
//! and the next click, key press or touch resumes playback.

pub mod components;
pub mod config;
pub mod db;
pub mod error;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use components::audio_manager::{PlaybackSyncController, SyncState};
pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};

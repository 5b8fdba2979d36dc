use thiserror::Error;

/// Failures the background music controller can run into.
///
/// None of these are fatal to the hosting page: they are logged and the
/// controller degrades to a no-op.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error("failed to initialize background music: {0}")]
    Initialization(String),
    #[error("playback rejected: {0}")]
    PlaybackRejected(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("invalid background music config: {0}")]
    Config(String),
}

impl SyncError {
    pub fn initialization(message: impl Into<String>) -> Self {
        SyncError::Initialization(message.into())
    }

    pub fn playback_rejected(message: impl Into<String>) -> Self {
        SyncError::PlaybackRejected(message.into())
    }

    pub fn storage_unavailable(message: impl Into<String>) -> Self {
        SyncError::StorageUnavailable(message.into())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

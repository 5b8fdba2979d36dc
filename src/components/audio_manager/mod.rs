//! Audio Manager - owns the background track outside of the component render cycle.
//! Keeps audio side-effects behind platform seams so the sync logic runs anywhere.

mod controller;
mod platform;
mod sync;

// Browser backends: audio element, local storage, timers, document events.
#[cfg(target_arch = "wasm32")]
mod web_backend;
// Stand-ins for targets without a DOM; the controller stays disabled there.
#[cfg(not(target_arch = "wasm32"))]
mod headless_backend;


pub use controller::{PlaybackSyncController, SyncState};
pub use platform::{
    Clock, DocumentHost, GestureKind, HandleOptions, IndicatorView, LocalFuture, MediaEvent,
    PlaybackHandle, Platform, Scheduler, Subscription, SystemClock, TaskSpawner,
    ToggleIndicator,
};
pub use sync::{project_position, PersistTimer};

#[cfg(target_arch = "wasm32")]
pub use web_backend::{browser_platform, AudioElementHandle, BrowserDocument, LocalTaskSpawner, TimerScheduler};
#[cfg(not(target_arch = "wasm32"))]
pub use headless_backend::{headless_platform, HeadlessDocument, HeadlessScheduler, HeadlessSpawner};

//! Seams between the controller and its host environment.
//!
//! Everything the controller touches outside its own state goes through one of
//! these traits, so the browser backends can be swapped for deterministic
//! doubles.
use crate::db::KeyValueStore;
use crate::error::SyncResult;
use futures_util::future::LocalBoxFuture;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

pub type LocalFuture<T> = LocalBoxFuture<'static, T>;

/// A live registration of one or more listeners or a recurring task.
///
/// Cancelling, explicitly or by dropping, tears down everything it covers.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to tear down.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    /// Bundle several registrations so they are removed in one call.
    pub fn merge(parts: Vec<Subscription>) -> Self {
        Self::new(move || {
            for part in parts {
                part.cancel();
            }
        })
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

pub trait Clock {
    /// Wall-clock time in epoch milliseconds.
    fn now_ms(&self) -> i64;
}

/// Wall clock of the running target.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[cfg(target_arch = "wasm32")]
    fn now_ms(&self) -> i64 {
        js_sys::Date::now() as i64
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

pub trait Scheduler {
    /// Run `tick` every `period` until the returned subscription is cancelled.
    fn every(&self, period: Duration, tick: Box<dyn FnMut()>) -> Subscription;
    fn sleep(&self, duration: Duration) -> LocalFuture<()>;
}

pub trait TaskSpawner {
    fn spawn(&self, task: LocalFuture<()>);
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    CanPlay,
    Play,
    Pause,
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    Click,
    KeyDown,
    TouchStart,
}

/// The single audio source the controller drives.
pub trait PlaybackHandle {
    fn position(&self) -> f64;
    fn set_position(&self, seconds: f64);
    /// `None` until the source has loaded, or when it has no finite length.
    fn duration(&self) -> Option<f64>;
    fn is_paused(&self) -> bool;
    fn volume(&self) -> f64;
    fn set_volume(&self, volume: f64);
    /// Resolves once the host accepted or refused to start playback.
    fn request_play(&self) -> LocalFuture<SyncResult<()>>;
    fn pause(&self);
    fn subscribe(&self, listener: Rc<dyn Fn(MediaEvent)>) -> Subscription;
}

#[derive(Debug, Clone, PartialEq)]
pub struct HandleOptions {
    pub source_url: String,
    pub element_id: String,
    pub volume: f64,
    pub looping: bool,
}

/// Page-level hooks: load state, visibility, unload and user gestures.
pub trait DocumentHost {
    fn is_loading(&self) -> bool;
    /// One-shot notification once the document is interactive.
    fn on_ready(&self, callback: Box<dyn FnOnce()>) -> Subscription;
    /// Called with `true` when the page becomes visible again.
    fn on_visibility_change(&self, callback: Rc<dyn Fn(bool)>) -> Subscription;
    fn on_before_unload(&self, callback: Rc<dyn Fn()>) -> Subscription;
    /// Click, key-press and touch on the whole document, behind one subscription.
    fn on_gesture(&self, callback: Rc<dyn Fn(GestureKind)>) -> Subscription;
    /// Create the hidden audio element and attach it to the document.
    fn create_handle(&self, options: &HandleOptions) -> SyncResult<Rc<dyn PlaybackHandle>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorView {
    pub playing: bool,
    pub dimmed: bool,
}

/// The floating toggle shown once autoplay has been blocked.
pub trait ToggleIndicator {
    /// Create the control if it does not exist yet.
    fn show(&self, playing: bool);
    /// Reflect the play state. Does nothing until [`ToggleIndicator::show`].
    fn refresh(&self, playing: bool);
    fn dim(&self);
}

/// Everything a controller needs from its environment.
#[derive(Clone)]
pub struct Platform {
    pub store: Rc<dyn KeyValueStore>,
    pub clock: Rc<dyn Clock>,
    pub scheduler: Rc<dyn Scheduler>,
    pub spawner: Rc<dyn TaskSpawner>,
    pub document: Rc<dyn DocumentHost>,
    pub indicator: Rc<dyn ToggleIndicator>,
}

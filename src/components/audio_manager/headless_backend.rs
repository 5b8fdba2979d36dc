// Native builds have no DOM to host the audio element, so the controller is
// wired to stand-ins that refuse handle creation and leave it disabled.
use super::platform::{
    DocumentHost, GestureKind, HandleOptions, LocalFuture, PlaybackHandle, Platform, Scheduler,
    Subscription, SystemClock, TaskSpawner, ToggleIndicator,
};
use crate::db::MemoryStore;
use crate::error::{SyncError, SyncResult};
use futures_util::FutureExt;
use std::rc::Rc;
use std::time::Duration;

pub fn headless_platform(indicator: Rc<dyn ToggleIndicator>) -> Platform {
    Platform {
        store: Rc::new(MemoryStore::default()),
        clock: Rc::new(SystemClock),
        scheduler: Rc::new(HeadlessScheduler),
        spawner: Rc::new(HeadlessSpawner),
        document: Rc::new(HeadlessDocument),
        indicator,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessDocument;

impl DocumentHost for HeadlessDocument {
    fn is_loading(&self) -> bool {
        false
    }

    fn on_ready(&self, callback: Box<dyn FnOnce()>) -> Subscription {
        callback();
        Subscription::noop()
    }

    fn on_visibility_change(&self, _callback: Rc<dyn Fn(bool)>) -> Subscription {
        Subscription::noop()
    }

    fn on_before_unload(&self, _callback: Rc<dyn Fn()>) -> Subscription {
        Subscription::noop()
    }

    fn on_gesture(&self, _callback: Rc<dyn Fn(GestureKind)>) -> Subscription {
        Subscription::noop()
    }

    fn create_handle(&self, _options: &HandleOptions) -> SyncResult<Rc<dyn PlaybackHandle>> {
        Err(SyncError::initialization(
            "background music needs a browser audio element",
        ))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessScheduler;

impl Scheduler for HeadlessScheduler {
    fn every(&self, _period: Duration, _tick: Box<dyn FnMut()>) -> Subscription {
        Subscription::noop()
    }

    fn sleep(&self, _duration: Duration) -> LocalFuture<()> {
        futures_util::future::ready(()).boxed_local()
    }
}

/// Drops tasks; nothing can be spawned before a handle exists, and none ever does here.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessSpawner;

impl TaskSpawner for HeadlessSpawner {
    fn spawn(&self, _task: LocalFuture<()>) {
        tracing::debug!("dropping background music task on headless target");
    }
}

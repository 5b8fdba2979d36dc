// Playback sync controller: lifecycle, persistence wiring and autoplay recovery.
use super::platform::{
    GestureKind, HandleOptions, MediaEvent, PlaybackHandle, Platform, Subscription,
};
use super::sync::{project_position, PersistTimer};
use crate::config::SyncConfig;
use crate::db::SessionStore;
use crate::error::{SyncError, SyncResult};
use crate::utils::clamp_volume;
use futures_util::FutureExt;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::{Rc, Weak};
use tracing::{debug, error, info, warn};

/// Where the controller stands in the autoplay-recovery flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Uninitialized,
    Initialized,
    AutoplayAttempted,
    AwaitingUserGesture,
    /// A gesture was seen and its play request is in flight.
    RecoveryPending,
    Playing,
}

struct Inner {
    config: SyncConfig,
    platform: Platform,
    session: SessionStore,
    state: Cell<SyncState>,
    volume: Cell<f64>,
    init_requested: Cell<bool>,
    skip_pause_checkpoint: Cell<bool>,
    handle: RefCell<Option<Rc<dyn PlaybackHandle>>>,
    timer: PersistTimer,
    listeners: RefCell<Vec<Subscription>>,
    gesture: RefCell<Option<Subscription>>,
    pending_ready: RefCell<Option<Subscription>>,
}

/// Keeps one looping background track in step across page loads.
///
/// Cheap to clone; every clone drives the same audio handle. Build one per
/// page in the composition root and hand it out through context. Every
/// operation is safe before [`PlaybackSyncController::initialize`] has
/// completed, and degrades to a no-op (or `false`) if setup failed.
#[derive(Clone)]
pub struct PlaybackSyncController {
    inner: Rc<Inner>,
}

impl PlaybackSyncController {
    pub fn new(config: SyncConfig, platform: Platform) -> Self {
        let session = SessionStore::new(platform.store.clone(), config.keys.clone());
        let volume = clamp_volume(config.default_volume);
        Self {
            inner: Rc::new(Inner {
                config,
                platform,
                session,
                state: Cell::new(SyncState::Uninitialized),
                volume: Cell::new(volume),
                init_requested: Cell::new(false),
                skip_pause_checkpoint: Cell::new(false),
                handle: RefCell::new(None),
                timer: PersistTimer::default(),
                listeners: RefCell::new(Vec::new()),
                gesture: RefCell::new(None),
                pending_ready: RefCell::new(None),
            }),
        }
    }

    fn from_weak(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    fn weak(&self) -> Weak<Inner> {
        Rc::downgrade(&self.inner)
    }

    fn handle(&self) -> Option<Rc<dyn PlaybackHandle>> {
        self.inner.handle.borrow().clone()
    }

    fn spawn(&self, task: impl Future<Output = ()> + 'static) {
        self.inner.platform.spawner.spawn(task.boxed_local());
    }

    pub fn state(&self) -> SyncState {
        self.inner.state.get()
    }

    /// Set up now, or once the document stops loading. Later calls are ignored.
    pub fn initialize(&self) {
        if self.inner.init_requested.replace(true) {
            debug!("background music already initializing");
            return;
        }

        let document = self.inner.platform.document.clone();
        if document.is_loading() {
            debug!("document still loading; deferring background music setup");
            let weak = self.weak();
            let ready = document.on_ready(Box::new(move || {
                if let Some(controller) = Self::from_weak(&weak) {
                    controller.setup();
                    controller.release_ready_listener();
                }
            }));
            *self.inner.pending_ready.borrow_mut() = Some(ready);
        } else {
            self.setup();
        }
    }

    // Runs inside the host's ready callback, so the registration is torn
    // down from a separate task rather than from under its own closure.
    fn release_ready_listener(&self) {
        let ready = self.inner.pending_ready.borrow_mut().take();
        let Some(ready) = ready else {
            return;
        };
        self.spawn(async move { ready.cancel() });
    }

    fn setup(&self) {
        let inner = &self.inner;
        if inner.state.get() != SyncState::Uninitialized {
            return;
        }

        if let Some(saved) = inner.session.load_volume() {
            inner.volume.set(saved);
        }

        let options = HandleOptions {
            source_url: inner.config.source_url.clone(),
            element_id: inner.config.element_id.clone(),
            volume: inner.volume.get(),
            looping: true,
        };
        let handle = match inner.platform.document.create_handle(&options) {
            Ok(handle) => handle,
            Err(err) => {
                error!(%err, "background music disabled");
                return;
            }
        };
        *inner.handle.borrow_mut() = Some(handle.clone());

        inner.state.set(SyncState::Initialized);
        info!(source = %inner.config.source_url, "background music initialized");

        self.wire_events(&*handle);
        self.attempt_autoplay();
    }

    fn wire_events(&self, handle: &dyn PlaybackHandle) {
        let document = self.inner.platform.document.clone();

        let weak = self.weak();
        let media = handle.subscribe(Rc::new(move |event: MediaEvent| {
            if let Some(controller) = Self::from_weak(&weak) {
                controller.on_media_event(event);
            }
        }));

        let weak = self.weak();
        let visibility = document.on_visibility_change(Rc::new(move |visible: bool| {
            if !visible {
                return;
            }
            if let Some(controller) = Self::from_weak(&weak) {
                controller.resync();
            }
        }));

        let weak = self.weak();
        let unload = document.on_before_unload(Rc::new(move || {
            if let Some(controller) = Self::from_weak(&weak) {
                controller.checkpoint_before_unload();
            }
        }));

        self.inner
            .listeners
            .borrow_mut()
            .extend([media, visibility, unload]);
    }

    fn on_media_event(&self, event: MediaEvent) {
        match event {
            MediaEvent::CanPlay => {
                debug!("background music ready to play");
                self.resync();
            }
            MediaEvent::Play => {
                info!("background music started");
                self.inner.session.save_playing(true);
                self.start_persist_timer();
                self.enter_playing();
            }
            MediaEvent::Pause => {
                self.inner.timer.stop();
                if self.inner.skip_pause_checkpoint.replace(false) {
                    debug!("background music stopped");
                } else {
                    info!("background music paused");
                    self.inner.session.save_playing(false);
                    self.checkpoint();
                }
            }
            MediaEvent::Error(message) => {
                error!(%message, "background music error");
            }
        }
        self.refresh_indicator();
    }

    fn start_persist_timer(&self) {
        let weak = self.weak();
        self.inner.timer.start(
            self.inner.platform.scheduler.as_ref(),
            self.inner.config.sync_interval(),
            Box::new(move || {
                if let Some(controller) = Self::from_weak(&weak) {
                    controller.persist_tick();
                }
            }),
        );
    }

    /// Write the current position if the track is playing.
    pub fn persist_tick(&self) {
        if self.is_playing() {
            self.checkpoint();
        }
    }

    fn checkpoint(&self) {
        let Some(handle) = self.handle() else {
            return;
        };
        let now = self.inner.platform.clock.now_ms();
        self.inner.session.save_checkpoint(handle.position(), now);
    }

    fn checkpoint_before_unload(&self) {
        let Some(handle) = self.handle() else {
            return;
        };
        if handle.is_paused() {
            return;
        }
        self.checkpoint();
        debug!(position = handle.position(), "background music position saved");
    }

    /// Move the track to where the previous page's checkpoint projects it and
    /// resume playback. Does nothing unless that page was playing.
    pub fn resync(&self) {
        let Some(handle) = self.handle() else {
            return;
        };
        let saved = self.inner.session.load();
        let now = self.inner.platform.clock.now_ms();
        let Some(position) = project_position(&saved, now, handle.duration()) else {
            return;
        };

        handle.set_position(position);
        info!(position, "background music resynchronized");

        let controller = self.clone();
        self.spawn(async move {
            controller.play().await;
        });
    }

    fn attempt_autoplay(&self) {
        if !self.inner.session.load().playing {
            debug!("background music was not playing on the previous page");
            return;
        }
        self.inner.state.set(SyncState::AutoplayAttempted);

        let controller = self.clone();
        let scheduler = self.inner.platform.scheduler.clone();
        let delay = self.inner.config.autoplay_delay();
        self.spawn(async move {
            scheduler.sleep(delay).await;
            match controller.request_play().await {
                Ok(()) => {
                    info!("background music resumed from previous page");
                    controller.enter_playing();
                }
                Err(err) => {
                    info!(%err, "autoplay blocked; waiting for user interaction");
                    controller.await_user_gesture();
                }
            }
        });
    }

    fn enter_playing(&self) {
        if self.inner.state.get() == SyncState::Uninitialized {
            return;
        }
        self.inner.state.set(SyncState::Playing);
        let gesture = self.inner.gesture.borrow_mut().take();
        if let Some(gesture) = gesture {
            gesture.cancel();
        }
    }

    fn await_user_gesture(&self) {
        match self.inner.state.get() {
            SyncState::Playing | SyncState::Uninitialized => return,
            _ => {}
        }
        self.inner.state.set(SyncState::AwaitingUserGesture);
        self.inner.platform.indicator.show(self.is_playing());

        if self.inner.gesture.borrow().is_some() {
            return;
        }
        let weak = self.weak();
        let gesture = self
            .inner
            .platform
            .document
            .on_gesture(Rc::new(move |kind: GestureKind| {
                if let Some(controller) = Self::from_weak(&weak) {
                    controller.on_user_gesture(kind);
                }
            }));
        *self.inner.gesture.borrow_mut() = Some(gesture);
    }

    fn on_user_gesture(&self, kind: GestureKind) {
        if self.inner.state.get() != SyncState::AwaitingUserGesture {
            return;
        }
        self.inner.state.set(SyncState::RecoveryPending);
        debug!(?kind, "user gesture received; starting background music");

        let controller = self.clone();
        self.spawn(async move {
            controller.recover_after_gesture().await;
        });
    }

    async fn recover_after_gesture(&self) {
        let Some(handle) = self.handle() else {
            return;
        };
        let started = if handle.is_paused() {
            self.toggle().await
        } else {
            true
        };

        if started {
            self.enter_playing();
            self.inner.platform.indicator.dim();
        } else {
            // Listeners stay registered so the next gesture can retry.
            warn!("background music still blocked after user gesture");
            if self.inner.state.get() == SyncState::RecoveryPending {
                self.inner.state.set(SyncState::AwaitingUserGesture);
            }
        }
        self.refresh_indicator();
    }

    async fn request_play(&self) -> SyncResult<()> {
        let Some(handle) = self.handle() else {
            return Err(SyncError::initialization("background music not initialized"));
        };
        handle.request_play().await
    }

    /// Ask the host to start playback. `false` if it refused or the
    /// controller is not initialized.
    pub async fn play(&self) -> bool {
        match self.request_play().await {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "could not play background music");
                false
            }
        }
    }

    pub fn pause(&self) {
        let Some(handle) = self.handle() else {
            return;
        };
        handle.pause();
        self.inner.timer.stop();
    }

    /// Play when paused, pause when playing. Returns the outcome of whichever
    /// action ran.
    pub async fn toggle(&self) -> bool {
        let Some(handle) = self.handle() else {
            return false;
        };
        let outcome = if handle.is_paused() {
            self.play().await
        } else {
            self.pause();
            true
        };
        self.refresh_indicator();
        outcome
    }

    pub fn set_volume(&self, volume: f64) {
        let Some(handle) = self.handle() else {
            return;
        };
        let volume = clamp_volume(volume);
        self.inner.volume.set(volume);
        handle.set_volume(volume);
        self.inner.session.save_volume(volume);
    }

    pub fn volume(&self) -> f64 {
        self.inner.volume.get()
    }

    /// Pause, rewind and forget the session so the next page starts silent.
    pub fn stop(&self) {
        self.inner.timer.stop();
        if let Some(handle) = self.handle() {
            if !handle.is_paused() {
                self.inner.skip_pause_checkpoint.set(true);
            }
            handle.pause();
            handle.set_position(0.0);
        }
        self.inner.session.clear();
        self.refresh_indicator();
    }

    pub fn is_available(&self) -> bool {
        self.inner.state.get() != SyncState::Uninitialized
    }

    pub fn is_playing(&self) -> bool {
        self.handle().is_some_and(|handle| !handle.is_paused())
    }

    fn refresh_indicator(&self) {
        self.inner.platform.indicator.refresh(self.is_playing());
    }
}

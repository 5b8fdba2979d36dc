//! Deterministic doubles for the platform seams.
use crate::components::audio_manager::{
    Clock, DocumentHost, GestureKind, HandleOptions, IndicatorView, LocalFuture, MediaEvent,
    PlaybackHandle, PlaybackSyncController, Platform, Scheduler, Subscription, TaskSpawner,
    ToggleIndicator,
};
use crate::config::SyncConfig;
use crate::db::MemoryStore;
use crate::error::{SyncError, SyncResult};
use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawnExt;
use futures_util::FutureExt;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

/// Listeners keyed by registration id, removable through a [`Subscription`].
pub struct ListenerSet<T: Clone + 'static> {
    entries: Rc<RefCell<Vec<(u64, Rc<dyn Fn(T)>)>>>,
    next_id: Cell<u64>,
}

impl<T: Clone + 'static> Default for ListenerSet<T> {
    fn default() -> Self {
        Self {
            entries: Rc::new(RefCell::new(Vec::new())),
            next_id: Cell::new(0),
        }
    }
}

impl<T: Clone + 'static> ListenerSet<T> {
    pub fn add(&self, listener: Rc<dyn Fn(T)>) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.entries.borrow_mut().push((id, listener));
        let entries = Rc::downgrade(&self.entries);
        Subscription::new(move || {
            if let Some(entries) = entries.upgrade() {
                entries.borrow_mut().retain(|(entry, _)| *entry != id);
            }
        })
    }

    pub fn emit(&self, value: T) {
        let listeners: Vec<_> = self
            .entries
            .borrow()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(value.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

#[derive(Default)]
pub struct ManualClock {
    now: Cell<i64>,
}

impl ManualClock {
    pub fn set(&self, now_ms: i64) {
        self.now.set(now_ms);
    }

    pub fn advance(&self, millis: i64) {
        self.now.set(self.now.get() + millis);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.get()
    }
}

type Task = Rc<RefCell<Box<dyn FnMut()>>>;

/// Recurring tasks only run when [`ManualScheduler::tick`] is called; sleeps
/// complete immediately.
#[derive(Default)]
pub struct ManualScheduler {
    tasks: Rc<RefCell<Vec<(u64, Task)>>>,
    next_id: Cell<u64>,
    sleeps: RefCell<Vec<Duration>>,
}

impl ManualScheduler {
    /// Fire every active task once; returns how many ran.
    pub fn tick(&self) -> usize {
        let tasks: Vec<Task> = self
            .tasks
            .borrow()
            .iter()
            .map(|(_, task)| task.clone())
            .collect();
        for task in &tasks {
            (task.borrow_mut())();
        }
        tasks.len()
    }

    pub fn active_count(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Scheduler for ManualScheduler {
    fn every(&self, _period: Duration, tick: Box<dyn FnMut()>) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.tasks
            .borrow_mut()
            .push((id, Rc::new(RefCell::new(tick))));
        let tasks = Rc::downgrade(&self.tasks);
        Subscription::new(move || {
            if let Some(tasks) = tasks.upgrade() {
                tasks.borrow_mut().retain(|(task, _)| *task != id);
            }
        })
    }

    fn sleep(&self, duration: Duration) -> LocalFuture<()> {
        self.sleeps.borrow_mut().push(duration);
        futures_util::future::ready(()).boxed_local()
    }
}

impl TaskSpawner for LocalSpawner {
    fn spawn(&self, task: LocalFuture<()>) {
        if let Err(err) = self.spawn_local(task) {
            panic!("test executor shut down: {err}");
        }
    }
}

struct Media {
    position: f64,
    paused: bool,
    volume: f64,
    duration: Option<f64>,
    looping: bool,
    source_url: String,
}

struct FakeHandleState {
    media: RefCell<Media>,
    listeners: ListenerSet<MediaEvent>,
    play_requests: Cell<usize>,
    reject_play: Cell<bool>,
    defer_pause: Cell<bool>,
    queued: RefCell<Vec<MediaEvent>>,
}

impl FakeHandleState {
    fn start(&self) -> SyncResult<()> {
        if self.reject_play.get() {
            return Err(SyncError::playback_rejected("NotAllowedError"));
        }
        let was_paused = {
            let mut media = self.media.borrow_mut();
            let was_paused = media.paused;
            media.paused = false;
            was_paused
        };
        if was_paused {
            self.listeners.emit(MediaEvent::Play);
        }
        Ok(())
    }
}

/// Audio element double. Play requests resolve when the executor runs.
#[derive(Clone)]
pub struct FakeHandle {
    state: Rc<FakeHandleState>,
}

impl FakeHandle {
    fn new(options: &HandleOptions, duration: Option<f64>) -> Self {
        Self {
            state: Rc::new(FakeHandleState {
                media: RefCell::new(Media {
                    position: 0.0,
                    paused: true,
                    volume: options.volume,
                    duration,
                    looping: options.looping,
                    source_url: options.source_url.clone(),
                }),
                listeners: ListenerSet::default(),
                play_requests: Cell::new(0),
                reject_play: Cell::new(false),
                defer_pause: Cell::new(false),
                queued: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn play_requests(&self) -> usize {
        self.state.play_requests.get()
    }

    pub fn reject_play(&self, reject: bool) {
        self.state.reject_play.set(reject);
    }

    pub fn is_looping(&self) -> bool {
        self.state.media.borrow().looping
    }

    pub fn source_url(&self) -> String {
        self.state.media.borrow().source_url.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.state.listeners.len()
    }

    /// Deliver a media event as the element would.
    pub fn emit(&self, event: MediaEvent) {
        self.state.listeners.emit(event);
    }

    /// Hold `Pause` events back until [`FakeHandle::flush_events`], the way a
    /// browser dispatches them after `pause()` has returned.
    pub fn defer_pause_events(&self, defer: bool) {
        self.state.defer_pause.set(defer);
    }

    pub fn flush_events(&self) {
        let queued: Vec<_> = self.state.queued.borrow_mut().drain(..).collect();
        for event in queued {
            self.state.listeners.emit(event);
        }
    }

    /// Mark the element as playing without going through a play request.
    pub fn force_playing(&self) {
        self.state.media.borrow_mut().paused = false;
    }
}

impl PlaybackHandle for FakeHandle {
    fn position(&self) -> f64 {
        self.state.media.borrow().position
    }

    fn set_position(&self, seconds: f64) {
        self.state.media.borrow_mut().position = seconds;
    }

    fn duration(&self) -> Option<f64> {
        self.state.media.borrow().duration
    }

    fn is_paused(&self) -> bool {
        self.state.media.borrow().paused
    }

    fn volume(&self) -> f64 {
        self.state.media.borrow().volume
    }

    fn set_volume(&self, volume: f64) {
        self.state.media.borrow_mut().volume = volume;
    }

    fn request_play(&self) -> LocalFuture<SyncResult<()>> {
        self.state.play_requests.set(self.state.play_requests.get() + 1);
        let state = self.state.clone();
        async move { state.start() }.boxed_local()
    }

    fn pause(&self) {
        let was_playing = {
            let mut media = self.state.media.borrow_mut();
            let was_playing = !media.paused;
            media.paused = true;
            was_playing
        };
        if !was_playing {
            return;
        }
        if self.state.defer_pause.get() {
            self.state.queued.borrow_mut().push(MediaEvent::Pause);
        } else {
            self.state.listeners.emit(MediaEvent::Pause);
        }
    }

    fn subscribe(&self, listener: Rc<dyn Fn(MediaEvent)>) -> Subscription {
        self.state.listeners.add(listener)
    }
}

#[derive(Default)]
pub struct FakeDocument {
    loading: Cell<bool>,
    fail_create: Cell<bool>,
    duration: Cell<Option<f64>>,
    ready: RefCell<Vec<Box<dyn FnOnce()>>>,
    ready_listeners: Rc<Cell<usize>>,
    visibility: ListenerSet<bool>,
    unload: ListenerSet<()>,
    gestures: ListenerSet<GestureKind>,
    handle: RefCell<Option<FakeHandle>>,
    created: Cell<usize>,
}

impl FakeDocument {
    pub fn set_loading(&self, loading: bool) {
        self.loading.set(loading);
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.set(fail);
    }

    /// Duration reported by handles created from now on.
    pub fn set_track_duration(&self, duration: Option<f64>) {
        self.duration.set(duration);
    }

    pub fn finish_loading(&self) {
        self.loading.set(false);
        let callbacks: Vec<_> = self.ready.borrow_mut().drain(..).collect();
        for callback in callbacks {
            callback();
        }
    }

    pub fn set_visible(&self, visible: bool) {
        self.visibility.emit(visible);
    }

    pub fn unload(&self) {
        self.unload.emit(());
    }

    pub fn gesture(&self, kind: GestureKind) {
        self.gestures.emit(kind);
    }

    /// Ready registrations not yet cancelled, fired or not.
    pub fn ready_listener_count(&self) -> usize {
        self.ready_listeners.get()
    }

    pub fn gesture_listener_count(&self) -> usize {
        self.gestures.len()
    }

    pub fn handle(&self) -> Option<FakeHandle> {
        self.handle.borrow().clone()
    }

    pub fn created_handles(&self) -> usize {
        self.created.get()
    }
}

impl DocumentHost for FakeDocument {
    fn is_loading(&self) -> bool {
        self.loading.get()
    }

    fn on_ready(&self, callback: Box<dyn FnOnce()>) -> Subscription {
        self.ready.borrow_mut().push(callback);
        let listeners = self.ready_listeners.clone();
        listeners.set(listeners.get() + 1);
        Subscription::new(move || listeners.set(listeners.get() - 1))
    }

    fn on_visibility_change(&self, callback: Rc<dyn Fn(bool)>) -> Subscription {
        self.visibility.add(callback)
    }

    fn on_before_unload(&self, callback: Rc<dyn Fn()>) -> Subscription {
        self.unload.add(Rc::new(move |()| callback()))
    }

    fn on_gesture(&self, callback: Rc<dyn Fn(GestureKind)>) -> Subscription {
        self.gestures.add(callback)
    }

    fn create_handle(&self, options: &HandleOptions) -> SyncResult<Rc<dyn PlaybackHandle>> {
        if self.fail_create.get() {
            return Err(SyncError::initialization("audio element creation blocked"));
        }
        self.created.set(self.created.get() + 1);
        let handle = FakeHandle::new(options, self.duration.get());
        *self.handle.borrow_mut() = Some(handle.clone());
        Ok(Rc::new(handle))
    }
}

#[derive(Default)]
pub struct RecordingIndicator {
    view: Cell<Option<IndicatorView>>,
    shown: Cell<usize>,
}

impl RecordingIndicator {
    pub fn view(&self) -> Option<IndicatorView> {
        self.view.get()
    }

    pub fn times_shown(&self) -> usize {
        self.shown.get()
    }
}

impl ToggleIndicator for RecordingIndicator {
    fn show(&self, playing: bool) {
        self.shown.set(self.shown.get() + 1);
        match self.view.get() {
            Some(view) => self.view.set(Some(IndicatorView { playing, ..view })),
            None => self.view.set(Some(IndicatorView {
                playing,
                dimmed: false,
            })),
        }
    }

    fn refresh(&self, playing: bool) {
        if let Some(view) = self.view.get() {
            self.view.set(Some(IndicatorView { playing, ..view }));
        }
    }

    fn dim(&self) {
        if let Some(view) = self.view.get() {
            self.view.set(Some(IndicatorView {
                dimmed: true,
                ..view
            }));
        }
    }
}

/// A controller wired to fakes, not yet initialized.
pub struct Harness {
    pub pool: LocalPool,
    pub store: Rc<MemoryStore>,
    pub clock: Rc<ManualClock>,
    pub scheduler: Rc<ManualScheduler>,
    pub document: Rc<FakeDocument>,
    pub indicator: Rc<RecordingIndicator>,
    pub controller: PlaybackSyncController,
}

impl Harness {
    pub const NOW: i64 = 1_700_000_000_000;

    pub fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    pub fn with_config(config: SyncConfig) -> Self {
        let pool = LocalPool::new();
        let store = Rc::new(MemoryStore::default());
        let clock = Rc::new(ManualClock::default());
        clock.set(Self::NOW);
        let scheduler = Rc::new(ManualScheduler::default());
        let document = Rc::new(FakeDocument::default());
        let indicator = Rc::new(RecordingIndicator::default());
        let platform = Platform {
            store: store.clone(),
            clock: clock.clone(),
            scheduler: scheduler.clone(),
            spawner: Rc::new(pool.spawner()),
            document: document.clone(),
            indicator: indicator.clone(),
        };
        let controller = PlaybackSyncController::new(config, platform);
        Self {
            pool,
            store,
            clock,
            scheduler,
            document,
            indicator,
            controller,
        }
    }

    /// Run spawned tasks until none can make progress.
    pub fn run(&mut self) {
        self.pool.run_until_stalled();
    }

    pub fn handle(&self) -> FakeHandle {
        match self.document.handle() {
            Some(handle) => handle,
            None => panic!("controller never created a playback handle"),
        }
    }
}

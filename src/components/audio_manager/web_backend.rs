// Browser backends for the playback seams.
use super::platform::{
    DocumentHost, GestureKind, HandleOptions, LocalFuture, MediaEvent, PlaybackHandle, Platform,
    Scheduler, Subscription, SystemClock, TaskSpawner, ToggleIndicator,
};
use crate::db::BrowserStore;
use crate::error::{SyncError, SyncResult};
use futures_util::FutureExt;
use gloo_timers::callback::Interval;
use gloo_timers::future::TimeoutFuture;
use std::rc::Rc;
use std::time::Duration;
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::{window, AddEventListenerOptions, Document, Event, EventTarget, HtmlAudioElement};

/// Wire a controller to the real page.
pub fn browser_platform(indicator: Rc<dyn ToggleIndicator>) -> Platform {
    Platform {
        store: Rc::new(BrowserStore),
        clock: Rc::new(SystemClock),
        scheduler: Rc::new(TimerScheduler),
        spawner: Rc::new(LocalTaskSpawner),
        document: Rc::new(BrowserDocument),
        indicator,
    }
}

fn js_error_text(value: &JsValue) -> String {
    if let Some(text) = value.as_string() {
        return text;
    }
    let field = |name: &str| {
        js_sys::Reflect::get(value, &name.into())
            .ok()
            .and_then(|v| v.as_string())
            .filter(|v| !v.is_empty())
    };
    match (field("name"), field("message")) {
        (Some(name), Some(message)) => format!("{name}: {message}"),
        (Some(text), None) | (None, Some(text)) => text,
        (None, None) => format!("{value:?}"),
    }
}

fn media_error_message(audio: &HtmlAudioElement) -> String {
    let audio_js = JsValue::from(audio.clone());
    let code = js_sys::Reflect::get(&audio_js, &"error".into())
        .ok()
        .filter(|error| !error.is_null() && !error.is_undefined())
        .and_then(|error| js_sys::Reflect::get(&error, &"code".into()).ok())
        .and_then(|code| code.as_f64())
        .unwrap_or(0.0) as u16;

    match code {
        1 => "Playback was aborted before the track loaded.",
        2 => "Network error while loading the background track.",
        3 => "The background track could not be decoded.",
        4 => "No supported source was found for the background track.",
        _ => "Unable to load the background track.",
    }
    .to_string()
}

/// Register `callback` for `event` on `target` until the subscription ends.
fn listen(
    target: &EventTarget,
    event: &'static str,
    options: Option<&AddEventListenerOptions>,
    callback: impl FnMut(Event) + 'static,
) -> Subscription {
    let closure = Closure::wrap(Box::new(callback) as Box<dyn FnMut(Event)>);
    let registered = match options {
        Some(options) => target.add_event_listener_with_callback_and_add_event_listener_options(
            event,
            closure.as_ref().unchecked_ref(),
            options,
        ),
        None => target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref()),
    };
    if let Err(err) = registered {
        tracing::warn!(event, error = %js_error_text(&err), "failed to register listener");
        return Subscription::noop();
    }

    let target = target.clone();
    Subscription::new(move || {
        let _ = target.remove_event_listener_with_callback(event, closure.as_ref().unchecked_ref());
        drop(closure);
    })
}

fn current_document() -> Option<Document> {
    window()?.document()
}

/// The hidden `<audio>` element carrying the background track.
pub struct AudioElementHandle {
    audio: HtmlAudioElement,
}

impl AudioElementHandle {
    /// Reuse the element if an earlier controller on this page created it,
    /// otherwise create and attach a new one.
    pub fn create(options: &HandleOptions) -> SyncResult<Self> {
        let fail = |step: &str, err: JsValue| {
            SyncError::initialization(format!("{step}: {}", js_error_text(&err)))
        };
        let document = current_document()
            .ok_or_else(|| SyncError::initialization("no document available"))?;

        if let Some(existing) = document.get_element_by_id(&options.element_id) {
            if let Ok(audio) = existing.dyn_into::<HtmlAudioElement>() {
                audio.set_loop(options.looping);
                audio.set_volume(options.volume);
                return Ok(Self { audio });
            }
            return Err(SyncError::initialization(format!(
                "element #{} exists but is not an audio element",
                options.element_id
            )));
        }

        let audio: HtmlAudioElement = document
            .create_element("audio")
            .map_err(|e| fail("create audio element", e))?
            .dyn_into()
            .map_err(|_| SyncError::initialization("created element is not an audio element"))?;
        audio.set_id(&options.element_id);
        audio.set_loop(options.looping);
        audio.set_preload("auto");
        audio.set_volume(options.volume);
        audio.set_src(&options.source_url);
        audio
            .set_attribute("style", "display: none")
            .map_err(|e| fail("hide audio element", e))?;

        let body = document
            .body()
            .ok_or_else(|| SyncError::initialization("document has no body"))?;
        body.append_child(&audio)
            .map_err(|e| fail("attach audio element", e))?;

        Ok(Self { audio })
    }
}

impl PlaybackHandle for AudioElementHandle {
    fn position(&self) -> f64 {
        self.audio.current_time()
    }

    fn set_position(&self, seconds: f64) {
        self.audio.set_current_time(seconds);
    }

    fn duration(&self) -> Option<f64> {
        let duration = self.audio.duration();
        (duration.is_finite() && duration > 0.0).then_some(duration)
    }

    fn is_paused(&self) -> bool {
        self.audio.paused()
    }

    fn volume(&self) -> f64 {
        self.audio.volume()
    }

    fn set_volume(&self, volume: f64) {
        self.audio.set_volume(volume);
    }

    fn request_play(&self) -> LocalFuture<SyncResult<()>> {
        match self.audio.play() {
            Ok(promise) => async move {
                wasm_bindgen_futures::JsFuture::from(promise)
                    .await
                    .map(|_| ())
                    .map_err(|err| SyncError::playback_rejected(js_error_text(&err)))
            }
            .boxed_local(),
            Err(err) => {
                futures_util::future::ready(Err(SyncError::playback_rejected(js_error_text(&err))))
                    .boxed_local()
            }
        }
    }

    fn pause(&self) {
        if let Err(err) = self.audio.pause() {
            tracing::warn!(error = %js_error_text(&err), "failed to pause background music");
        }
    }

    fn subscribe(&self, listener: Rc<dyn Fn(MediaEvent)>) -> Subscription {
        let target: &EventTarget = self.audio.as_ref();
        let on = |name: &'static str, event: MediaEvent| {
            let listener = listener.clone();
            listen(target, name, None, move |_| listener(event.clone()))
        };
        let audio = self.audio.clone();
        let on_error = {
            let listener = listener.clone();
            listen(target, "error", None, move |_| {
                listener(MediaEvent::Error(media_error_message(&audio)))
            })
        };
        Subscription::merge(vec![
            on("canplay", MediaEvent::CanPlay),
            on("play", MediaEvent::Play),
            on("pause", MediaEvent::Pause),
            on_error,
        ])
    }
}

/// Page lifecycle hooks on `window` and `document`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserDocument;

impl DocumentHost for BrowserDocument {
    fn is_loading(&self) -> bool {
        current_document()
            .map(|document| document.ready_state() == "loading")
            .unwrap_or(false)
    }

    fn on_ready(&self, callback: Box<dyn FnOnce()>) -> Subscription {
        let Some(document) = current_document() else {
            return Subscription::noop();
        };
        let mut callback = Some(callback);
        listen(document.as_ref(), "DOMContentLoaded", None, move |_| {
            if let Some(callback) = callback.take() {
                callback();
            }
        })
    }

    fn on_visibility_change(&self, callback: Rc<dyn Fn(bool)>) -> Subscription {
        let Some(document) = current_document() else {
            return Subscription::noop();
        };
        let watched = document.clone();
        listen(document.as_ref(), "visibilitychange", None, move |_| {
            callback(!watched.hidden())
        })
    }

    fn on_before_unload(&self, callback: Rc<dyn Fn()>) -> Subscription {
        let Some(win) = window() else {
            return Subscription::noop();
        };
        listen(win.as_ref(), "beforeunload", None, move |_| callback())
    }

    fn on_gesture(&self, callback: Rc<dyn Fn(GestureKind)>) -> Subscription {
        let Some(document) = current_document() else {
            return Subscription::noop();
        };
        let options = AddEventListenerOptions::new();
        options.set_passive(true);

        let target: &EventTarget = document.as_ref();
        let on = |name: &'static str, kind: GestureKind| {
            let callback = callback.clone();
            listen(target, name, Some(&options), move |_| callback(kind))
        };
        Subscription::merge(vec![
            on("click", GestureKind::Click),
            on("keydown", GestureKind::KeyDown),
            on("touchstart", GestureKind::TouchStart),
        ])
    }

    fn create_handle(&self, options: &HandleOptions) -> SyncResult<Rc<dyn PlaybackHandle>> {
        let handle = AudioElementHandle::create(options)?;
        Ok(Rc::new(handle))
    }
}

/// `setInterval`/`setTimeout` through gloo.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimerScheduler;

fn duration_millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

impl Scheduler for TimerScheduler {
    fn every(&self, period: Duration, mut tick: Box<dyn FnMut()>) -> Subscription {
        let interval = Interval::new(duration_millis(period), move || tick());
        Subscription::new(move || drop(interval))
    }

    fn sleep(&self, duration: Duration) -> LocalFuture<()> {
        TimeoutFuture::new(duration_millis(duration)).boxed_local()
    }
}

/// Runs tasks on the browser's microtask queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTaskSpawner;

impl TaskSpawner for LocalTaskSpawner {
    fn spawn(&self, task: LocalFuture<()>) {
        wasm_bindgen_futures::spawn_local(task);
    }
}

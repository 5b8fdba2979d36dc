use crate::components::audio_manager::{
    IndicatorView, PlaybackSyncController, Platform, ToggleIndicator,
};
use crate::components::MusicButton;
use crate::config::{SyncConfig, CONFIG_KEY};
use dioxus::core::{Runtime, RuntimeGuard};
use dioxus::prelude::*;
use std::rc::Rc;

/// Floating toggle state; `None` until autoplay has been blocked once.
#[derive(Clone, Copy)]
pub struct IndicatorSignal(pub Signal<Option<IndicatorView>>);

/// Feeds controller callbacks, which fire from raw DOM listeners outside the
/// render cycle, into a signal the toggle button renders from.
pub struct SignalIndicator {
    view: Signal<Option<IndicatorView>>,
    runtime: Rc<Runtime>,
}

impl SignalIndicator {
    /// Must be called from inside a component.
    pub fn new(view: Signal<Option<IndicatorView>>) -> Self {
        Self {
            view,
            runtime: Runtime::current(),
        }
    }

    fn update(&self, next: impl FnOnce(Option<IndicatorView>) -> Option<IndicatorView>) {
        let _guard = RuntimeGuard::new(self.runtime.clone());
        let mut view = self.view;
        let current = *view.peek();
        let updated = next(current);
        if updated != current {
            view.set(updated);
        }
    }
}

impl ToggleIndicator for SignalIndicator {
    fn show(&self, playing: bool) {
        self.update(|current| {
            Some(match current {
                Some(view) => IndicatorView { playing, ..view },
                None => IndicatorView {
                    playing,
                    dimmed: false,
                },
            })
        });
    }

    fn refresh(&self, playing: bool) {
        self.update(|current| current.map(|view| IndicatorView { playing, ..view }));
    }

    fn dim(&self) {
        self.update(|current| {
            current.map(|view| IndicatorView {
                dimmed: true,
                ..view
            })
        });
    }
}

#[cfg(target_arch = "wasm32")]
fn build_platform(indicator: Rc<dyn ToggleIndicator>) -> Platform {
    crate::components::audio_manager::browser_platform(indicator)
}

#[cfg(not(target_arch = "wasm32"))]
fn build_platform(indicator: Rc<dyn ToggleIndicator>) -> Platform {
    crate::components::audio_manager::headless_platform(indicator)
}

/// The page's single background music controller.
pub fn use_background_music() -> PlaybackSyncController {
    use_context::<PlaybackSyncController>()
}

/// Composition root: builds the controller once, shares it through context
/// and renders the toggle that appears when autoplay is blocked.
#[component]
pub fn AppShell() -> Element {
    let indicator_view = use_signal(|| None::<IndicatorView>);
    let controller = use_hook(move || {
        let indicator = Rc::new(SignalIndicator::new(indicator_view));
        let platform = build_platform(indicator);
        let config = SyncConfig::load(platform.store.as_ref(), CONFIG_KEY);
        PlaybackSyncController::new(config, platform)
    });

    use_context_provider(|| controller.clone());
    use_context_provider(|| IndicatorSignal(indicator_view));

    // Set up once mounted so the audio element lands after the app's own DOM.
    use_effect(move || {
        controller.initialize();
    });

    rsx! {
        MusicButton {}
    }
}

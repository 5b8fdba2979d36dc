use crate::components::{use_background_music, Icon, IndicatorSignal};
use dioxus::prelude::*;

/// Floating play/pause toggle, rendered only once autoplay has been blocked.
#[component]
pub fn MusicButton() -> Element {
    let controller = use_background_music();
    let view = use_context::<IndicatorSignal>().0;

    let Some(current) = view() else {
        return rsx! {};
    };

    let (icon, title, tone) = if current.playing {
        (
            "music",
            "Background music playing - click to pause",
            "bg-pink-400/90 hover:bg-pink-400",
        )
    } else {
        (
            "volume-x",
            "Background music paused - click to resume",
            "bg-zinc-400/70 hover:bg-zinc-400",
        )
    };
    let opacity = if current.dimmed { "opacity-70" } else { "opacity-100" };

    let on_toggle = move |_| {
        let controller = controller.clone();
        spawn(async move {
            controller.toggle().await;
        });
    };

    rsx! {
        button {
            id: "floatingMusicBtn",
            r#type: "button",
            title: "{title}",
            class: "fixed top-5 left-5 z-50 w-12 h-12 rounded-full flex items-center justify-center text-white shadow-lg transition-all hover:scale-110 {tone} {opacity}",
            onclick: on_toggle,
            Icon { name: icon.to_string(), class: "w-5 h-5".to_string() }
        }
    }
}

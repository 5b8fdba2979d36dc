//! The components module contains the background music controller and its UI.

pub mod audio_manager;
mod app;
mod icons;
mod music_button;

pub use app::*;
pub use icons::*;
pub use music_button::*;

//! MIDI Relay
//!
//! Translates hardware controller events into client-facing MIDI according
//! to a per-input output strategy, and answers the hardware with backlight
//! messages.

pub mod color;
pub mod config;
pub mod driver;
pub mod error;
pub mod midi;
pub mod persistence;
pub mod propagator;
pub mod resolver;
pub mod response;
pub mod router;
pub mod state_manager;
pub mod translator;
pub mod transport;

pub use error::TranslatorError;
pub use router::{Routed, Router};
pub use translator::{InputTranslator, TranslationResult};

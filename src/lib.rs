//! keybed - polyphonic keyboard synth
//!
//! A voice lifecycle core that turns note, pedal and failsafe events from
//! unreliable input sources into a consistent set of sounding voices: one
//! voice per pitch, sustain-pedal holds, fades that are disposed exactly
//! once, and a watchdog that guarantees eventual silence.

pub mod config;
pub mod engine;
pub mod error;
pub mod input;
pub mod synth;
pub mod voice;

pub use config::KeybedConfig;
pub use engine::Engine;
pub use error::{KeybedError, ResourceError};
pub use voice::{Event, VoiceLifecycleManager};

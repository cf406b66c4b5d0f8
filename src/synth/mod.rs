//! Synthesis primitives
//!
//! Oscillators, gain automation and the sound resources voices own.

mod envelope;
mod oscillator;
mod resource;

pub use envelope::{Envelope, EnvelopeStage};
pub use oscillator::{Oscillator, Waveform};
pub use resource::{ResourceFactory, SoundResource, ToneFactory, ToneResource};

//! Input sources
//!
//! Everything upstream of the voice core: pointer and keyboard routing,
//! velocity derivation, hardware MIDI and scripted performances. Each
//! source produces `voice::Event`s and nothing else.

mod midi;
mod router;
mod script;
mod velocity;

pub use midi::{list_midi_ports, MidiListener, MidiMessage};
pub use router::{InputRouter, PointerId, PointerKind, PEDAL_CODE};
pub use script::{Action, Cue, Performance, TimedEvent};
pub use velocity::{Contact, VelocityMode};

//! Voice lifecycle
//!
//! Everything that decides which pitches are sounding: the per-key voice
//! table, the sustain pool, the set of physically held keys, the stuck-note
//! watchdog and the state machine that ties them together.

mod factory;
mod held;
mod manager;
mod pitch;
mod scheduler;
mod sustain;
mod table;
#[allow(clippy::module_inception)]
mod voice;
mod watchdog;

#[cfg(test)]
pub(crate) mod testutil;

pub use factory::VoiceFactory;
pub use held::InputAuthority;
pub use manager::{Event, KeyState, VoiceLifecycleManager};
pub use pitch::{midi_to_freq, midi_to_note, note_to_midi, KeyRange, PitchKey};
pub use scheduler::TaskScheduler;
pub use sustain::SustainController;
pub use table::{ReleasePool, VoiceTable};
pub use voice::{Silence, Voice, VoiceId, RELEASE_GUARD};
pub use watchdog::{FailsafeTrigger, FailsafeWatchdog, WatchdogAction};

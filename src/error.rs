//! Error types for the voice core

use crate::voice::{PitchKey, VoiceId};

/// Errors raised by a sound resource
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResourceError {
    /// The resource was already stopped and released
    #[error("resource already released")]
    AlreadyReleased,
}

/// Errors raised by the voice lifecycle core
///
/// None of these are fatal. The manager degrades every failure to silence
/// or a no-op; callers only see them to log or assert on.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KeybedError {
    /// A note request named a pitch outside the playable keyboard
    #[error("invalid pitch: {0}")]
    InvalidPitch(String),

    /// A deferred disposal fired for a voice that is no longer pending
    #[error("stale scheduled release for {key} (voice {voice})")]
    StaleScheduledRelease { key: PitchKey, voice: VoiceId },
}

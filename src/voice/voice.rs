//! A single sounding voice

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::trace;

use super::PitchKey;
use crate::config::EnvelopeParameters;
use crate::synth::SoundResource;

/// Extra time after a release before the resource is stopped
///
/// Longer than it takes the exponential tail to fall below audibility.
pub const RELEASE_GUARD: Duration = Duration::from_millis(50);

/// Identity of one voice instance, unique for the lifetime of a manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(pub(crate) u64);

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a forced release silences a voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Silence {
    /// Fade out with the current release time, then dispose
    Fade,
    /// Stop and dispose right away
    Immediate,
}

/// One sounding instance bound to a pitch
pub struct Voice {
    id: VoiceId,
    key: PitchKey,
    resource: Box<dyn SoundResource>,
    target_level: f64,
    created_at: Duration,
    release_due: Option<Duration>,
}

impl Voice {
    pub(crate) fn new(
        id: VoiceId,
        key: PitchKey,
        resource: Box<dyn SoundResource>,
        target_level: f64,
        created_at: Duration,
    ) -> Self {
        Self {
            id,
            key,
            resource,
            target_level,
            created_at,
            release_due: None,
        }
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn key(&self) -> PitchKey {
        self.key
    }

    /// Peak level the attack ramps to
    pub fn target_level(&self) -> f64 {
        self.target_level
    }

    pub fn created_at(&self) -> Duration {
        self.created_at
    }

    /// When the pending fade-out will dispose this voice, if one is scheduled
    pub fn release_due(&self) -> Option<Duration> {
        self.release_due
    }

    /// Whether a fade-out has been scheduled
    pub fn is_releasing(&self) -> bool {
        self.release_due.is_some()
    }

    /// Whether the resource has been stopped
    pub fn is_stopped(&self) -> bool {
        self.resource.is_stopped()
    }

    /// Current amplitude of the resource
    pub fn amplitude(&self, now: Duration) -> f64 {
        self.resource.amplitude(now.as_secs_f64())
    }

    /// Start the release: decay toward silence and report when to dispose
    ///
    /// Only the first call schedules anything. Later calls return `None` and
    /// leave the running fade and its disposal time untouched.
    pub fn schedule_fade_out(
        &mut self,
        now: Duration,
        params: &EnvelopeParameters,
    ) -> Option<Duration> {
        if self.release_due.is_some() || self.resource.is_stopped() {
            return None;
        }

        self.resource
            .decay_amplitude(now.as_secs_f64(), params.release_time_constant());

        let release_us = (params.release_seconds() * 1_000_000.0).round() as u64;
        let release = Duration::from_micros(release_us);
        let due = now + release + RELEASE_GUARD;
        self.release_due = Some(due);
        trace!(
            key = %self.key,
            voice = %self.id,
            due_ms = due.as_millis() as u64,
            "Fade out scheduled"
        );
        Some(due)
    }

    /// Stop and release the resource now
    ///
    /// Safe to call any number of times.
    pub fn stop_immediately(&mut self) {
        match self.resource.stop() {
            Ok(()) => trace!(key = %self.key, voice = %self.id, "Voice stopped"),
            Err(err) => trace!(key = %self.key, voice = %self.id, %err, "Voice already stopped"),
        }
    }

    /// Generate the next sample
    pub(crate) fn render(&mut self, at: f64) -> f64 {
        self.resource.render(at)
    }
}

impl Drop for Voice {
    fn drop(&mut self) {
        if !self.resource.is_stopped() {
            self.stop_immediately();
        }
    }
}

impl fmt::Debug for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Voice")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("target_level", &self.target_level)
            .field("created_at", &self.created_at)
            .field("release_due", &self.release_due)
            .finish()
    }
}

//! Configuration schema definitions

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::input::VelocityMode;
use crate::synth::Waveform;
use crate::voice::{note_to_midi, KeyRange, Silence};

/// Main configuration for keybed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeybedConfig {
    /// Audio output settings
    #[serde(default)]
    pub audio: AudioConfig,

    /// Tone and envelope shared by every new voice
    #[serde(default)]
    pub envelope: EnvelopeParameters,

    /// Playable key range
    #[serde(default)]
    pub keyboard: KeyboardConfig,

    /// Stuck-note recovery settings
    #[serde(default)]
    pub failsafe: FailsafeConfig,
}

impl KeybedConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate < 8000 || self.audio.sample_rate > 192000 {
            bail!("Sample rate must be between 8000 and 192000");
        }
        if self.audio.buffer_size < 64 || self.audio.buffer_size > 8192 {
            bail!("Buffer size must be between 64 and 8192");
        }

        if !(0.0..=1.0).contains(&self.envelope.volume) {
            bail!("Volume must be between 0.0 and 1.0");
        }
        if !(0.0..=10_000.0).contains(&self.envelope.attack_ms) {
            bail!("Attack must be between 0 and 10000 ms");
        }
        if !(0.0..=10_000.0).contains(&self.envelope.release_ms) {
            bail!("Release must be between 0 and 10000 ms");
        }

        let base = match note_to_midi(&self.keyboard.base_note) {
            Ok(base) => base,
            Err(_) => bail!("Unknown base note '{}'", self.keyboard.base_note),
        };
        if self.keyboard.span == 0 {
            bail!("Keyboard span must be at least one key");
        }
        if u16::from(base) + u16::from(self.keyboard.span) > 128 {
            bail!(
                "Keyboard from {} spanning {} keys runs past the MIDI range",
                self.keyboard.base_note,
                self.keyboard.span
            );
        }

        if self.failsafe.sweep_interval_ms < 100 {
            bail!("Failsafe sweep interval must be at least 100 ms");
        }
        if !(0.0..1.0).contains(&self.failsafe.silence_threshold) {
            bail!("Silence threshold must be in [0.0, 1.0)");
        }

        Ok(())
    }

    /// The playable key range; falls back to the default range if unvalidated
    pub fn key_range(&self) -> KeyRange {
        self.keyboard.key_range().unwrap_or_default()
    }
}

/// Audio output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate in Hz (default: 44100)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Buffer size in samples (default: 512)
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Output device name (None = default device)
    pub device: Option<String>,
}

fn default_sample_rate() -> u32 { 44100 }
fn default_buffer_size() -> usize { 512 }

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            buffer_size: default_buffer_size(),
            device: None,
        }
    }
}

/// Tone and envelope settings, read when a voice starts or fades
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeParameters {
    /// Oscillator waveform (default: triangle)
    #[serde(default)]
    pub waveform: Waveform,

    /// Master volume 0.0-1.0 (default: 0.7)
    #[serde(default = "default_volume")]
    pub volume: f64,

    /// Attack time in milliseconds (default: 12)
    #[serde(default = "default_attack_ms")]
    pub attack_ms: f64,

    /// Release time in milliseconds (default: 320)
    #[serde(default = "default_release_ms")]
    pub release_ms: f64,

    /// How pointer input maps to velocity (default: ypos)
    #[serde(default)]
    pub velocity_mode: VelocityMode,
}

fn default_volume() -> f64 { 0.7 }
fn default_attack_ms() -> f64 { 12.0 }
fn default_release_ms() -> f64 { 320.0 }

impl EnvelopeParameters {
    /// Attack duration in seconds, never negative
    pub fn attack_seconds(&self) -> f64 {
        self.attack_ms.max(0.0) / 1000.0
    }

    /// Release duration in seconds, at least 20 ms
    pub fn release_seconds(&self) -> f64 {
        (self.release_ms / 1000.0).max(0.02)
    }

    /// Time constant of the exponential release
    ///
    /// Three time constants bring the level down to ~5%, so the audible
    /// tail lasts roughly `release_ms`.
    pub fn release_time_constant(&self) -> f64 {
        self.release_seconds() / 3.0
    }
}

impl Default for EnvelopeParameters {
    fn default() -> Self {
        Self {
            waveform: Waveform::default(),
            volume: default_volume(),
            attack_ms: default_attack_ms(),
            release_ms: default_release_ms(),
            velocity_mode: VelocityMode::default(),
        }
    }
}

/// Keyboard register
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyboardConfig {
    /// Lowest key as a note name (default: C3)
    #[serde(default = "default_base_note")]
    pub base_note: String,

    /// Number of keys (default: 25)
    #[serde(default = "default_span")]
    pub span: u8,
}

fn default_base_note() -> String { "C3".to_string() }
fn default_span() -> u8 { 25 }

impl KeyboardConfig {
    /// Resolve the configured register into a key range
    pub fn key_range(&self) -> Option<KeyRange> {
        note_to_midi(&self.base_note)
            .ok()
            .map(|base| KeyRange::new(base, self.span))
    }
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            base_note: default_base_note(),
            span: default_span(),
        }
    }
}

/// Stuck-note recovery settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailsafeConfig {
    /// Idle sweep period in milliseconds (default: 3000)
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    /// Delay after an orientation change before silencing (default: 200)
    #[serde(default = "default_orientation_settle_ms")]
    pub orientation_settle_ms: u64,

    /// Amplitude above which the sweep considers a voice audible (default: 0.001)
    #[serde(default = "default_silence_threshold")]
    pub silence_threshold: f64,

    /// How failsafe paths silence voices (default: immediate)
    #[serde(default = "default_silence")]
    pub silence: Silence,
}

fn default_sweep_interval_ms() -> u64 { 3000 }
fn default_orientation_settle_ms() -> u64 { 200 }
fn default_silence_threshold() -> f64 { 0.001 }
fn default_silence() -> Silence { Silence::Immediate }

impl FailsafeConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn orientation_settle(&self) -> Duration {
        Duration::from_millis(self.orientation_settle_ms)
    }
}

impl Default for FailsafeConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: default_sweep_interval_ms(),
            orientation_settle_ms: default_orientation_settle_ms(),
            silence_threshold: default_silence_threshold(),
            silence: default_silence(),
        }
    }
}

//! Audio engine for keybed
//!
//! Owns the voice manager and drives it from the sample clock: every frame
//! first fires whatever deferred work has come due, then mixes the live
//! voices.

pub mod driver;
pub mod player;
pub mod recorder;

use std::time::Duration;
use tracing::{debug, warn};

use crate::config::KeybedConfig;
use crate::error::KeybedError;
use crate::synth::{ResourceFactory, ToneFactory};
use crate::voice::{Event, VoiceLifecycleManager};

/// The main audio engine
pub struct Engine {
    manager: VoiceLifecycleManager,
    sample_rate: u32,
    frames: u64,
}

impl Engine {
    /// Create an engine over the given resources
    pub fn new(config: &KeybedConfig, resources: Box<dyn ResourceFactory>) -> Self {
        Self {
            manager: VoiceLifecycleManager::new(config, resources),
            sample_rate: config.audio.sample_rate.max(1),
            frames: 0,
        }
    }

    /// Create an engine that plays oscillator tones
    pub fn with_tones(config: &KeybedConfig) -> Self {
        let sample_rate = f64::from(config.audio.sample_rate.max(1));
        Self::new(config, Box::new(ToneFactory::new(sample_rate)))
    }

    /// Get the sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames rendered so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Position of the sample clock
    pub fn now(&self) -> Duration {
        let rate = u64::from(self.sample_rate);
        let secs = self.frames / rate;
        let nanos = (self.frames % rate) * 1_000_000_000 / rate;
        Duration::new(secs, nanos as u32)
    }

    pub fn manager(&self) -> &VoiceLifecycleManager {
        &self.manager
    }

    /// Apply `event` at the current clock position
    pub fn dispatch(&mut self, event: Event) -> Result<(), KeybedError> {
        let now = self.now();
        self.manager.dispatch(now, event)
    }

    /// Apply `event`, logging instead of returning a rejection
    pub fn submit(&mut self, event: Event) {
        match self.dispatch(event) {
            Ok(()) => {}
            Err(err @ KeybedError::InvalidPitch(_)) => warn!(%err, "Event rejected"),
            Err(err) => debug!(%err, "Event ignored"),
        }
    }

    /// Fire deferred work due at the current clock position
    pub fn poll(&mut self) {
        let now = self.now();
        self.manager.poll(now);
    }

    /// Generate the next sample (mix of all voices)
    pub fn process(&mut self) -> f64 {
        self.poll();
        let at = self.frames as f64 / f64::from(self.sample_rate);
        let output = self.manager.render(at);
        self.frames += 1;
        output.clamp(-1.0, 1.0)
    }

    /// Fill a buffer with samples
    pub fn fill_buffer(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process() as f32;
        }
    }

    /// Render until the clock reaches `until`, handing each sample to `sink`
    pub fn render_until<E>(
        &mut self,
        until: Duration,
        mut sink: impl FnMut(f32) -> Result<(), E>,
    ) -> Result<(), E> {
        while self.now() < until {
            sink(self.process() as f32)?;
        }
        Ok(())
    }
}

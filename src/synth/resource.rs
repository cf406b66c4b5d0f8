//! Sound resources: the sound-generating primitive behind each voice

use super::{Envelope, EnvelopeStage, Oscillator, Waveform};
use crate::error::ResourceError;

/// A sound-generating resource owned by exactly one voice
///
/// All times are seconds on the audio clock. Scheduling a ramp or a decay
/// replaces any automation that was still pending.
pub trait SoundResource: Send {
    /// Ramp amplitude linearly from its current level to `target`
    fn ramp_amplitude(&mut self, at: f64, target: f64, over_seconds: f64);

    /// Decay amplitude exponentially toward zero
    fn decay_amplitude(&mut self, at: f64, time_constant: f64);

    /// Current amplitude; zero once stopped
    fn amplitude(&self, at: f64) -> f64;

    /// Halt and release the resource
    ///
    /// Returns `ResourceError::AlreadyReleased` on a second call, which
    /// callers are expected to swallow.
    fn stop(&mut self) -> Result<(), ResourceError>;

    /// Whether `stop` has been called
    fn is_stopped(&self) -> bool;

    /// Generate the next sample at audio time `at`
    fn render(&mut self, at: f64) -> f64;
}

/// Creates sound resources for new voices
pub trait ResourceFactory: Send {
    /// Allocate a resource emitting `waveform` at `frequency`, silent until ramped
    fn create(&mut self, waveform: Waveform, frequency: f64) -> Box<dyn SoundResource>;
}

/// An oscillator shaped by scheduled gain automation
pub struct ToneResource {
    oscillator: Oscillator,
    gain: Envelope,
    stopped: bool,
}

impl ToneResource {
    /// Create a silent tone
    pub fn new(waveform: Waveform, frequency: f64, sample_rate: f64) -> Self {
        Self {
            oscillator: Oscillator::new(waveform, frequency, sample_rate),
            gain: Envelope::new(),
            stopped: false,
        }
    }

    /// Envelope stage at `at`
    pub fn stage(&self, at: f64) -> EnvelopeStage {
        if self.stopped {
            EnvelopeStage::Idle
        } else {
            self.gain.stage_at(at)
        }
    }

    /// Oscillator frequency in Hz
    pub fn frequency(&self) -> f64 {
        self.oscillator.frequency()
    }
}

impl SoundResource for ToneResource {
    fn ramp_amplitude(&mut self, at: f64, target: f64, over_seconds: f64) {
        if !self.stopped {
            self.gain.ramp_to(at, target, over_seconds);
        }
    }

    fn decay_amplitude(&mut self, at: f64, time_constant: f64) {
        if !self.stopped {
            self.gain.decay(at, time_constant);
        }
    }

    fn amplitude(&self, at: f64) -> f64 {
        if self.stopped {
            0.0
        } else {
            self.gain.level_at(at)
        }
    }

    fn stop(&mut self) -> Result<(), ResourceError> {
        if self.stopped {
            return Err(ResourceError::AlreadyReleased);
        }
        self.stopped = true;
        self.gain.reset();
        Ok(())
    }

    fn is_stopped(&self) -> bool {
        self.stopped
    }

    fn render(&mut self, at: f64) -> f64 {
        if self.stopped {
            return 0.0;
        }
        self.oscillator.generate() * self.gain.level_at(at)
    }
}

/// Factory for `ToneResource`s at a fixed sample rate
pub struct ToneFactory {
    sample_rate: f64,
}

impl ToneFactory {
    pub fn new(sample_rate: f64) -> Self {
        Self { sample_rate }
    }
}

impl ResourceFactory for ToneFactory {
    fn create(&mut self, waveform: Waveform, frequency: f64) -> Box<dyn SoundResource> {
        Box::new(ToneResource::new(waveform, frequency, self.sample_rate))
    }
}

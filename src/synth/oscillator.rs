//! Basic oscillator implementation

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

/// Waveform types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    #[default]
    Triangle,
    #[serde(alias = "saw")]
    Sawtooth,
    Square,
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Waveform::Sine => "sine",
            Waveform::Triangle => "triangle",
            Waveform::Sawtooth => "sawtooth",
            Waveform::Square => "square",
        };
        f.write_str(name)
    }
}

/// A phase-accumulating oscillator
pub struct Oscillator {
    waveform: Waveform,
    phase: f64,
    frequency: f64,
    sample_rate: f64,
}

impl Oscillator {
    /// Create a new oscillator
    pub fn new(waveform: Waveform, frequency: f64, sample_rate: f64) -> Self {
        Self {
            waveform,
            phase: 0.0,
            frequency,
            sample_rate,
        }
    }

    /// Get the current frequency
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Get the waveform
    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    /// Generate the next sample
    pub fn generate(&mut self) -> f64 {
        let p = self.phase;
        let sample = match self.waveform {
            Waveform::Sine => (p * 2.0 * PI).sin(),
            Waveform::Triangle => {
                if p < 0.25 {
                    4.0 * p
                } else if p < 0.75 {
                    2.0 - 4.0 * p
                } else {
                    4.0 * p - 4.0
                }
            }
            Waveform::Sawtooth => 2.0 * p - 1.0,
            Waveform::Square => {
                if p < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        };

        self.phase += self.frequency / self.sample_rate;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
        }

        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_oscillator() {
        let mut osc = Oscillator::new(Waveform::Sine, 440.0, 44100.0);

        // First sample should be 0 (sin(0))
        let sample = osc.generate();
        assert!(sample.abs() < 0.001);
    }

    #[test]
    fn test_square_oscillator() {
        let mut osc = Oscillator::new(Waveform::Square, 1.0, 4.0);

        assert_eq!(osc.generate(), 1.0);
        assert_eq!(osc.generate(), 1.0);
        assert_eq!(osc.generate(), -1.0);
        assert_eq!(osc.generate(), -1.0);
    }

    #[test]
    fn test_sawtooth_oscillator() {
        let mut osc = Oscillator::new(Waveform::Sawtooth, 1.0, 4.0);

        assert_eq!(osc.generate(), -1.0);
        assert_eq!(osc.generate(), -0.5);
        assert_eq!(osc.generate(), 0.0);
        assert_eq!(osc.generate(), 0.5);
    }

    #[test]
    fn test_triangle_stays_in_range() {
        let mut osc = Oscillator::new(Waveform::Triangle, 261.63, 44100.0);
        for _ in 0..2000 {
            let sample = osc.generate();
            assert!((-1.0..=1.0).contains(&sample), "Sample out of range: {}", sample);
        }
    }

    #[test]
    fn test_waveform_names() {
        let parsed: Waveform = serde_yaml::from_str("saw").unwrap();
        assert_eq!(parsed, Waveform::Sawtooth);
        assert_eq!(Waveform::Sawtooth.to_string(), "sawtooth");
        assert_eq!(Waveform::default(), Waveform::Triangle);
    }
}

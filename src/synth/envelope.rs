//! Amplitude envelope automation
//!
//! Gain is scheduled against the audio clock rather than stepped per
//! sample: an attack is a linear ramp between two points in time, a release
//! is an exponential approach toward zero. The level at any instant is a
//! pure function of the current segment, so the controller can ask "how
//! loud is this voice right now" without touching the render loop.

/// Envelope stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnvelopeStage {
    Idle,
    Attack,
    Sustain,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Segment {
    /// Constant level
    Hold(f64),
    /// Linear ramp between two (time, level) points
    Ramp {
        start: f64,
        from: f64,
        end: f64,
        to: f64,
    },
    /// Exponential approach toward `target`
    Decay {
        start: f64,
        from: f64,
        target: f64,
        time_constant: f64,
    },
}

/// Scheduled amplitude automation for one voice
#[derive(Debug, Clone)]
pub struct Envelope {
    segment: Segment,
}

impl Envelope {
    /// Create an envelope resting at zero
    pub fn new() -> Self {
        Self {
            segment: Segment::Hold(0.0),
        }
    }

    /// Level at audio time `t` (seconds)
    pub fn level_at(&self, t: f64) -> f64 {
        match self.segment {
            Segment::Hold(level) => level,
            Segment::Ramp {
                start,
                from,
                end,
                to,
            } => {
                if t <= start {
                    from
                } else if t >= end {
                    to
                } else {
                    from + (to - from) * (t - start) / (end - start)
                }
            }
            Segment::Decay {
                start,
                from,
                target,
                time_constant,
            } => {
                if t <= start {
                    from
                } else {
                    target + (from - target) * (-(t - start) / time_constant).exp()
                }
            }
        }
    }

    /// Stage at audio time `t`
    pub fn stage_at(&self, t: f64) -> EnvelopeStage {
        match self.segment {
            Segment::Hold(level) if level <= 0.0 => EnvelopeStage::Idle,
            Segment::Hold(_) => EnvelopeStage::Sustain,
            Segment::Ramp { end, .. } if t < end => EnvelopeStage::Attack,
            Segment::Ramp { to, .. } if to <= 0.0 => EnvelopeStage::Idle,
            Segment::Ramp { .. } => EnvelopeStage::Sustain,
            Segment::Decay { .. } => EnvelopeStage::Release,
        }
    }

    /// Drop any scheduled change and hold the level reached at `t`
    pub fn cancel(&mut self, t: f64) {
        self.segment = Segment::Hold(self.level_at(t));
    }

    /// Ramp linearly from the current level to `target` over `seconds`
    ///
    /// Cancels whatever automation was pending. A zero duration jumps
    /// straight to the target.
    pub fn ramp_to(&mut self, t: f64, target: f64, seconds: f64) {
        let from = self.level_at(t);
        let target = target.clamp(0.0, 1.0);
        self.segment = if seconds <= 0.0 {
            Segment::Hold(target)
        } else {
            Segment::Ramp {
                start: t,
                from,
                end: t + seconds,
                to: target,
            }
        };
    }

    /// Decay exponentially toward zero with the given time constant
    ///
    /// Cancels whatever automation was pending and starts from the level
    /// reached at `t`.
    pub fn decay(&mut self, t: f64, time_constant: f64) {
        let from = self.level_at(t);
        self.segment = if time_constant <= 0.0 {
            Segment::Hold(0.0)
        } else {
            Segment::Decay {
                start: t,
                from,
                target: 0.0,
                time_constant,
            }
        };
    }

    /// Silence immediately
    pub fn reset(&mut self) {
        self.segment = Segment::Hold(0.0);
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}

//! Test doubles for the resource layer

use std::sync::{Arc, Mutex};

use super::VoiceId;
use crate::error::ResourceError;
use crate::synth::{Envelope, ResourceFactory, SoundResource, Waveform};

/// A call made on a probe resource
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create { waveform: Waveform, frequency: f64 },
    Ramp { at: f64, target: f64, over: f64 },
    Decay { at: f64, time_constant: f64 },
    Stop,
    StopAgain,
}

type Log = Arc<Mutex<Vec<(u64, Call)>>>;

/// Resource factory that records every call made on the resources it creates
///
/// Resources are numbered from 1 in creation order, which matches the
/// `VoiceId`s a fresh `VoiceFactory` hands out.
#[derive(Clone, Default)]
pub struct ProbeFactory {
    log: Log,
    created: Arc<Mutex<u64>>,
}

impl ProbeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// All calls recorded for one voice
    pub fn calls(&self, voice: VoiceId) -> Vec<Call> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == voice.0)
            .map(|(_, call)| call.clone())
            .collect()
    }

    /// Number of recorded calls for `voice` matching `pred`
    pub fn count(&self, voice: VoiceId, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls(voice).iter().filter(|call| pred(call)).count()
    }

    /// Whether the voice's resource received a decay before being stopped
    pub fn faded(&self, voice: VoiceId) -> bool {
        self.count(voice, |c| matches!(c, Call::Decay { .. })) > 0
    }

    /// Whether the voice's resource has been stopped
    pub fn stopped(&self, voice: VoiceId) -> bool {
        self.count(voice, |c| *c == Call::Stop) > 0
    }

    /// Number of resources created so far
    pub fn created(&self) -> u64 {
        *self.created.lock().unwrap()
    }
}

impl ResourceFactory for ProbeFactory {
    fn create(&mut self, waveform: Waveform, frequency: f64) -> Box<dyn SoundResource> {
        let id = {
            let mut created = self.created.lock().unwrap();
            *created += 1;
            *created
        };
        self.log
            .lock()
            .unwrap()
            .push((id, Call::Create { waveform, frequency }));
        Box::new(ProbeResource {
            id,
            log: Arc::clone(&self.log),
            gain: Envelope::new(),
            stopped: false,
        })
    }
}

struct ProbeResource {
    id: u64,
    log: Log,
    gain: Envelope,
    stopped: bool,
}

impl ProbeResource {
    fn record(&self, call: Call) {
        self.log.lock().unwrap().push((self.id, call));
    }
}

impl SoundResource for ProbeResource {
    fn ramp_amplitude(&mut self, at: f64, target: f64, over_seconds: f64) {
        self.record(Call::Ramp {
            at,
            target,
            over: over_seconds,
        });
        self.gain.ramp_to(at, target, over_seconds);
    }

    fn decay_amplitude(&mut self, at: f64, time_constant: f64) {
        self.record(Call::Decay { at, time_constant });
        self.gain.decay(at, time_constant);
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
            self.record(Call::StopAgain);
            return Err(ResourceError::AlreadyReleased);
        }
        self.record(Call::Stop);
        self.stopped = true;
        Ok(())
    }

    fn is_stopped(&self) -> bool {
        self.stopped
    }

    fn render(&mut self, at: f64) -> f64 {
        self.amplitude(at)
    }
}

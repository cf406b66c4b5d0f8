//! Voice construction

use std::time::Duration;
use tracing::trace;

use super::{PitchKey, Voice, VoiceId};
use crate::config::EnvelopeParameters;
use crate::synth::ResourceFactory;

/// Builds voices from a pitch, a velocity and the current envelope settings
pub struct VoiceFactory {
    resources: Box<dyn ResourceFactory>,
    next_id: u64,
}

impl VoiceFactory {
    pub fn new(resources: Box<dyn ResourceFactory>) -> Self {
        Self {
            resources,
            next_id: 1,
        }
    }

    /// Allocate a resource and start its attack at `now`
    ///
    /// The amplitude ramps linearly from zero to `volume * velocity`
    /// (clamped to [0, 1]) over the attack time. The parameters are read
    /// here and never again for this attack.
    pub fn create(
        &mut self,
        key: PitchKey,
        frequency: f64,
        velocity: f64,
        params: &EnvelopeParameters,
        now: Duration,
    ) -> Voice {
        let id = VoiceId(self.next_id);
        self.next_id += 1;

        let target = (params.volume * velocity).clamp(0.0, 1.0);
        let mut resource = self.resources.create(params.waveform, frequency);
        resource.ramp_amplitude(now.as_secs_f64(), target, params.attack_seconds());

        trace!(%key, voice = %id, frequency, target, "Voice created");
        Voice::new(id, key, resource, target, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::Waveform;
    use crate::voice::testutil::{Call, ProbeFactory};

    #[test]
    fn test_create_ramps_to_scaled_target() {
        let probe = ProbeFactory::new();
        let mut factory = VoiceFactory::new(Box::new(probe.clone()));
        let params = EnvelopeParameters {
            waveform: Waveform::Square,
            volume: 0.7,
            attack_ms: 12.0,
            ..EnvelopeParameters::default()
        };

        let voice = factory.create(PitchKey::new(60), 261.63, 0.5, &params, Duration::from_secs(2));

        assert_eq!(
            probe.calls(voice.id()),
            vec![
                Call::Create {
                    waveform: Waveform::Square,
                    frequency: 261.63
                },
                Call::Ramp {
                    at: 2.0,
                    target: 0.35,
                    over: 0.012
                },
            ]
        );
        assert_eq!(voice.target_level(), 0.35);
        assert_eq!(voice.created_at(), Duration::from_secs(2));
    }

    #[test]
    fn test_target_is_clamped() {
        let probe = ProbeFactory::new();
        let mut factory = VoiceFactory::new(Box::new(probe));
        let params = EnvelopeParameters {
            volume: 1.0,
            ..EnvelopeParameters::default()
        };

        let loud = factory.create(PitchKey::new(60), 261.63, 3.0, &params, Duration::ZERO);
        assert_eq!(loud.target_level(), 1.0);

        let negative = factory.create(PitchKey::new(61), 277.18, -1.0, &params, Duration::ZERO);
        assert_eq!(negative.target_level(), 0.0);
    }

    #[test]
    fn test_ids_are_unique() {
        let mut factory = VoiceFactory::new(Box::new(ProbeFactory::new()));
        let params = EnvelopeParameters::default();

        let a = factory.create(PitchKey::new(60), 261.63, 1.0, &params, Duration::ZERO);
        let b = factory.create(PitchKey::new(60), 261.63, 1.0, &params, Duration::ZERO);
        assert_ne!(a.id(), b.id());
    }
}

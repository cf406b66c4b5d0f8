//! Voice lifecycle state machine
//!
//! The manager is the only owner of the voice table, the sustain pool and
//! the held set. Every request, whether it comes from an input source, the
//! failsafe, or a deferred disposal, goes through `dispatch` and runs to
//! completion before the next one is looked at. Deferred work sits in a
//! `TaskScheduler`; whatever has come due is moved onto a FIFO queue and
//! drained before a new external event is applied, so a disposal that was
//! due first is processed first.
//!
//! Per key the states are Silent, Sounding, HeldBySustain and Releasing:
//!
//! ```text
//! Silent --NoteOn--> Sounding --NoteOff (pedal up)--> Releasing --timer--> Silent
//!                       |                                ^
//!                       +--NoteOff (pedal down)--> HeldBySustain --pedal up--+
//! ```

use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use super::{
    FailsafeTrigger, FailsafeWatchdog, InputAuthority, KeyRange, PitchKey, ReleasePool,
    Silence, SustainController, TaskScheduler, Voice, VoiceFactory, VoiceId, VoiceTable,
    WatchdogAction,
};
use crate::config::{EnvelopeParameters, KeybedConfig};
use crate::error::KeybedError;
use crate::synth::ResourceFactory;

/// A request to the voice core
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Start (or restart) the voice for `key`
    NoteOn {
        key: PitchKey,
        frequency: f64,
        velocity: f64,
    },
    /// Physical release of `key`
    NoteOff { key: PitchKey },
    /// Sustain pedal moved
    Pedal { down: bool },
    /// Release `key` regardless of pedal or held state
    ForceOff { key: PitchKey, silence: Silence },
    /// Release every active voice regardless of pedal state
    ForceAllOff { silence: Silence },
    /// The host reported something that may have swallowed a release
    Failsafe(FailsafeTrigger),
    /// Input heartbeat that postpones the idle sweep
    Activity,
    /// Replace the envelope parameters used by future voices
    SetParams(EnvelopeParameters),
    /// A fade-out finished; dispose `voice`
    ReleaseDue { key: PitchKey, voice: VoiceId },
    /// Periodic failsafe sweep
    WatchdogSweep,
}

impl Event {
    /// Note-on at the key's equal-tempered frequency
    pub fn note_on(key: PitchKey, velocity: f64) -> Self {
        Event::NoteOn {
            key,
            frequency: key.frequency(),
            velocity,
        }
    }

    /// Whether this event proves an input source is alive
    fn is_activity(&self) -> bool {
        matches!(
            self,
            Event::NoteOn { .. } | Event::NoteOff { .. } | Event::Pedal { .. } | Event::Activity
        )
    }
}

/// Conceptual lifecycle state of one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Silent,
    Sounding,
    HeldBySustain,
    Releasing,
}

/// Turns note and pedal events into a consistent set of sounding voices
pub struct VoiceLifecycleManager {
    params: EnvelopeParameters,
    keys: KeyRange,
    factory: VoiceFactory,
    table: VoiceTable,
    releasing: ReleasePool,
    sustain: SustainController,
    held: InputAuthority,
    watchdog: FailsafeWatchdog,
    scheduler: TaskScheduler,
    queue: VecDeque<Event>,
}

impl VoiceLifecycleManager {
    /// Create a manager whose clock starts at zero
    pub fn new(config: &KeybedConfig, resources: Box<dyn ResourceFactory>) -> Self {
        let watchdog = FailsafeWatchdog::new(config.failsafe.clone());
        let mut scheduler = TaskScheduler::new();
        scheduler.schedule(watchdog.next_sweep(Duration::ZERO), Event::WatchdogSweep);

        Self {
            params: config.envelope.clone(),
            keys: config.key_range(),
            factory: VoiceFactory::new(resources),
            table: VoiceTable::new(),
            releasing: ReleasePool::new(),
            sustain: SustainController::new(),
            held: InputAuthority::new(),
            watchdog,
            scheduler,
            queue: VecDeque::new(),
        }
    }

    /// Run everything due by `now`, then apply `event`
    pub fn dispatch(&mut self, now: Duration, event: Event) -> Result<(), KeybedError> {
        self.poll(now);
        self.apply(now, event)
    }

    /// Fire every deferred task due by `now`
    pub fn poll(&mut self, now: Duration) {
        self.queue.extend(self.scheduler.pop_due(now));
        while let Some(event) = self.queue.pop_front() {
            if let Err(err) = self.apply(now, event) {
                debug!(%err, "Deferred event ignored");
            }
        }
    }

    /// Due time of the next deferred task
    pub fn next_due(&self) -> Option<Duration> {
        self.scheduler.next_due()
    }

    pub fn note_on(
        &mut self,
        now: Duration,
        key: PitchKey,
        frequency: f64,
        velocity: f64,
    ) -> Result<(), KeybedError> {
        self.dispatch(
            now,
            Event::NoteOn {
                key,
                frequency,
                velocity,
            },
        )
    }

    pub fn note_off(&mut self, now: Duration, key: PitchKey) -> Result<(), KeybedError> {
        self.dispatch(now, Event::NoteOff { key })
    }

    pub fn pedal(&mut self, now: Duration, down: bool) -> Result<(), KeybedError> {
        self.dispatch(now, Event::Pedal { down })
    }

    pub fn force_off(
        &mut self,
        now: Duration,
        key: PitchKey,
        silence: Silence,
    ) -> Result<(), KeybedError> {
        self.dispatch(now, Event::ForceOff { key, silence })
    }

    pub fn force_all_off(&mut self, now: Duration, silence: Silence) -> Result<(), KeybedError> {
        self.dispatch(now, Event::ForceAllOff { silence })
    }

    pub fn failsafe(&mut self, now: Duration, trigger: FailsafeTrigger) -> Result<(), KeybedError> {
        self.dispatch(now, Event::Failsafe(trigger))
    }

    pub fn params(&self) -> &EnvelopeParameters {
        &self.params
    }

    pub fn key_range(&self) -> KeyRange {
        self.keys
    }

    /// The active voice for `key`, if any
    pub fn voice(&self, key: PitchKey) -> Option<&Voice> {
        self.table.get(key)
    }

    /// Active keys in pitch order
    pub fn active_keys(&self) -> Vec<PitchKey> {
        let mut keys = self.table.keys();
        keys.sort();
        keys
    }

    pub fn active_count(&self) -> usize {
        self.table.len()
    }

    /// Number of voices still fading out
    pub fn releasing_count(&self) -> usize {
        self.releasing.len()
    }

    pub fn is_held(&self, key: PitchKey) -> bool {
        self.held.is_held(key)
    }

    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    pub fn pedal_down(&self) -> bool {
        self.sustain.is_down()
    }

    /// Whether `key` is waiting for the pedal to lift
    pub fn is_sustained(&self, key: PitchKey) -> bool {
        self.sustain.is_pending(key)
    }

    pub fn sustained_count(&self) -> usize {
        self.sustain.pending_len()
    }

    /// Lifecycle state of `key`
    pub fn key_state(&self, key: PitchKey) -> KeyState {
        if self.table.contains(key) {
            if self.sustain.is_pending(key) {
                KeyState::HeldBySustain
            } else {
                KeyState::Sounding
            }
        } else if self.releasing_voices(key) > 0 {
            KeyState::Releasing
        } else {
            KeyState::Silent
        }
    }

    /// Number of live voices (active or fading) for `key`
    pub fn live_voices(&self, key: PitchKey) -> usize {
        usize::from(self.table.contains(key)) + self.releasing_voices(key)
    }

    /// Mix one sample of every live voice at audio time `at`
    pub fn render(&mut self, at: f64) -> f64 {
        let active: f64 = self.table.iter_mut().map(|voice| voice.render(at)).sum();
        let fading: f64 = self.releasing.iter_mut().map(|voice| voice.render(at)).sum();
        active + fading
    }

    fn releasing_voices(&self, key: PitchKey) -> usize {
        self.releasing.count_key(key)
    }

    fn apply(&mut self, now: Duration, event: Event) -> Result<(), KeybedError> {
        if event.is_activity() {
            self.watchdog.touch(now);
        }

        match event {
            Event::NoteOn {
                key,
                frequency,
                velocity,
            } => self.start_note(now, key, frequency, velocity),
            Event::NoteOff { key } => {
                self.release_note(now, key);
                Ok(())
            }
            Event::Pedal { down: true } => {
                if self.sustain.press() {
                    debug!("Sustain pedal down");
                }
                Ok(())
            }
            Event::Pedal { down: false } => {
                self.lift_pedal(now);
                Ok(())
            }
            Event::ForceOff { key, silence } => {
                self.force_off_key(now, key, silence);
                Ok(())
            }
            Event::ForceAllOff { silence } => {
                self.force_all(now, silence);
                Ok(())
            }
            Event::Failsafe(trigger) => {
                self.handle_trigger(now, trigger);
                Ok(())
            }
            Event::Activity => Ok(()),
            Event::SetParams(params) => {
                debug!(?params, "Envelope parameters updated");
                self.params = params;
                Ok(())
            }
            Event::ReleaseDue { key, voice } => self.dispose(key, voice),
            Event::WatchdogSweep => {
                self.sweep(now);
                Ok(())
            }
        }
    }

    fn start_note(
        &mut self,
        now: Duration,
        key: PitchKey,
        frequency: f64,
        velocity: f64,
    ) -> Result<(), KeybedError> {
        if !self.keys.contains(key) {
            warn!(%key, "Note on outside the keyboard");
            return Err(KeybedError::InvalidPitch(key.to_string()));
        }
        if !(frequency.is_finite() && frequency > 0.0) {
            warn!(%key, frequency, "Note on with unusable frequency");
            return Err(KeybedError::InvalidPitch(format!("{} at {} Hz", key, frequency)));
        }
        let velocity = if velocity.is_nan() {
            0.0
        } else {
            velocity.clamp(0.0, 1.0)
        };

        // A tail still fading on this pitch would overlap the new attack
        for mut fading in self.releasing.take_key(key) {
            self.scheduler.cancel_release(fading.id());
            fading.stop_immediately();
        }

        let voice = self
            .factory
            .create(key, frequency, velocity, &self.params, now);
        let id = voice.id();
        if let Some(replaced) = self.table.insert(voice) {
            debug!(%key, %replaced, voice = %id, "Note retriggered");
        }

        self.held.press(key);
        self.sustain.forget(key);
        trace!(%key, voice = %id, velocity, "Note on");
        Ok(())
    }

    fn release_note(&mut self, now: Duration, key: PitchKey) {
        self.held.release(key);

        if !self.table.contains(key) {
            trace!(%key, "Note off without a voice");
            return;
        }

        if self.sustain.is_down() {
            self.sustain.defer(key);
            trace!(%key, "Note held by sustain");
        } else {
            self.release_voice(now, key, Silence::Fade);
        }
    }

    fn lift_pedal(&mut self, now: Duration) {
        let Some(pending) = self.sustain.lift() else {
            return;
        };
        debug!(pending = pending.len(), "Sustain pedal up");

        for key in pending {
            if !self.held.is_held(key) {
                self.force_off_key(now, key, Silence::Fade);
            }
        }
    }

    fn force_off_key(&mut self, now: Duration, key: PitchKey, silence: Silence) {
        self.release_voice(now, key, silence);
        self.held.release(key);
        self.sustain.forget(key);
    }

    fn force_all(&mut self, now: Duration, silence: Silence) {
        let keys = self.table.keys();
        if !keys.is_empty() {
            info!(voices = keys.len(), ?silence, "Forcing all voices off");
        }
        for key in keys {
            self.force_off_key(now, key, silence);
        }
        self.sustain.clear();
    }

    fn release_voice(&mut self, now: Duration, key: PitchKey, silence: Silence) {
        let Some(mut voice) = self.table.take_for_release(key) else {
            return;
        };

        match silence {
            Silence::Fade => match voice.schedule_fade_out(now, &self.params) {
                Some(due) => {
                    self.scheduler.schedule_release(due, key, voice.id());
                    self.releasing.retire(voice);
                }
                None => voice.stop_immediately(),
            },
            Silence::Immediate => voice.stop_immediately(),
        }
    }

    fn dispose(&mut self, key: PitchKey, id: VoiceId) -> Result<(), KeybedError> {
        self.scheduler.cancel_release(id);
        match self.releasing.dispose(id) {
            Some(mut voice) => {
                voice.stop_immediately();
                trace!(%key, voice = %id, "Voice disposed");
                Ok(())
            }
            None => Err(KeybedError::StaleScheduledRelease { key, voice: id }),
        }
    }

    fn handle_trigger(&mut self, now: Duration, trigger: FailsafeTrigger) {
        match self.watchdog.plan(trigger) {
            WatchdogAction::SilenceUnheld(silence) => {
                let stray: Vec<PitchKey> = self
                    .table
                    .keys()
                    .into_iter()
                    .filter(|key| !self.held.is_held(*key))
                    .collect();
                if !stray.is_empty() {
                    info!(%trigger, voices = stray.len(), "Silencing voices without a held key");
                }
                for key in stray {
                    self.force_off_key(now, key, silence);
                }
            }
            WatchdogAction::SilenceAll(silence) => {
                info!(%trigger, "Failsafe silence");
                self.force_all(now, silence);
            }
            WatchdogAction::SilenceAllAfter(delay, silence) => {
                debug!(%trigger, delay_ms = delay.as_millis() as u64, "Failsafe silence deferred");
                self.scheduler
                    .schedule(now + delay, Event::ForceAllOff { silence });
            }
            WatchdogAction::Teardown => {
                info!(%trigger, "Tearing down all voices");
                self.force_all(now, Silence::Immediate);
                self.scheduler.cancel_all_releases();
                for mut voice in self.releasing.drain() {
                    voice.stop_immediately();
                }
            }
        }
    }

    fn sweep(&mut self, now: Duration) {
        self.scheduler
            .schedule(self.watchdog.next_sweep(now), Event::WatchdogSweep);

        if !self.watchdog.is_idle(now) {
            return;
        }

        let audible: Vec<PitchKey> = self
            .table
            .keys()
            .into_iter()
            .filter(|key| {
                self.table
                    .get(*key)
                    .is_some_and(|voice| self.watchdog.is_audible(voice.amplitude(now)))
            })
            .collect();
        if audible.is_empty() {
            return;
        }

        let silence = self.watchdog.config().silence;
        info!(voices = audible.len(), "Idle sweep silencing stuck voices");
        for key in audible {
            self.force_off_key(now, key, silence);
        }
    }
}

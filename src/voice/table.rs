//! Active voices indexed by pitch, plus the pool of voices fading out

use std::collections::HashMap;
use tracing::trace;

use super::{PitchKey, Voice, VoiceId};

/// Maps each active pitch to its one voice
#[derive(Debug, Default)]
pub struct VoiceTable {
    voices: HashMap<PitchKey, Voice>,
}

impl VoiceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `voice` for its key, stopping any previous occupant immediately
    ///
    /// Returns the id of the voice that was replaced.
    pub fn insert(&mut self, voice: Voice) -> Option<VoiceId> {
        let key = voice.key();
        let mut previous = self.voices.insert(key, voice)?;
        previous.stop_immediately();
        trace!(%key, replaced = %previous.id(), "Voice replaced");
        Some(previous.id())
    }

    /// Remove the voice for `key` so it can be released
    pub fn take_for_release(&mut self, key: PitchKey) -> Option<Voice> {
        self.voices.remove(&key)
    }

    /// Snapshot of every active key
    pub fn keys(&self) -> Vec<PitchKey> {
        self.voices.keys().copied().collect()
    }

    pub fn get(&self, key: PitchKey) -> Option<&Voice> {
        self.voices.get(&key)
    }

    pub fn contains(&self, key: PitchKey) -> bool {
        self.voices.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Voice> {
        self.voices.values_mut()
    }
}

/// Voices that have left the table and are fading toward disposal
#[derive(Debug, Default)]
pub struct ReleasePool {
    voices: HashMap<VoiceId, Voice>,
}

impl ReleasePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep a fading voice alive until its disposal fires
    pub fn retire(&mut self, voice: Voice) {
        self.voices.insert(voice.id(), voice);
    }

    /// Remove the voice with this identity, if it is still fading
    pub fn dispose(&mut self, id: VoiceId) -> Option<Voice> {
        self.voices.remove(&id)
    }

    /// Remove every fading voice for `key`
    pub fn take_key(&mut self, key: PitchKey) -> Vec<Voice> {
        let ids: Vec<VoiceId> = self
            .voices
            .values()
            .filter(|voice| voice.key() == key)
            .map(Voice::id)
            .collect();
        ids.into_iter()
            .filter_map(|id| self.voices.remove(&id))
            .collect()
    }

    /// Remove every fading voice
    pub fn drain(&mut self) -> Vec<Voice> {
        self.voices.drain().map(|(_, voice)| voice).collect()
    }

    pub fn contains(&self, id: VoiceId) -> bool {
        self.voices.contains_key(&id)
    }

    /// Number of fading voices for `key`
    pub fn count_key(&self, key: PitchKey) -> usize {
        self.voices.values().filter(|voice| voice.key() == key).count()
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Voice> {
        self.voices.values_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvelopeParameters;
    use crate::voice::testutil::ProbeFactory;
    use crate::voice::VoiceFactory;
    use std::time::Duration;

    fn voice(factory: &mut VoiceFactory, note: u8) -> Voice {
        let key = PitchKey::new(note);
        factory.create(key, key.frequency(), 1.0, &EnvelopeParameters::default(), Duration::ZERO)
    }

    #[test]
    fn test_insert_replaces_and_stops_previous() {
        let probe = ProbeFactory::new();
        let mut factory = VoiceFactory::new(Box::new(probe.clone()));
        let mut table = VoiceTable::new();

        let first = voice(&mut factory, 60);
        let first_id = first.id();
        assert_eq!(table.insert(first), None);

        let second = voice(&mut factory, 60);
        let second_id = second.id();
        assert_eq!(table.insert(second), Some(first_id));

        assert_eq!(table.len(), 1);
        assert_eq!(table.get(PitchKey::new(60)).map(Voice::id), Some(second_id));
        assert!(probe.stopped(first_id));
        assert!(!probe.faded(first_id));
        assert!(!probe.stopped(second_id));
    }

    #[test]
    fn test_take_for_release_is_idempotent() {
        let mut factory = VoiceFactory::new(Box::new(ProbeFactory::new()));
        let mut table = VoiceTable::new();
        table.insert(voice(&mut factory, 62));

        assert!(table.take_for_release(PitchKey::new(62)).is_some());
        assert!(table.take_for_release(PitchKey::new(62)).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_keys_is_a_snapshot() {
        let mut factory = VoiceFactory::new(Box::new(ProbeFactory::new()));
        let mut table = VoiceTable::new();
        table.insert(voice(&mut factory, 60));
        table.insert(voice(&mut factory, 64));
        table.insert(voice(&mut factory, 67));

        for key in table.keys() {
            table.take_for_release(key);
        }
        assert!(table.is_empty());
    }

    #[test]
    fn test_release_pool() {
        let mut factory = VoiceFactory::new(Box::new(ProbeFactory::new()));
        let mut pool = ReleasePool::new();

        let a = voice(&mut factory, 60);
        let b = voice(&mut factory, 60);
        let c = voice(&mut factory, 64);
        let (a_id, c_id) = (a.id(), c.id());
        pool.retire(a);
        pool.retire(b);
        pool.retire(c);

        assert_eq!(pool.take_key(PitchKey::new(60)).len(), 2);
        assert!(!pool.contains(a_id));
        assert!(pool.dispose(c_id).is_some());
        assert!(pool.dispose(c_id).is_none());
        assert!(pool.is_empty());
    }
}

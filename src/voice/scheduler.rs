//! Deferred events on the controller clock

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use super::{Event, PitchKey, VoiceId};

/// Events waiting for their due time
///
/// Tasks fire in due-time order, ties in scheduling order. Voice disposals
/// are indexed by voice identity so a replacement can cancel them.
#[derive(Debug, Default)]
pub struct TaskScheduler {
    tasks: BTreeMap<(Duration, u64), Event>,
    releases: HashMap<VoiceId, (Duration, u64)>,
    seq: u64,
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `event` to fire at `due`
    pub fn schedule(&mut self, due: Duration, event: Event) {
        let slot = (due, self.seq);
        self.seq += 1;
        if let Event::ReleaseDue { voice, .. } = event {
            if let Some(old) = self.releases.insert(voice, slot) {
                self.tasks.remove(&old);
            }
        }
        self.tasks.insert(slot, event);
    }

    /// Queue the disposal of `voice` at `due`
    pub fn schedule_release(&mut self, due: Duration, key: PitchKey, voice: VoiceId) {
        self.schedule(due, Event::ReleaseDue { key, voice });
    }

    /// Cancel the pending disposal of `voice`; returns whether one existed
    pub fn cancel_release(&mut self, voice: VoiceId) -> bool {
        match self.releases.remove(&voice) {
            Some(slot) => self.tasks.remove(&slot).is_some(),
            None => false,
        }
    }

    /// Cancel every pending disposal
    pub fn cancel_all_releases(&mut self) {
        for (_, slot) in self.releases.drain() {
            self.tasks.remove(&slot);
        }
    }

    /// Whether a disposal is pending for `voice`
    pub fn has_release(&self, voice: VoiceId) -> bool {
        self.releases.contains_key(&voice)
    }

    /// Due time of the earliest task
    pub fn next_due(&self) -> Option<Duration> {
        self.tasks.keys().next().map(|(due, _)| *due)
    }

    /// Remove and return every task due at or before `now`, in firing order
    pub fn pop_due(&mut self, now: Duration) -> Vec<Event> {
        let mut due = Vec::new();
        while let Some(entry) = self.tasks.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let event = entry.remove();
            if let Event::ReleaseDue { voice, .. } = event {
                self.releases.remove(&voice);
            }
            due.push(event);
        }
        due
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

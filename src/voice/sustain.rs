//! Sustain pedal state

use std::collections::HashSet;

use super::PitchKey;

/// Pedal position plus the keys released while it was down
#[derive(Debug, Default)]
pub struct SustainController {
    down: bool,
    pending: HashSet<PitchKey>,
}

impl SustainController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_down(&self) -> bool {
        self.down
    }

    /// Press the pedal; returns false if it was already down
    pub fn press(&mut self) -> bool {
        !std::mem::replace(&mut self.down, true)
    }

    /// Lift the pedal and hand back the keys it was holding
    ///
    /// Returns `None` if the pedal was already up.
    pub fn lift(&mut self) -> Option<Vec<PitchKey>> {
        if !std::mem::replace(&mut self.down, false) {
            return None;
        }
        let mut keys: Vec<PitchKey> = self.pending.drain().collect();
        keys.sort();
        Some(keys)
    }

    /// Hold `key` until the pedal lifts
    pub fn defer(&mut self, key: PitchKey) {
        self.pending.insert(key);
    }

    /// Drop `key` from the pending set
    pub fn forget(&mut self, key: PitchKey) -> bool {
        self.pending.remove(&key)
    }

    pub fn is_pending(&self, key: PitchKey) -> bool {
        self.pending.contains(&key)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Empty the pending set, leaving the pedal where it is
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_and_lift() {
        let mut sustain = SustainController::new();
        assert!(!sustain.is_down());
        assert!(sustain.press());
        assert!(!sustain.press());
        assert!(sustain.is_down());

        sustain.defer(PitchKey::new(64));
        sustain.defer(PitchKey::new(60));
        assert_eq!(sustain.lift(), Some(vec![PitchKey::new(60), PitchKey::new(64)]));
        assert!(!sustain.is_down());
        assert_eq!(sustain.pending_len(), 0);
    }

    #[test]
    fn test_lift_when_up_is_noop() {
        let mut sustain = SustainController::new();
        assert_eq!(sustain.lift(), None);
    }

    #[test]
    fn test_forget_and_clear() {
        let mut sustain = SustainController::new();
        sustain.press();
        sustain.defer(PitchKey::new(60));
        sustain.defer(PitchKey::new(62));

        assert!(sustain.forget(PitchKey::new(60)));
        assert!(!sustain.forget(PitchKey::new(60)));
        assert!(sustain.is_pending(PitchKey::new(62)));

        sustain.clear();
        assert_eq!(sustain.pending_len(), 0);
        assert!(sustain.is_down());
    }
}

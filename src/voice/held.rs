//! Physically held keys

use std::collections::HashSet;

use super::PitchKey;

/// Keys currently asserted by a live physical input
///
/// Only note-on adds a key. An attributable note-off or a forced release
/// removes it; the sustain pedal never does.
#[derive(Debug, Default)]
pub struct InputAuthority {
    held: HashSet<PitchKey>,
}

impl InputAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, key: PitchKey) {
        self.held.insert(key);
    }

    /// Returns whether the key was held
    pub fn release(&mut self, key: PitchKey) -> bool {
        self.held.remove(&key)
    }

    pub fn is_held(&self, key: PitchKey) -> bool {
        self.held.contains(&key)
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_release() {
        let mut held = InputAuthority::new();
        held.press(PitchKey::new(60));
        held.press(PitchKey::new(60));
        assert_eq!(held.len(), 1);

        assert!(held.release(PitchKey::new(60)));
        assert!(!held.release(PitchKey::new(60)));
        assert!(held.is_empty());
    }
}

//! Pointer and keyboard input to note events
//!
//! Each pointer id and each keyboard code captures at most one key, so
//! every release can be attributed to the note it started. A key stays
//! down while any capture still holds it. A release that matches no
//! capture is reported as a failsafe trigger instead.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::trace;

use super::{Contact, VelocityMode};
use crate::voice::{Event, FailsafeTrigger, KeyRange, PitchKey};

/// Identifier the host assigns to one pointer or touch contact
pub type PointerId = u64;

/// Device behind a pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerKind {
    #[default]
    Mouse,
    Pen,
    Touch,
}

/// Keyboard code to semitone offset from the lowest key
const KEY_LAYOUT: [(&str, u8); 18] = [
    ("KeyA", 0),
    ("KeyW", 1),
    ("KeyS", 2),
    ("KeyE", 3),
    ("KeyD", 4),
    ("KeyF", 5),
    ("KeyT", 6),
    ("KeyG", 7),
    ("KeyY", 8),
    ("KeyH", 9),
    ("KeyU", 10),
    ("KeyJ", 11),
    ("KeyK", 12),
    ("KeyO", 13),
    ("KeyL", 14),
    ("KeyP", 15),
    ("Semicolon", 16),
    ("Quote", 17),
];

/// Keyboard code that acts as the sustain pedal
pub const PEDAL_CODE: &str = "Space";

/// Tracks input captures and emits the events they imply
#[derive(Debug)]
pub struct InputRouter {
    keys: KeyRange,
    mode: VelocityMode,
    pointers: HashMap<PointerId, PitchKey>,
    codes: HashMap<String, PitchKey>,
    pedal: bool,
}

impl InputRouter {
    pub fn new(keys: KeyRange, mode: VelocityMode) -> Self {
        Self {
            keys,
            mode,
            pointers: HashMap::new(),
            codes: HashMap::new(),
            pedal: false,
        }
    }

    /// Key captured by `pointer`, if any
    pub fn captured(&self, pointer: PointerId) -> Option<PitchKey> {
        self.pointers.get(&pointer).copied()
    }

    /// Number of live captures across pointers and keyboard
    pub fn capture_count(&self) -> usize {
        self.pointers.len() + self.codes.len()
    }

    /// Whether any pointer or keyboard code still holds `key`
    pub fn is_captured(&self, key: PitchKey) -> bool {
        self.pointers.values().chain(self.codes.values()).any(|held| *held == key)
    }

    /// Note-off for a key one capture let go of, unless another still holds it
    fn release(&self, key: PitchKey) -> Option<Event> {
        if self.is_captured(key) {
            trace!(%key, "Key still captured elsewhere");
            return None;
        }
        Some(Event::NoteOff { key })
    }

    /// Key a keyboard code plays, if it is mapped and on the keyboard
    pub fn key_for_code(&self, code: &str) -> Option<PitchKey> {
        let offset = KEY_LAYOUT
            .iter()
            .find(|(mapped, _)| *mapped == code)
            .map(|(_, offset)| *offset)?;
        let key = PitchKey::new(self.keys.base().midi().saturating_add(offset));
        self.keys.contains(key).then_some(key)
    }

    /// A pointer went down, on `key` or outside the keyboard
    pub fn pointer_down(
        &mut self,
        pointer: PointerId,
        key: Option<PitchKey>,
        contact: Contact,
    ) -> Vec<Event> {
        let mut events = Vec::new();
        if let Some(stale) = self.pointers.remove(&pointer) {
            events.extend(self.release(stale));
        }

        match key.filter(|key| self.keys.contains(*key)) {
            Some(key) => {
                self.pointers.insert(pointer, key);
                trace!(pointer, %key, "Pointer captured key");
                events.push(Event::note_on(key, self.mode.velocity(contact)));
            }
            None => events.push(Event::Activity),
        }
        events
    }

    /// A pointer moved; gliding onto another key restrikes there
    pub fn pointer_move(
        &mut self,
        pointer: PointerId,
        key: Option<PitchKey>,
        contact: Contact,
    ) -> Vec<Event> {
        let glide = match (self.pointers.get(&pointer), key) {
            (Some(&from), Some(to)) if from != to && self.keys.contains(to) => Some((from, to)),
            _ => None,
        };

        match glide {
            Some((from, to)) => {
                self.pointers.insert(pointer, to);
                trace!(pointer, %from, %to, "Pointer glided");
                let mut events: Vec<Event> = self.release(from).into_iter().collect();
                events.push(Event::note_on(to, self.mode.velocity(contact)));
                events
            }
            None => vec![Event::Activity],
        }
    }

    /// A pointer was released
    pub fn pointer_up(&mut self, pointer: PointerId, kind: PointerKind) -> Vec<Event> {
        match self.pointers.remove(&pointer) {
            Some(key) => self.release(key).into_iter().collect(),
            None => {
                let trigger = match kind {
                    PointerKind::Touch => FailsafeTrigger::TouchEnd,
                    PointerKind::Mouse | PointerKind::Pen => FailsafeTrigger::PointerUp,
                };
                vec![Event::Failsafe(trigger)]
            }
        }
    }

    /// The host cancelled a pointer sequence
    pub fn pointer_cancel(&mut self, pointer: PointerId) -> Vec<Event> {
        match self.pointers.remove(&pointer) {
            Some(key) => self.release(key).into_iter().collect(),
            None => vec![Event::Failsafe(FailsafeTrigger::TouchCancel)],
        }
    }

    /// A keyboard key went down; auto-repeats are dropped
    ///
    /// Keyboard strikes carry full velocity.
    pub fn key_down(&mut self, code: &str, repeat: bool) -> Vec<Event> {
        if repeat || self.codes.contains_key(code) {
            return Vec::new();
        }
        if code == PEDAL_CODE {
            if self.pedal {
                return Vec::new();
            }
            self.pedal = true;
            return vec![Event::Pedal { down: true }];
        }

        match self.key_for_code(code) {
            Some(key) => {
                self.codes.insert(code.to_string(), key);
                vec![Event::note_on(key, 1.0)]
            }
            None => vec![Event::Activity],
        }
    }

    /// A keyboard key came up
    pub fn key_up(&mut self, code: &str) -> Vec<Event> {
        if code == PEDAL_CODE {
            if !self.pedal {
                return Vec::new();
            }
            self.pedal = false;
            return vec![Event::Pedal { down: false }];
        }

        match self.codes.remove(code) {
            Some(key) => self.release(key).into_iter().collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> InputRouter {
        InputRouter::new(KeyRange::new(48, 25), VelocityMode::Fixed)
    }

    fn key(note: u8) -> PitchKey {
        PitchKey::new(note)
    }

    #[test]
    fn test_pointer_press_and_release() {
        let mut router = router();
        assert_eq!(
            router.pointer_down(1, Some(key(60)), Contact::at(0.2)),
            vec![Event::note_on(key(60), 1.0)]
        );
        assert_eq!(router.captured(1), Some(key(60)));
        assert_eq!(
            router.pointer_up(1, PointerKind::Mouse),
            vec![Event::NoteOff { key: key(60) }]
        );
        assert_eq!(router.capture_count(), 0);
    }

    #[test]
    fn test_velocity_follows_mode() {
        let mut router = InputRouter::new(KeyRange::default(), VelocityMode::Pressure);
        let events = router.pointer_down(1, Some(key(60)), Contact::at(0.0).with_pressure(0.4));
        assert_eq!(events, vec![Event::note_on(key(60), 0.4)]);
    }

    #[test]
    fn test_unattributed_release_is_a_failsafe() {
        let mut router = router();
        assert_eq!(
            router.pointer_up(7, PointerKind::Mouse),
            vec![Event::Failsafe(FailsafeTrigger::PointerUp)]
        );
        assert_eq!(
            router.pointer_up(7, PointerKind::Touch),
            vec![Event::Failsafe(FailsafeTrigger::TouchEnd)]
        );
        assert_eq!(
            router.pointer_cancel(7),
            vec![Event::Failsafe(FailsafeTrigger::TouchCancel)]
        );
    }

    #[test]
    fn test_glide_restrikes() {
        let mut router = router();
        router.pointer_down(2, Some(key(60)), Contact::at(0.0));

        assert_eq!(
            router.pointer_move(2, Some(key(62)), Contact::at(0.0)),
            vec![Event::NoteOff { key: key(60) }, Event::note_on(key(62), 1.0)]
        );
        assert_eq!(router.pointer_move(2, Some(key(62)), Contact::at(0.1)), vec![Event::Activity]);
        // Leaving the keyboard keeps the capture
        assert_eq!(router.pointer_move(2, None, Contact::at(0.1)), vec![Event::Activity]);
        assert_eq!(router.captured(2), Some(key(62)));
    }

    #[test]
    fn test_two_pointers_on_one_key() {
        let mut router = router();
        router.pointer_down(1, Some(key(60)), Contact::at(0.0));
        router.pointer_down(2, Some(key(60)), Contact::at(0.0));
        assert_eq!(router.capture_count(), 2);

        assert!(router.pointer_up(1, PointerKind::Touch).is_empty());
        assert!(router.is_captured(key(60)));
        assert_eq!(router.pointer_up(2, PointerKind::Touch), vec![Event::NoteOff { key: key(60) }]);
        assert!(!router.is_captured(key(60)));
    }

    #[test]
    fn test_cancel_spares_key_held_by_keyboard() {
        let mut router = router();
        router.key_down("KeyK", false);
        router.pointer_down(1, Some(key(60)), Contact::at(0.0));

        assert!(router.pointer_cancel(1).is_empty());
        assert_eq!(router.key_up("KeyK"), vec![Event::NoteOff { key: key(60) }]);
    }

    #[test]
    fn test_glide_off_a_shared_key_keeps_it_sounding() {
        let mut router = router();
        router.pointer_down(1, Some(key(60)), Contact::at(0.0));
        router.pointer_down(2, Some(key(60)), Contact::at(0.0));

        assert_eq!(
            router.pointer_move(1, Some(key(62)), Contact::at(0.0)),
            vec![Event::note_on(key(62), 1.0)]
        );
        assert_eq!(router.pointer_up(2, PointerKind::Mouse), vec![Event::NoteOff { key: key(60) }]);
    }

    #[test]
    fn test_shared_key_stays_held_in_the_manager() {
        use crate::config::KeybedConfig;
        use crate::voice::testutil::ProbeFactory;
        use crate::voice::{KeyState, VoiceLifecycleManager};
        use std::time::Duration;

        let config = KeybedConfig::default();
        let mut manager = VoiceLifecycleManager::new(&config, Box::new(ProbeFactory::new()));
        let mut router = router();
        fn feed(manager: &mut VoiceLifecycleManager, events: Vec<Event>) {
            for event in events {
                manager.dispatch(Duration::ZERO, event).unwrap();
            }
        }

        feed(&mut manager, router.pointer_down(1, Some(key(60)), Contact::at(0.0)));
        feed(&mut manager, router.pointer_down(2, Some(key(60)), Contact::at(0.0)));
        feed(&mut manager, router.pointer_up(1, PointerKind::Touch));
        assert!(manager.is_held(key(60)));
        assert_eq!(manager.key_state(key(60)), KeyState::Sounding);

        feed(&mut manager, router.pointer_up(2, PointerKind::Touch));
        assert!(!manager.is_held(key(60)));
        assert_eq!(manager.key_state(key(60)), KeyState::Releasing);
    }

    #[test]
    fn test_pointer_outside_keyboard() {
        let mut router = router();
        assert_eq!(router.pointer_down(3, Some(key(100)), Contact::at(0.0)), vec![Event::Activity]);
        assert_eq!(router.pointer_down(3, None, Contact::at(0.0)), vec![Event::Activity]);
        assert_eq!(router.capture_count(), 0);
    }

    #[test]
    fn test_keyboard_repeat_suppressed() {
        let mut router = router();
        assert_eq!(router.key_down("KeyA", false), vec![Event::note_on(key(48), 1.0)]);
        assert!(router.key_down("KeyA", true).is_empty());
        assert!(router.key_down("KeyA", false).is_empty());
        assert_eq!(router.key_up("KeyA"), vec![Event::NoteOff { key: key(48) }]);
        assert!(router.key_up("KeyA").is_empty());
    }

    #[test]
    fn test_keyboard_layout() {
        let router = router();
        assert_eq!(router.key_for_code("KeyW"), Some(key(49)));
        assert_eq!(router.key_for_code("KeyK"), Some(key(60)));
        assert_eq!(router.key_for_code("KeyZ"), None);

        let short = InputRouter::new(KeyRange::new(60, 5), VelocityMode::Fixed);
        assert_eq!(short.key_for_code("KeyF"), None);
    }

    #[test]
    fn test_space_is_the_pedal() {
        let mut router = router();
        assert_eq!(router.key_down(PEDAL_CODE, false), vec![Event::Pedal { down: true }]);
        assert!(router.key_down(PEDAL_CODE, true).is_empty());
        assert_eq!(router.key_up(PEDAL_CODE), vec![Event::Pedal { down: false }]);
        assert!(router.key_up(PEDAL_CODE).is_empty());
    }
}

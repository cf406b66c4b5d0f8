//! Pitch identifiers and note-name conversion

use std::fmt;
use std::str::FromStr;

use crate::error::KeybedError;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Identifier for a sounding pitch, backed by a MIDI note number
///
/// Displays as `m<note>` (`m60` for middle C), which is also accepted by
/// `FromStr` alongside plain note names such as `C4` or `Eb3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PitchKey(u8);

impl PitchKey {
    /// Create a key from a MIDI note number (0-127)
    pub fn new(note: u8) -> Self {
        Self(note.min(127))
    }

    /// The MIDI note number
    pub fn midi(self) -> u8 {
        self.0
    }

    /// Equal-tempered frequency of this key in Hz
    pub fn frequency(self) -> f64 {
        midi_to_freq(self.0)
    }

    /// Scientific pitch name, e.g. `C4`
    pub fn name(self) -> String {
        midi_to_note(self.0)
    }
}

impl fmt::Display for PitchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

impl FromStr for PitchKey {
    type Err = KeybedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(number) = s.strip_prefix('m') {
            return match number.parse::<u8>() {
                Ok(note) if note <= 127 => Ok(Self(note)),
                _ => Err(KeybedError::InvalidPitch(s.to_string())),
            };
        }
        note_to_midi(s).map(Self)
    }
}

/// Convert a MIDI note number to frequency (A4 = 69 = 440 Hz)
pub fn midi_to_freq(note: u8) -> f64 {
    440.0 * 2.0_f64.powf((f64::from(note) - 69.0) / 12.0)
}

/// Convert a MIDI note number to a note name using sharps (60 -> "C4")
pub fn midi_to_note(note: u8) -> String {
    let octave = i32::from(note) / 12 - 1;
    format!("{}{}", NOTE_NAMES[usize::from(note % 12)], octave)
}

/// Parse a note name like `A4`, `C#3`, `Bb2` or `C-1` into a MIDI note number
pub fn note_to_midi(name: &str) -> Result<u8, KeybedError> {
    let invalid = || KeybedError::InvalidPitch(name.to_string());

    let mut chars = name.trim().chars();
    let letter = chars.next().ok_or_else(invalid)?;
    let base: i32 = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return Err(invalid()),
    };

    let rest = chars.as_str();
    let (accidental, octave) = if let Some(octave) = rest.strip_prefix('#') {
        (1, octave)
    } else if let Some(octave) = rest.strip_prefix('b') {
        (-1, octave)
    } else {
        (0, rest)
    };

    let octave: i32 = octave.parse().map_err(|_| invalid())?;
    if !(-1..=9).contains(&octave) {
        return Err(invalid());
    }
    let midi = (octave + 1) * 12 + base + accidental;
    u8::try_from(midi)
        .ok()
        .filter(|note| *note <= 127)
        .ok_or_else(invalid)
}

/// The contiguous range of keys the keyboard exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRange {
    base: u8,
    span: u8,
}

impl KeyRange {
    /// Create a range of `span` keys starting at `base`, clipped to MIDI range
    pub fn new(base: u8, span: u8) -> Self {
        let base = base.min(127);
        let span = u16::from(span).min(128 - u16::from(base)) as u8;
        Self { base, span }
    }

    /// Lowest key
    pub fn base(&self) -> PitchKey {
        PitchKey(self.base)
    }

    /// Number of keys
    pub fn span(&self) -> u8 {
        self.span
    }

    /// Whether the key has a registered frequency mapping
    pub fn contains(&self, key: PitchKey) -> bool {
        key.0 >= self.base && u16::from(key.0) < u16::from(self.base) + u16::from(self.span)
    }

    /// Iterate over every key in the range
    pub fn keys(&self) -> impl Iterator<Item = PitchKey> {
        let base = self.base;
        (0..self.span).map(move |offset| PitchKey(base + offset))
    }
}

impl Default for KeyRange {
    /// Two octaves from C3 to C5
    fn default() -> Self {
        Self::new(48, 25)
    }
}

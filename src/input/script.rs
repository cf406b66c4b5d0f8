//! Performance scripts
//!
//! A performance is a YAML list of timed cues. Cues either name a core
//! event directly or replay raw pointer and keyboard input through an
//! `InputRouter`, so a script can reproduce a lost pointer-up as easily as
//! a clean note.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::{Contact, InputRouter, PointerId, PointerKind};
use crate::voice::{Event, FailsafeTrigger, PitchKey, Silence};

/// A scripted sequence of input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Performance {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cues: Vec<Cue>,
}

/// One action at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    /// Offset from the start of the performance
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: Action,
}

/// What a cue does
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    NoteOn {
        note: String,
        #[serde(default = "full_velocity")]
        velocity: f64,
    },
    NoteOff {
        note: String,
    },
    Pedal {
        down: bool,
    },
    PointerDown {
        pointer: PointerId,
        #[serde(default)]
        note: Option<String>,
        #[serde(default)]
        y: f64,
        #[serde(default)]
        pressure: Option<f64>,
    },
    PointerMove {
        pointer: PointerId,
        #[serde(default)]
        note: Option<String>,
        #[serde(default)]
        y: f64,
        #[serde(default)]
        pressure: Option<f64>,
    },
    PointerUp {
        pointer: PointerId,
        #[serde(default)]
        kind: PointerKind,
    },
    PointerCancel {
        pointer: PointerId,
    },
    KeyDown {
        code: String,
        #[serde(default)]
        repeat: bool,
    },
    KeyUp {
        code: String,
    },
    ForceAllOff {
        #[serde(default = "fade")]
        silence: Silence,
    },
    Failsafe {
        trigger: FailsafeTrigger,
    },
    Activity,
}

fn full_velocity() -> f64 {
    1.0
}

fn fade() -> Silence {
    Silence::Fade
}

/// A core event at a point on the performance clock
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent {
    pub at: Duration,
    pub event: Event,
}

impl Performance {
    /// Load a performance from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read performance: {:?}", path))?;
        Self::from_yaml(&contents).with_context(|| format!("invalid performance: {:?}", path))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Time of the last cue
    pub fn duration(&self) -> Duration {
        self.cues
            .iter()
            .map(|cue| Duration::from_millis(cue.at_ms))
            .max()
            .unwrap_or_default()
    }

    /// Expand every cue into core events, in time order
    ///
    /// Cues at the same time keep their order in the file. Pointer and
    /// keyboard cues go through `router`, which carries their captures
    /// from one cue to the next.
    pub fn events(&self, router: &mut InputRouter) -> Result<Vec<TimedEvent>> {
        let mut cues: Vec<(usize, &Cue)> = self.cues.iter().enumerate().collect();
        cues.sort_by_key(|(_, cue)| cue.at_ms);

        let mut timed = Vec::new();
        for (index, cue) in cues {
            let at = Duration::from_millis(cue.at_ms);
            let events = cue
                .action
                .to_events(router)
                .with_context(|| format!("cue {} at {} ms", index + 1, cue.at_ms))?;
            timed.extend(events.into_iter().map(|event| TimedEvent { at, event }));
        }
        Ok(timed)
    }
}

impl Action {
    fn to_events(&self, router: &mut InputRouter) -> Result<Vec<Event>> {
        let events = match self {
            Action::NoteOn { note, velocity } => vec![Event::note_on(parse_key(note)?, *velocity)],
            Action::NoteOff { note } => vec![Event::NoteOff {
                key: parse_key(note)?,
            }],
            Action::Pedal { down } => vec![Event::Pedal { down: *down }],
            Action::PointerDown {
                pointer,
                note,
                y,
                pressure,
            } => router.pointer_down(*pointer, parse_optional(note)?, contact(*y, *pressure)),
            Action::PointerMove {
                pointer,
                note,
                y,
                pressure,
            } => router.pointer_move(*pointer, parse_optional(note)?, contact(*y, *pressure)),
            Action::PointerUp { pointer, kind } => router.pointer_up(*pointer, *kind),
            Action::PointerCancel { pointer } => router.pointer_cancel(*pointer),
            Action::KeyDown { code, repeat } => router.key_down(code, *repeat),
            Action::KeyUp { code } => router.key_up(code),
            Action::ForceAllOff { silence } => vec![Event::ForceAllOff { silence: *silence }],
            Action::Failsafe { trigger } => vec![Event::Failsafe(*trigger)],
            Action::Activity => vec![Event::Activity],
        };
        Ok(events)
    }
}

fn parse_key(note: &str) -> Result<PitchKey> {
    note.parse::<PitchKey>()
        .with_context(|| format!("unknown note {:?}", note))
}

fn parse_optional(note: &Option<String>) -> Result<Option<PitchKey>> {
    note.as_deref().map(parse_key).transpose()
}

fn contact(y: f64, pressure: Option<f64>) -> Contact {
    Contact {
        offset_y: y,
        pressure,
    }
}

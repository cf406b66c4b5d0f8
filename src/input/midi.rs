//! Hardware MIDI input
//!
//! Parses channel voice messages from a MIDI port and maps them onto core
//! events. Sustain is CC64, CC120 and CC123 are panics, and active sensing
//! counts as input activity.

use anyhow::{anyhow, Result};
use midir::{Ignore, MidiInput, MidiInputConnection};
use tracing::{debug, info, trace};

use crate::voice::{Event, PitchKey, Silence};

const CC_SUSTAIN: u8 = 64;
const CC_ALL_SOUND_OFF: u8 = 120;
const CC_ALL_NOTES_OFF: u8 = 123;
const ACTIVE_SENSING: u8 = 0xFE;

/// Incoming MIDI message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note on: channel (0-15), note (0-127), velocity (0-127)
    NoteOn(u8, u8, u8),
    /// Note off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff(u8, u8, u8),
    /// Control change: channel (0-15), controller (0-127), value (0-127)
    ControlChange(u8, u8, u8),
    /// Active sensing heartbeat
    ActiveSensing,
}

impl MidiMessage {
    /// Parse a raw message; returns `None` for anything the keyboard ignores
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        if status == ACTIVE_SENSING {
            return Some(MidiMessage::ActiveSensing);
        }

        let channel = status & 0x0F;
        match (status & 0xF0, data) {
            (0x90, [note, vel, ..]) => Some(MidiMessage::NoteOn(channel, note & 0x7F, vel & 0x7F)),
            (0x80, [note, vel, ..]) => Some(MidiMessage::NoteOff(channel, note & 0x7F, vel & 0x7F)),
            (0xB0, [ctrl, val, ..]) => {
                Some(MidiMessage::ControlChange(channel, ctrl & 0x7F, val & 0x7F))
            }
            _ => None,
        }
    }

    /// The core event this message stands for
    pub fn to_event(&self) -> Option<Event> {
        match *self {
            // Many keyboards send note-off as a zero-velocity note-on
            MidiMessage::NoteOn(_, note, 0) | MidiMessage::NoteOff(_, note, _) => {
                Some(Event::NoteOff {
                    key: PitchKey::new(note),
                })
            }
            MidiMessage::NoteOn(_, note, vel) => {
                Some(Event::note_on(PitchKey::new(note), f64::from(vel) / 127.0))
            }
            MidiMessage::ControlChange(_, CC_SUSTAIN, val) => {
                Some(Event::Pedal { down: val >= 64 })
            }
            MidiMessage::ControlChange(_, CC_ALL_SOUND_OFF, _) => Some(Event::ForceAllOff {
                silence: Silence::Immediate,
            }),
            MidiMessage::ControlChange(_, CC_ALL_NOTES_OFF, _) => Some(Event::ForceAllOff {
                silence: Silence::Fade,
            }),
            MidiMessage::ControlChange(..) => None,
            MidiMessage::ActiveSensing => Some(Event::Activity),
        }
    }
}

/// Open MIDI input connection; dropping it closes the port
pub struct MidiListener {
    _connection: MidiInputConnection<()>,
    port_name: String,
}

impl MidiListener {
    /// Connect to the first port whose name contains `port_name`, or the
    /// first port if none is given, and hand every mapped event to `sink`
    pub fn connect<F>(port_name: Option<&str>, mut sink: F) -> Result<Self>
    where
        F: FnMut(Event) + Send + 'static,
    {
        let mut midi_in = MidiInput::new("keybed input")?;
        midi_in.ignore(Ignore::SysexAndTime);
        let ports = midi_in.ports();

        if ports.is_empty() {
            return Err(anyhow!("No MIDI input ports available"));
        }

        let port = if let Some(name) = port_name {
            ports
                .iter()
                .find(|p| {
                    midi_in
                        .port_name(p)
                        .map(|n| n.contains(name))
                        .unwrap_or(false)
                })
                .ok_or_else(|| anyhow!("MIDI port '{}' not found", name))?
                .clone()
        } else {
            ports[0].clone()
        };

        let port_name = midi_in.port_name(&port)?;
        let connection = midi_in
            .connect(
                &port,
                "keybed-input",
                move |_stamp, bytes, _| match MidiMessage::from_bytes(bytes) {
                    Some(message) => {
                        trace!(?message, "MIDI in");
                        if let Some(event) = message.to_event() {
                            sink(event);
                        }
                    }
                    None => debug!(?bytes, "Ignoring MIDI message"),
                },
                (),
            )
            .map_err(|err| anyhow!("failed to connect MIDI input: {}", err))?;

        info!(port = %port_name, "MIDI input connected");
        Ok(Self {
            _connection: connection,
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

/// List available MIDI input ports
pub fn list_midi_ports() -> Result<Vec<String>> {
    let midi_in = MidiInput::new("keybed port list")?;
    let ports = midi_in.ports();

    let names: Vec<String> = ports
        .iter()
        .filter_map(|p| midi_in.port_name(p).ok())
        .collect();

    Ok(names)
}

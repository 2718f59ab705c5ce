//! MIDI utilities and message types
//!
//! Provides the 2-3 byte [`MidiEvent`] value type every translator works on,
//! the status classes used by drivers and resolvers, and hex formatting.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::MalformedEventError;

pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
pub const KEY_PRESSURE: u8 = 0xA0;
pub const CONTROL_CHANGE: u8 = 0xB0;
pub const PROGRAM_CHANGE: u8 = 0xC0;
pub const CHANNEL_PRESSURE: u8 = 0xD0;
pub const PITCH_BEND: u8 = 0xE0;
pub const SYSTEM: u8 = 0xF0;

/// Status class of an input or binding
///
/// `NoteOnOff` is the ambiguous class used by drivers for keys and pads which
/// send note-on on press and note-off on release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusKind {
    #[serde(rename = "noteon/noteoff")]
    NoteOnOff,
    #[serde(rename = "noteon")]
    NoteOn,
    #[serde(rename = "noteoff")]
    NoteOff,
    #[serde(rename = "keypressure")]
    KeyPressure,
    #[serde(rename = "controlchange")]
    ControlChange,
    #[serde(rename = "programchange")]
    ProgramChange,
    #[serde(rename = "channelpressure")]
    ChannelPressure,
    #[serde(rename = "pitchbend")]
    PitchBend,
    #[serde(rename = "sysex")]
    SysEx,
}

impl StatusKind {
    /// High nibble of the status byte, `None` for the ambiguous note class
    pub fn nibble(self) -> Option<u8> {
        match self {
            StatusKind::NoteOnOff => None,
            StatusKind::NoteOn => Some(NOTE_ON),
            StatusKind::NoteOff => Some(NOTE_OFF),
            StatusKind::KeyPressure => Some(KEY_PRESSURE),
            StatusKind::ControlChange => Some(CONTROL_CHANGE),
            StatusKind::ProgramChange => Some(PROGRAM_CHANGE),
            StatusKind::ChannelPressure => Some(CHANNEL_PRESSURE),
            StatusKind::PitchBend => Some(PITCH_BEND),
            StatusKind::SysEx => Some(SYSTEM),
        }
    }

    /// Classify a status byte; note-on and note-off collapse into `NoteOnOff`
    /// unless `individual_on_off` is set
    pub fn from_status_byte(byte: u8, individual_on_off: bool) -> Option<Self> {
        let kind = match byte & 0xF0 {
            NOTE_OFF if individual_on_off => StatusKind::NoteOff,
            NOTE_ON if individual_on_off => StatusKind::NoteOn,
            NOTE_OFF | NOTE_ON => StatusKind::NoteOnOff,
            KEY_PRESSURE => StatusKind::KeyPressure,
            CONTROL_CHANGE => StatusKind::ControlChange,
            PROGRAM_CHANGE => StatusKind::ProgramChange,
            CHANNEL_PRESSURE => StatusKind::ChannelPressure,
            PITCH_BEND => StatusKind::PitchBend,
            SYSTEM => StatusKind::SysEx,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_ambiguous(self) -> bool {
        self == StatusKind::NoteOnOff
    }

    /// Status used for a "press": note-on for the ambiguous class
    pub fn on_kind(self) -> Self {
        match self {
            StatusKind::NoteOnOff => StatusKind::NoteOn,
            other => other,
        }
    }

    /// Status used for a "release": note-off for the ambiguous class
    pub fn off_kind(self) -> Self {
        match self {
            StatusKind::NoteOnOff => StatusKind::NoteOff,
            other => other,
        }
    }

    /// Number of bytes in an event of this class, `None` when either length is valid
    pub fn arity(self) -> Option<usize> {
        match self {
            StatusKind::ProgramChange | StatusKind::ChannelPressure => Some(2),
            StatusKind::SysEx => None,
            _ => Some(3),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusKind::NoteOnOff => "noteon/noteoff",
            StatusKind::NoteOn => "noteon",
            StatusKind::NoteOff => "noteoff",
            StatusKind::KeyPressure => "keypressure",
            StatusKind::ControlChange => "controlchange",
            StatusKind::ProgramChange => "programchange",
            StatusKind::ChannelPressure => "channelpressure",
            StatusKind::PitchBend => "pitchbend",
            StatusKind::SysEx => "sysex",
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A 2 or 3 byte MIDI event
///
/// Only constructible through validating constructors, so every value holds a
/// recognised status byte and data bytes in `0..=127`. Serialized as a plain
/// byte array (`[176, 32, 127]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct MidiEvent {
    status: u8,
    data1: u8,
    data2: Option<u8>,
}

impl MidiEvent {
    /// Build an event, checking byte ranges and status arity
    pub fn new(status: u8, data1: u8, data2: Option<u8>) -> Result<Self, MalformedEventError> {
        if status < 0x80 {
            return Err(MalformedEventError::UnknownStatus(status));
        }
        if data1 > 0x7F {
            return Err(MalformedEventError::DataOutOfRange { index: 1, value: data1 });
        }
        if let Some(value) = data2 {
            if value > 0x7F {
                return Err(MalformedEventError::DataOutOfRange { index: 2, value });
            }
        }

        let actual = if data2.is_some() { 3 } else { 2 };
        let expected = StatusKind::from_status_byte(status, true).and_then(StatusKind::arity);
        if let Some(expected) = expected {
            if expected != actual {
                return Err(MalformedEventError::ArityMismatch {
                    status,
                    expected,
                    actual,
                });
            }
        }

        Ok(Self {
            status,
            data1,
            data2,
        })
    }

    /// Build an event from a status nibble and a channel
    pub fn compose(
        nibble: u8,
        channel: u8,
        data1: u8,
        data2: Option<u8>,
    ) -> Result<Self, MalformedEventError> {
        Self::new((nibble & 0xF0) | (channel & 0x0F), data1, data2)
    }

    /// Parse raw bytes as received from a port
    pub fn from_bytes(data: &[u8]) -> Result<Self, MalformedEventError> {
        match *data {
            [] => Err(MalformedEventError::Empty),
            [_] => Err(MalformedEventError::TooShort { len: 1 }),
            [status, data1] => Self::new(status, data1, None),
            [status, data1, data2] => Self::new(status, data1, Some(data2)),
            _ => Err(MalformedEventError::TooLong { len: data.len() }),
        }
    }

    pub fn status(&self) -> u8 {
        self.status
    }

    /// High nibble of the status byte
    pub fn status_nibble(&self) -> u8 {
        self.status & 0xF0
    }

    /// Channel (0-15)
    pub fn channel(&self) -> u8 {
        self.status & 0x0F
    }

    pub fn data1(&self) -> u8 {
        self.data1
    }

    pub fn data2(&self) -> Option<u8> {
        self.data2
    }

    /// Byte count (2 or 3)
    pub fn len(&self) -> usize {
        if self.data2.is_some() {
            3
        } else {
            2
        }
    }

    /// Status class with note-on and note-off kept apart
    pub fn kind(&self) -> StatusKind {
        // status >= 0x80 is guaranteed by construction
        StatusKind::from_status_byte(self.status, true).unwrap_or(StatusKind::SysEx)
    }

    /// Encode the event to MIDI bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![self.status, self.data1];
        if let Some(data2) = self.data2 {
            bytes.push(data2);
        }
        bytes
    }

    /// Same logical action: same status nibble, channel and first data byte
    ///
    /// The value byte is only compared when `compare_value` is set.
    pub fn identity_eq(&self, other: &MidiEvent, compare_value: bool) -> bool {
        if self.len() != other.len() {
            return false;
        }
        if self.status != other.status || self.data1 != other.data1 {
            return false;
        }
        !compare_value || self.data2 == other.data2
    }

    /// Note-off, or a note-on/CC carrying value 0
    pub fn is_release(&self) -> bool {
        match self.status_nibble() {
            NOTE_OFF => true,
            NOTE_ON | CONTROL_CHANGE => self.data2 == Some(0),
            _ => false,
        }
    }
}

impl TryFrom<Vec<u8>> for MidiEvent {
    type Error = MalformedEventError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        Self::from_bytes(&bytes)
    }
}

impl From<MidiEvent> for Vec<u8> {
    fn from(event: MidiEvent) -> Self {
        event.to_bytes()
    }
}

impl fmt::Display for MidiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ch = self.channel() + 1;
        let d2 = self.data2.unwrap_or(0);
        match self.status_nibble() {
            NOTE_OFF => write!(f, "NoteOff ch:{} n:{} v:{}", ch, self.data1, d2),
            NOTE_ON => write!(f, "NoteOn ch:{} n:{} v:{}", ch, self.data1, d2),
            KEY_PRESSURE => write!(f, "PolyPressure ch:{} n:{} p:{}", ch, self.data1, d2),
            CONTROL_CHANGE => write!(f, "CC ch:{} cc:{} v:{}", ch, self.data1, d2),
            PROGRAM_CHANGE => write!(f, "ProgramChange ch:{} p:{}", ch, self.data1),
            CHANNEL_PRESSURE => write!(f, "ChannelPressure ch:{} p:{}", ch, self.data1),
            PITCH_BEND => {
                let value = ((d2 as u16) << 7) | self.data1 as u16;
                write!(f, "PitchBend ch:{} v:{}", ch, value)
            }
            _ => write!(f, "System {}", format_hex(&self.to_bytes())),
        }
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

//! Stateless address rewrite for knobs, faders and encoders

use serde::{Deserialize, Serialize};

use crate::driver::InputDriver;
use crate::error::{InvalidConstructionError, MalformedEventError, TranslatorError};
use crate::midi::{MidiEvent, StatusKind};

const ELIGIBLE: [StatusKind; 4] = [
    StatusKind::NoteOn,
    StatusKind::NoteOff,
    StatusKind::ControlChange,
    StatusKind::PitchBend,
];

/// How a knob reports its position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnobType {
    #[default]
    Absolute,
    /// Relative encoder sending `64 + delta`
    Endless,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuousResolver {
    eligible_statuses: Vec<StatusKind>,
    default_status: StatusKind,
    default_channel: u8,
    default_number: u8,
    status_override: StatusKind,
    channel_override: u8,
    number_override: u8,
    #[serde(default)]
    default_knob_type: KnobType,
    knob_type: KnobType,
    #[serde(default)]
    default_value: u8,
    /// Accumulated absolute position in endless mode
    endless_value: u8,
}

impl ContinuousResolver {
    pub fn new(driver: &InputDriver) -> Result<Self, InvalidConstructionError> {
        if driver.status.is_ambiguous() || driver.status.arity() != Some(3) {
            return Err(InvalidConstructionError {
                resolver: "continuous",
                status: driver.status,
            });
        }

        Ok(Self {
            eligible_statuses: ELIGIBLE.to_vec(),
            default_status: driver.status,
            default_channel: driver.channel,
            default_number: driver.number,
            status_override: driver.status,
            channel_override: driver.channel,
            number_override: driver.number,
            default_knob_type: driver.knob_type,
            knob_type: driver.knob_type,
            default_value: driver.value.unwrap_or(0),
            endless_value: driver.value.unwrap_or(0),
        })
    }

    /// Check fields of a deserialized resolver
    ///
    /// Statuses must be concrete 3 byte statuses, the override one eligible
    /// or the input's own; addresses and values must be in MIDI range.
    pub fn validate(&self) -> Result<(), TranslatorError> {
        let default = self.default_status;
        if default.is_ambiguous() || default.arity() != Some(3) || default.nibble().is_none() {
            return Err(InvalidConstructionError {
                resolver: "continuous",
                status: default,
            }
            .into());
        }
        if self.status_override != default && !ELIGIBLE.contains(&self.status_override) {
            return Err(TranslatorError::IneligibleStatus(self.status_override));
        }
        for (channel, number) in [
            (self.default_channel, self.default_number),
            (self.channel_override, self.number_override),
        ] {
            if channel > 15 || number > 127 {
                return Err(TranslatorError::InvalidAddress { channel, number });
            }
        }
        if self.endless_value > 127 || self.default_value > 127 {
            return Err(MalformedEventError::DataOutOfRange {
                index: 2,
                value: self.endless_value.max(self.default_value),
            }
            .into());
        }
        Ok(())
    }

    /// Rewrite the address of `original`, forwarding its value
    ///
    /// In endless mode the value byte is read as a delta around 64 and the
    /// accumulated position is sent instead.
    pub fn resolve(&mut self, original: &MidiEvent) -> MidiEvent {
        let Some(raw) = original.data2() else {
            return *original;
        };

        let value = match self.knob_type {
            KnobType::Absolute => raw,
            KnobType::Endless => {
                let delta = i16::from(raw) - 64;
                let next = (i16::from(self.endless_value) + delta).clamp(0, 127);
                self.endless_value = next as u8;
                self.endless_value
            }
        };

        // Overrides are validated on every edit and on restore
        let Some(nibble) = self.status_override.nibble() else {
            return *original;
        };
        MidiEvent::compose(nibble, self.channel_override, self.number_override, Some(value))
            .unwrap_or(*original)
    }

    pub fn eligible_statuses(&self) -> &[StatusKind] {
        &self.eligible_statuses
    }

    pub fn status_override(&self) -> StatusKind {
        self.status_override
    }

    pub fn channel_override(&self) -> u8 {
        self.channel_override
    }

    pub fn number_override(&self) -> u8 {
        self.number_override
    }

    pub fn knob_type(&self) -> KnobType {
        self.knob_type
    }

    pub fn set_status(&mut self, status: StatusKind) -> Result<(), TranslatorError> {
        if !ELIGIBLE.contains(&status) {
            return Err(TranslatorError::IneligibleStatus(status));
        }
        self.status_override = status;
        Ok(())
    }

    pub fn set_channel(&mut self, channel: u8) -> Result<(), TranslatorError> {
        if channel > 15 {
            return Err(TranslatorError::InvalidAddress {
                channel,
                number: self.number_override,
            });
        }
        self.channel_override = channel;
        Ok(())
    }

    pub fn set_number(&mut self, number: u8) -> Result<(), TranslatorError> {
        if number > 127 {
            return Err(TranslatorError::InvalidAddress {
                channel: self.channel_override,
                number,
            });
        }
        self.number_override = number;
        Ok(())
    }

    /// Switch between absolute and endless value handling
    pub fn set_knob_type(&mut self, knob_type: KnobType) {
        self.knob_type = knob_type;
    }

    /// Back to the driver's address, knob type and start position
    pub fn restore_defaults(&mut self) {
        self.status_override = self.default_status;
        self.channel_override = self.default_channel;
        self.number_override = self.default_number;
        self.knob_type = self.default_knob_type;
        self.endless_value = self.default_value;
    }
}

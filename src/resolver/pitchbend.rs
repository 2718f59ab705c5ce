//! Pitchbend rewrite: both data bytes are forwarded untouched
//!
//! The two data bytes are the LSB/MSB of one 14 bit value, so the output
//! stays a pitchbend message; only its channel can be changed.

use serde::{Deserialize, Serialize};

use crate::driver::InputDriver;
use crate::error::{InvalidConstructionError, TranslatorError};
use crate::midi::{MidiEvent, StatusKind, PITCH_BEND};

const ELIGIBLE: [StatusKind; 1] = [StatusKind::PitchBend];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitchbendResolver {
    eligible_statuses: Vec<StatusKind>,
    default_channel: u8,
    status_override: StatusKind,
    channel_override: u8,
}

impl PitchbendResolver {
    pub fn new(driver: &InputDriver) -> Result<Self, InvalidConstructionError> {
        if driver.status != StatusKind::PitchBend {
            return Err(InvalidConstructionError {
                resolver: "pitchbend",
                status: driver.status,
            });
        }

        Ok(Self {
            eligible_statuses: ELIGIBLE.to_vec(),
            default_channel: driver.channel,
            status_override: StatusKind::PitchBend,
            channel_override: driver.channel,
        })
    }

    pub fn resolve(&self, original: &MidiEvent) -> MidiEvent {
        MidiEvent::compose(PITCH_BEND, self.channel_override, original.data1(), original.data2())
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

    pub fn set_status(&mut self, status: StatusKind) -> Result<(), TranslatorError> {
        if !ELIGIBLE.contains(&status) {
            return Err(TranslatorError::IneligibleStatus(status));
        }
        self.status_override = status;
        Ok(())
    }

    pub fn set_channel(&mut self, channel: u8) -> Result<(), TranslatorError> {
        if channel > 15 {
            return Err(TranslatorError::InvalidAddress { channel, number: 0 });
        }
        self.channel_override = channel;
        Ok(())
    }

    /// Check fields of a deserialized resolver
    pub fn validate(&self) -> Result<(), TranslatorError> {
        if !ELIGIBLE.contains(&self.status_override) {
            return Err(TranslatorError::IneligibleStatus(self.status_override));
        }
        for channel in [self.default_channel, self.channel_override] {
            if channel > 15 {
                return Err(TranslatorError::InvalidAddress { channel, number: 0 });
            }
        }
        Ok(())
    }

    pub fn restore_defaults(&mut self) {
        self.status_override = StatusKind::PitchBend;
        self.channel_override = self.default_channel;
    }
}

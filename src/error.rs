//! Error types for the translation engine
//!
//! Configuration-time failures are returned to the caller and never leave a
//! translator half-updated. Live-event failures are reported as
//! [`MalformedEventError`] and the offending event is dropped.

use thiserror::Error;

use crate::midi::StatusKind;
use crate::response::{HardwareResponse, OutputStrategy};

/// A hardware/output response pair with no coherent semantics was requested
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("hardware response {hardware} cannot be translated as {output}")]
pub struct IncompatibleResponseError {
    pub hardware: HardwareResponse,
    pub output: OutputStrategy,
}

/// A resolver was built against a status it cannot express
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{resolver} resolvers cannot be built for {status} inputs")]
pub struct InvalidConstructionError {
    pub resolver: &'static str,
    pub status: StatusKind,
}

/// Raw bytes that do not form a valid 2-3 byte MIDI event
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedEventError {
    #[error("empty MIDI message")]
    Empty,

    #[error("MIDI message too short ({len} bytes)")]
    TooShort { len: usize },

    #[error("MIDI message too long ({len} bytes)")]
    TooLong { len: usize },

    #[error("unrecognised status byte 0x{0:02X}")]
    UnknownStatus(u8),

    #[error("data byte {index} out of range: {value}")]
    DataOutOfRange { index: usize, value: u8 },

    #[error("status 0x{status:02X} expects {expected} bytes, got {actual}")]
    ArityMismatch {
        status: u8,
        expected: usize,
        actual: usize,
    },
}

/// A binding of the wrong length was offered to a resolver
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("binding must be {expected} bytes long, got {actual}")]
pub struct BindingLengthMismatchError {
    pub expected: usize,
    pub actual: usize,
}

/// Errors raised while editing or rebuilding a translator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslatorError {
    #[error(transparent)]
    Incompatible(#[from] IncompatibleResponseError),

    #[error(transparent)]
    Construction(#[from] InvalidConstructionError),

    #[error(transparent)]
    Malformed(#[from] MalformedEventError),

    #[error(transparent)]
    BindingLength(#[from] BindingLengthMismatchError),

    #[error("state {state} does not exist (total states: {total})")]
    UnknownState { state: u32, total: u32 },

    #[error("channel {channel} / number {number} out of range")]
    InvalidAddress { channel: u8, number: u8 },

    #[error("at least one step must remain")]
    StepFloor,

    #[error("steps can only be edited under n-step output")]
    FixedStepCount,

    #[error("status {0} is not eligible for this resolver")]
    IneligibleStatus(StatusKind),

    #[error("no color named '{0}' is available for this input")]
    UnknownColor(String),

    #[error("no fx titled '{0}' is available for this input")]
    UnknownFx(String),

    #[error("fx '{title}' does not accept {value:?}")]
    InvalidFxValue { title: String, value: [u8; 3] },

    #[error("input has no backlight")]
    NoBacklight,

    #[error("operation needs a {expected} resolver, current resolver is {actual}")]
    ResolverMismatch {
        expected: &'static str,
        actual: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = IncompatibleResponseError {
            hardware: HardwareResponse::Toggle,
            output: OutputStrategy::Gate,
        };
        assert_eq!(
            err.to_string(),
            "hardware response toggle cannot be translated as gate"
        );

        let err = InvalidConstructionError {
            resolver: "continuous",
            status: StatusKind::NoteOnOff,
        };
        assert_eq!(
            err.to_string(),
            "continuous resolvers cannot be built for noteon/noteoff inputs"
        );
    }

    #[test]
    fn test_translator_error_from() {
        let err: TranslatorError = BindingLengthMismatchError {
            expected: 3,
            actual: 2,
        }
        .into();
        assert_eq!(err.to_string(), "binding must be 3 bytes long, got 2");
    }
}

//! Backlight colors and effects as described by device drivers
//!
//! Devices set a light by receiving a 3 byte message. Effects (brightness,
//! blink speed, ...) are sent by summing an effect array onto the color array
//! byte by byte:
//!
//! ```text
//! color red, pad 32:   [176, 32, 0]
//! brightness:         +[  0,  0, 5]
//! sent to the device:  [176, 32, 5]
//! ```

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::midi::MidiEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorModifier {
    Blink,
    Pulse,
}

/// A color an input's backlight can be set to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Color {
    /// Display name, e.g. "Red"
    pub name: String,
    /// CSS color used by configuration front ends
    #[serde(default)]
    pub string: String,
    /// Message that sets the light to this color
    pub array: [u8; 3],
    /// Whether effects are summed onto this color
    #[serde(default)]
    pub effectable: bool,
    /// Color shown when the device starts
    #[serde(default)]
    pub default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<ColorModifier>,
}

/// A configurable effect and the values it accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FxDriver {
    /// Short state name (Solid, Blink, ...)
    pub title: String,
    /// Label of the configurable parameter (Brightness, Speed, ...)
    pub effect: String,
    pub valid_vals: Vec<[u8; 3]>,
    pub default_val: [u8; 3],
    /// Effect considered active while a color is in its default state
    #[serde(default)]
    pub is_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_bound_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_bound_label: Option<String>,
}

impl FxDriver {
    pub fn accepts(&self, value: &[u8; 3]) -> bool {
        self.valid_vals.contains(value) || self.default_val == *value
    }
}

/// Effect selected for one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FxValue {
    pub title: String,
    pub value: [u8; 3],
}

/// Byte-wise sum of a color array and an effect array
///
/// Returns `None` when a byte would overflow.
pub fn sum_arrays(color: [u8; 3], fx: [u8; 3]) -> Option<[u8; 3]> {
    Some([
        color[0].checked_add(fx[0])?,
        color[1].checked_add(fx[1])?,
        color[2].checked_add(fx[2])?,
    ])
}

/// Message for `color` with `fx` applied when the color is effectable
///
/// Returns `None` (and logs) when the result is not a valid MIDI message.
pub fn light_message(color: &Color, fx: Option<[u8; 3]>) -> Option<MidiEvent> {
    let bytes = match fx {
        Some(fx) if color.effectable => match sum_arrays(color.array, fx) {
            Some(bytes) => bytes,
            None => {
                warn!("Color {} overflows with fx {:?}", color.name, fx);
                return None;
            }
        },
        _ => color.array,
    };

    match MidiEvent::from_bytes(&bytes) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Color {} produced an invalid light message: {}", color.name, e);
            None
        }
    }
}

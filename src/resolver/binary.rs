//! On/off rewrite for gate outputs; the value byte is always forwarded

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::driver::InputDriver;
use crate::error::TranslatorError;
use crate::midi::{MidiEvent, StatusKind, NOTE_ON};

const ELIGIBLE: [StatusKind; 3] = [
    StatusKind::NoteOn,
    StatusKind::NoteOff,
    StatusKind::ControlChange,
];

/// Address an on or off state is rewritten to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryOverride {
    pub status: StatusKind,
    pub channel: u8,
    pub number: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryResolver {
    eligible_statuses: Vec<StatusKind>,
    #[serde(with = "crate::state_manager::state_map")]
    overrides: BTreeMap<u32, BinaryOverride>,
    #[serde(with = "crate::state_manager::state_map")]
    defaults: BTreeMap<u32, BinaryOverride>,
}

impl BinaryResolver {
    /// Note inputs map state 0 to note-off and state 1 to note-on; anything
    /// else keeps its own status in both states
    pub fn new(driver: &InputDriver) -> Self {
        let at = |status: StatusKind| BinaryOverride {
            status,
            channel: driver.channel,
            number: driver.number,
        };

        let defaults = BTreeMap::from([
            (0, at(driver.status.off_kind())),
            (1, at(driver.status.on_kind())),
        ]);

        Self {
            eligible_statuses: ELIGIBLE.to_vec(),
            overrides: defaults.clone(),
            defaults,
        }
    }

    pub fn resolve(&self, state: u32, original: &MidiEvent) -> MidiEvent {
        let Some(target) = self.overrides.get(&state) else {
            return *original;
        };
        let nibble = target.status.nibble().unwrap_or(NOTE_ON);
        MidiEvent::compose(nibble, target.channel, target.number, original.data2())
            .unwrap_or(*original)
    }

    pub fn eligible_statuses(&self) -> &[StatusKind] {
        &self.eligible_statuses
    }

    pub fn override_for(&self, state: u32) -> Option<&BinaryOverride> {
        self.overrides.get(&state)
    }

    pub fn set_override(&mut self, state: u32, target: BinaryOverride) -> Result<(), TranslatorError> {
        check_override(state, &target, None)?;
        self.overrides.insert(state, target);
        Ok(())
    }

    /// Check every override and default of a deserialized resolver
    ///
    /// An override may keep the input's own status for its state even when
    /// that status could not be chosen as an override.
    pub fn validate(&self) -> Result<(), TranslatorError> {
        for (state, target) in &self.defaults {
            check_override(*state, target, Some(target.status))?;
        }
        for (state, target) in &self.overrides {
            let native = self.defaults.get(state).map(|d| d.status);
            check_override(*state, target, native)?;
        }
        Ok(())
    }

    /// Forward events for `state` unchanged from now on
    pub fn clear_override(&mut self, state: u32) {
        self.overrides.remove(&state);
    }

    pub fn restore_defaults(&mut self) {
        self.overrides = self.defaults.clone();
    }
}

fn check_override(
    state: u32,
    target: &BinaryOverride,
    native: Option<StatusKind>,
) -> Result<(), TranslatorError> {
    if state > 1 {
        return Err(TranslatorError::UnknownState { state, total: 2 });
    }
    let concrete = target.status.nibble().is_some();
    if !concrete || (!ELIGIBLE.contains(&target.status) && native != Some(target.status)) {
        return Err(TranslatorError::IneligibleStatus(target.status));
    }
    if target.channel > 15 || target.number > 127 {
        return Err(TranslatorError::InvalidAddress {
            channel: target.channel,
            number: target.number,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::test_support::driver;
    use crate::response::HardwareResponse;
    use proptest::prelude::*;

    fn ev(bytes: &[u8]) -> MidiEvent {
        MidiEvent::from_bytes(bytes).unwrap()
    }

    #[test]
    fn test_note_defaults() {
        let d = driver(StatusKind::NoteOnOff, 1, 36, HardwareResponse::Gate);
        let resolver = BinaryResolver::new(&d);

        assert_eq!(resolver.resolve(1, &ev(&[0x91, 36, 100])), ev(&[0x91, 36, 100]));
        assert_eq!(resolver.resolve(0, &ev(&[0x81, 36, 64])), ev(&[0x81, 36, 64]));
        assert_eq!(resolver.resolve(0, &ev(&[0x91, 36, 0])), ev(&[0x81, 36, 0]));
    }

    #[test]
    fn test_override_rewrites_address() {
        let d = driver(StatusKind::NoteOnOff, 0, 36, HardwareResponse::Gate);
        let mut resolver = BinaryResolver::new(&d);
        let target = BinaryOverride {
            status: StatusKind::ControlChange,
            channel: 4,
            number: 70,
        };
        resolver.set_override(1, target).unwrap();

        assert_eq!(resolver.resolve(1, &ev(&[0x90, 36, 77])), ev(&[0xB4, 70, 77]));

        resolver.clear_override(1);
        assert_eq!(resolver.resolve(1, &ev(&[0x90, 36, 77])), ev(&[0x90, 36, 77]));

        resolver.restore_defaults();
        assert_eq!(resolver.override_for(1).map(|o| o.status), Some(StatusKind::NoteOn));
    }

    #[test]
    fn test_set_override_validation() {
        let d = driver(StatusKind::ControlChange, 0, 20, HardwareResponse::Gate);
        let mut resolver = BinaryResolver::new(&d);
        let target = BinaryOverride {
            status: StatusKind::PitchBend,
            channel: 0,
            number: 0,
        };

        assert_eq!(
            resolver.set_override(1, target),
            Err(TranslatorError::IneligibleStatus(StatusKind::PitchBend))
        );
        assert_eq!(
            resolver.set_override(2, BinaryOverride { status: StatusKind::NoteOn, ..target }),
            Err(TranslatorError::UnknownState { state: 2, total: 2 })
        );
        assert!(resolver
            .set_override(0, BinaryOverride { status: StatusKind::NoteOn, channel: 16, number: 0 })
            .is_err());
    }

    proptest! {
        #[test]
        fn prop_value_passes_through(state in 0u32..2, data1 in 0u8..128, value in 0u8..128) {
            let d = driver(StatusKind::ControlChange, 0, 20, HardwareResponse::Gate);
            let mut resolver = BinaryResolver::new(&d);
            resolver
                .set_override(state, BinaryOverride { status: StatusKind::NoteOn, channel: 9, number: 1 })
                .unwrap();

            let out = resolver.resolve(state, &ev(&[0xB0, data1, value]));
            prop_assert_eq!(out.data2(), Some(value));
            prop_assert_eq!(out.status(), 0x99);
        }
    }

    #[test]
    fn test_validate_corrupt_override() {
        let d = driver(StatusKind::NoteOnOff, 0, 36, HardwareResponse::Gate);
        let resolver = BinaryResolver::new(&d);
        assert_eq!(resolver.validate(), Ok(()));

        let mut json = serde_json::to_value(&resolver).unwrap();
        json["overrides"]["1"]["number"] = 200.into();
        let bad: BinaryResolver = serde_json::from_value(json).unwrap();
        assert_eq!(
            bad.validate(),
            Err(TranslatorError::InvalidAddress { channel: 0, number: 200 })
        );

        let mut json = serde_json::to_value(&resolver).unwrap();
        json["overrides"]["0"]["status"] = "pitchbend".into();
        let bad: BinaryResolver = serde_json::from_value(json).unwrap();
        assert_eq!(
            bad.validate(),
            Err(TranslatorError::IneligibleStatus(StatusKind::PitchBend))
        );

        let mut json = serde_json::to_value(&resolver).unwrap();
        json["defaults"]["1"]["status"] = "noteon/noteoff".into();
        json["overrides"]["1"]["status"] = "noteon/noteoff".into();
        let bad: BinaryResolver = serde_json::from_value(json).unwrap();
        assert_eq!(
            bad.validate(),
            Err(TranslatorError::IneligibleStatus(StatusKind::NoteOnOff))
        );

        // A program change pad keeps its own status
        let d = driver(StatusKind::ProgramChange, 0, 3, HardwareResponse::Gate);
        assert_eq!(BinaryResolver::new(&d).validate(), Ok(()));
    }

    #[test]
    fn test_binary_keeps_77() {
        let d = driver(StatusKind::NoteOnOff, 0, 36, HardwareResponse::Gate);
        let resolver = BinaryResolver::new(&d);
        assert_eq!(resolver.resolve(1, &ev(&[0x90, 36, 77])).data2(), Some(77));
        assert_eq!(resolver.resolve(0, &ev(&[0x90, 36, 77])).data2(), Some(77));
    }
}

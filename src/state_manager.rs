//! Logical state tracking for a single input
//!
//! [`StateManager`] turns hardware events into state indices. It holds no
//! mutable state of its own; the current position lives in the
//! [`TranslatorState`] owned by the translator and is passed in by reference.

use serde::{Deserialize, Serialize};

use crate::error::MalformedEventError;
use crate::midi::{MidiEvent, StatusKind, NOTE_ON};
use crate::response::{HardwareResponse, OutputStrategy};

/// Current position of a translator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslatorState {
    pub current_state: u32,
    pub total_states: u32,
}

impl TranslatorState {
    pub fn new(total_states: u32) -> Self {
        Self {
            current_state: 0,
            total_states: total_states.max(1),
        }
    }

    /// Start over at state 0 with a new state count
    pub fn reset(&mut self, total_states: u32) {
        *self = Self::new(total_states);
    }

    /// Change the state count, falling back to state 0 if the current
    /// position no longer exists
    pub fn set_total(&mut self, total_states: u32) {
        self.total_states = total_states.max(1);
        if self.current_state >= self.total_states {
            self.current_state = 0;
        }
    }

    pub fn is_valid(&self) -> bool {
        self.total_states >= 1 && self.current_state < self.total_states
    }
}

impl Default for TranslatorState {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Converts hardware events into state indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateManager {
    hardware: HardwareResponse,
    trigger: MidiEvent,
    positions: Vec<MidiEvent>,
}

impl StateManager {
    /// `positions` lists the events a stepped switch sends, one per position
    pub fn new(hardware: HardwareResponse, trigger: MidiEvent, positions: Vec<MidiEvent>) -> Self {
        Self {
            hardware,
            trigger,
            positions,
        }
    }

    /// Canonical press event of an input: its own status (note-on for the
    /// ambiguous note class) on its channel and number, at value 127
    pub fn trigger_event(
        status: StatusKind,
        channel: u8,
        number: u8,
    ) -> Result<MidiEvent, MalformedEventError> {
        let kind = status.on_kind();
        let nibble = kind.nibble().unwrap_or(NOTE_ON);
        let data2 = match kind.arity() {
            Some(2) => None,
            _ => Some(127),
        };
        MidiEvent::compose(nibble, channel, number, data2)
    }

    pub fn hardware(&self) -> HardwareResponse {
        self.hardware
    }

    pub fn trigger(&self) -> MidiEvent {
        self.trigger
    }

    pub fn positions(&self) -> &[MidiEvent] {
        &self.positions
    }

    /// Whether `event` counts as a press of this control
    fn is_press(&self, event: &MidiEvent) -> bool {
        match self.hardware {
            HardwareResponse::Gate => self.trigger.identity_eq(event, false) && !event.is_release(),
            HardwareResponse::NStep => self.trigger.identity_eq(event, false),
            // These controls only ever report presses
            HardwareResponse::Toggle | HardwareResponse::Constant => true,
            HardwareResponse::Continuous => false,
        }
    }

    /// Advance `state` for `event`, returning the new state index or `None`
    /// when nothing should be forwarded
    pub fn advance(
        &self,
        output: OutputStrategy,
        state: &mut TranslatorState,
        event: &MidiEvent,
    ) -> Option<u32> {
        if self.hardware == HardwareResponse::Continuous {
            state.current_state = 0;
            return Some(0);
        }

        if output == OutputStrategy::Enumerated && !self.positions.is_empty() {
            let index = self
                .positions
                .iter()
                .position(|position| position.identity_eq(event, true))? as u32;
            if index >= state.total_states {
                return None;
            }
            state.current_state = index;
            return Some(index);
        }

        let press = self.is_press(event);

        if output == OutputStrategy::Gate && self.hardware == HardwareResponse::Gate {
            let next = u32::from(press);
            state.current_state = next;
            return Some(next);
        }

        if !press {
            return None;
        }

        let next = match output {
            OutputStrategy::Gate | OutputStrategy::Toggle => (state.current_state + 1) % 2,
            OutputStrategy::Constant | OutputStrategy::Continuous => 0,
            OutputStrategy::NStep | OutputStrategy::Enumerated => {
                (state.current_state + 1) % state.total_states.max(1)
            }
        };
        state.current_state = next;
        Some(next)
    }
}

/// Serde adapter for state-indexed maps
///
/// Keys are written as strings so the maps stay valid JSON objects and still
/// load when buffered inside a tagged enum.
pub(crate) mod state_map {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<T, S>(map: &BTreeMap<u32, T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        serializer.collect_map(map.iter().map(|(state, value)| (state.to_string(), value)))
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<BTreeMap<u32, T>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        BTreeMap::<String, T>::deserialize(deserializer)?
            .into_iter()
            .map(|(key, value)| {
                key.parse::<u32>()
                    .map(|state| (state, value))
                    .map_err(|_| D::Error::custom(format!("invalid state index '{}'", key)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ev(bytes: &[u8]) -> MidiEvent {
        MidiEvent::from_bytes(bytes).unwrap()
    }

    fn manager(hardware: HardwareResponse) -> StateManager {
        let trigger = StateManager::trigger_event(StatusKind::NoteOnOff, 0, 36).unwrap();
        StateManager::new(hardware, trigger, Vec::new())
    }

    #[test]
    fn test_trigger_event_derivation() {
        let trigger = StateManager::trigger_event(StatusKind::NoteOnOff, 2, 36).unwrap();
        assert_eq!(trigger.to_bytes(), vec![0x92, 36, 127]);

        let trigger = StateManager::trigger_event(StatusKind::ControlChange, 0, 7).unwrap();
        assert_eq!(trigger.to_bytes(), vec![0xB0, 7, 127]);

        let trigger = StateManager::trigger_event(StatusKind::ProgramChange, 1, 4).unwrap();
        assert_eq!(trigger.to_bytes(), vec![0xC1, 4]);
    }

    #[test]
    fn test_gate_mirrors_hardware() {
        let sm = manager(HardwareResponse::Gate);
        let mut state = TranslatorState::new(2);

        assert_eq!(sm.advance(OutputStrategy::Gate, &mut state, &ev(&[0x90, 36, 100])), Some(1));
        assert_eq!(state.current_state, 1);
        assert_eq!(sm.advance(OutputStrategy::Gate, &mut state, &ev(&[0x80, 36, 0])), Some(0));
        assert_eq!(state.current_state, 0);
        // Note-on with velocity 0 is a release too
        sm.advance(OutputStrategy::Gate, &mut state, &ev(&[0x90, 36, 90]));
        assert_eq!(sm.advance(OutputStrategy::Gate, &mut state, &ev(&[0x90, 36, 0])), Some(0));
    }

    #[test]
    fn test_gate_as_toggle_ignores_release() {
        let sm = manager(HardwareResponse::Gate);
        let mut state = TranslatorState::new(2);

        assert_eq!(sm.advance(OutputStrategy::Toggle, &mut state, &ev(&[0x90, 36, 127])), Some(1));
        assert_eq!(sm.advance(OutputStrategy::Toggle, &mut state, &ev(&[0x80, 36, 0])), None);
        assert_eq!(state.current_state, 1);
        assert_eq!(sm.advance(OutputStrategy::Toggle, &mut state, &ev(&[0x90, 36, 127])), Some(0));
    }

    #[test]
    fn test_gate_as_constant() {
        let sm = manager(HardwareResponse::Gate);
        let mut state = TranslatorState::new(1);

        assert_eq!(sm.advance(OutputStrategy::Constant, &mut state, &ev(&[0x90, 36, 127])), Some(0));
        assert_eq!(sm.advance(OutputStrategy::Constant, &mut state, &ev(&[0x80, 36, 0])), None);
        assert_eq!(sm.advance(OutputStrategy::Constant, &mut state, &ev(&[0x90, 36, 127])), Some(0));
    }

    #[test]
    fn test_cc_pad_release_is_not_a_press() {
        let trigger = StateManager::trigger_event(StatusKind::ControlChange, 0, 20).unwrap();
        let sm = StateManager::new(HardwareResponse::Gate, trigger, Vec::new());
        let mut state = TranslatorState::new(2);

        assert_eq!(sm.advance(OutputStrategy::Toggle, &mut state, &ev(&[0xB0, 20, 127])), Some(1));
        assert_eq!(sm.advance(OutputStrategy::Toggle, &mut state, &ev(&[0xB0, 20, 0])), None);
    }

    #[test]
    fn test_nstep_circularity() {
        let sm = manager(HardwareResponse::Gate);
        let mut state = TranslatorState::new(3);
        let press = ev(&[0x90, 36, 127]);
        let release = ev(&[0x80, 36, 0]);

        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(sm.advance(OutputStrategy::NStep, &mut state, &press).unwrap());
            assert_eq!(sm.advance(OutputStrategy::NStep, &mut state, &release), None);
        }
        assert_eq!(seen, vec![1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_toggle_hardware_every_event_flips() {
        let sm = manager(HardwareResponse::Toggle);
        let mut state = TranslatorState::new(2);
        let event = ev(&[0x90, 36, 127]);

        assert_eq!(sm.advance(OutputStrategy::Toggle, &mut state, &event), Some(1));
        assert_eq!(sm.advance(OutputStrategy::Toggle, &mut state, &event), Some(0));
        assert_eq!(sm.advance(OutputStrategy::Constant, &mut state, &event), Some(0));
    }

    #[test]
    fn test_continuous_is_stateless() {
        let trigger = StateManager::trigger_event(StatusKind::ControlChange, 0, 7).unwrap();
        let sm = StateManager::new(HardwareResponse::Continuous, trigger, Vec::new());
        let mut state = TranslatorState::new(1);

        for value in [0, 64, 127] {
            let event = ev(&[0xB0, 7, value]);
            assert_eq!(sm.advance(OutputStrategy::Continuous, &mut state, &event), Some(0));
        }
    }

    #[test]
    fn test_enumerated_positions() {
        let positions = vec![ev(&[0xB0, 9, 0]), ev(&[0xB0, 9, 64]), ev(&[0xB0, 9, 127])];
        let trigger = StateManager::trigger_event(StatusKind::ControlChange, 0, 9).unwrap();
        let sm = StateManager::new(HardwareResponse::NStep, trigger, positions);
        let mut state = TranslatorState::new(3);

        assert_eq!(sm.advance(OutputStrategy::Enumerated, &mut state, &ev(&[0xB0, 9, 127])), Some(2));
        assert_eq!(sm.advance(OutputStrategy::Enumerated, &mut state, &ev(&[0xB0, 9, 0])), Some(0));
        assert_eq!(sm.advance(OutputStrategy::Enumerated, &mut state, &ev(&[0xB0, 9, 10])), None);
        assert_eq!(state.current_state, 0);

        // Positions beyond the state count are ignored
        state.set_total(2);
        assert_eq!(sm.advance(OutputStrategy::Enumerated, &mut state, &ev(&[0xB0, 9, 127])), None);

        // Under n-step the same switch just steps forward
        assert_eq!(sm.advance(OutputStrategy::NStep, &mut state, &ev(&[0xB0, 9, 10])), Some(1));
    }

    #[test]
    fn test_state_set_total() {
        let mut state = TranslatorState::new(4);
        state.current_state = 3;
        state.set_total(2);
        assert_eq!(state, TranslatorState::new(2));
        state.set_total(0);
        assert_eq!(state.total_states, 1);
        assert!(state.is_valid());
    }

    proptest! {
        #[test]
        fn prop_toggle_alternates(presses in 1usize..40, channel in 0u8..16, number in 0u8..128) {
            let trigger = StateManager::trigger_event(StatusKind::NoteOnOff, channel, number).unwrap();
            let sm = StateManager::new(HardwareResponse::Gate, trigger, Vec::new());
            let mut state = TranslatorState::new(2);

            let mut last = state.current_state;
            for _ in 0..presses {
                let next = sm.advance(OutputStrategy::Toggle, &mut state, &trigger).unwrap();
                prop_assert_ne!(next, last);
                last = next;
            }
        }

        #[test]
        fn prop_nstep_stays_in_range(total in 1u32..16, presses in 0usize..64) {
            let sm = manager(HardwareResponse::Toggle);
            let mut state = TranslatorState::new(total);
            let event = ev(&[0x90, 36, 127]);

            for i in 0..presses {
                let next = sm.advance(OutputStrategy::NStep, &mut state, &event).unwrap();
                prop_assert_eq!(next, ((i as u32) + 1) % total);
                prop_assert!(state.is_valid());
            }
        }
    }
}

//! State-indexed binding table used by toggle, constant and stepped outputs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::driver::InputDriver;
use crate::error::{BindingLengthMismatchError, MalformedEventError, TranslatorError};
use crate::midi::{MidiEvent, StatusKind, NOTE_ON};
use crate::response::OutputStrategy;

const ELIGIBLE: [StatusKind; 4] = [
    StatusKind::NoteOn,
    StatusKind::NoteOff,
    StatusKind::ControlChange,
    StatusKind::ProgramChange,
];

/// One binding per state, plus the bindings it was created with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscreteResolver {
    eligible_statuses: Vec<StatusKind>,
    #[serde(with = "crate::state_manager::state_map")]
    bindings: BTreeMap<u32, MidiEvent>,
    #[serde(with = "crate::state_manager::state_map")]
    defaults: BTreeMap<u32, MidiEvent>,
}

impl DiscreteResolver {
    pub fn new(output: OutputStrategy, driver: &InputDriver) -> Result<Self, MalformedEventError> {
        let status = driver.status;
        let mut seeds = Vec::new();

        match output {
            OutputStrategy::Toggle => {
                seeds.push(seed_event(driver, status.off_kind(), 0)?);
                seeds.push(seed_event(driver, status.on_kind(), 127)?);
            }
            OutputStrategy::Enumerated if !driver.steps.is_empty() => {
                seeds.extend(driver.steps.iter().copied());
            }
            _ => seeds.push(seed_event(driver, status.on_kind(), 127)?),
        }

        let defaults: BTreeMap<u32, MidiEvent> = seeds
            .into_iter()
            .enumerate()
            .map(|(state, event)| (state as u32, event))
            .collect();

        Ok(Self {
            eligible_statuses: ELIGIBLE.to_vec(),
            bindings: defaults.clone(),
            defaults,
        })
    }

    pub fn resolve(&self, state: u32, original: &MidiEvent) -> MidiEvent {
        self.bindings.get(&state).copied().unwrap_or(*original)
    }

    pub fn eligible_statuses(&self) -> &[StatusKind] {
        &self.eligible_statuses
    }

    pub fn n_steps(&self) -> u32 {
        self.bindings.len() as u32
    }

    pub fn binding(&self, state: u32) -> Option<&MidiEvent> {
        self.bindings.get(&state)
    }

    pub fn bindings(&self) -> &BTreeMap<u32, MidiEvent> {
        &self.bindings
    }

    /// Whether the binding for `state` is still the one it was seeded with
    pub fn is_default(&self, state: u32) -> bool {
        self.bindings.get(&state) == self.defaults.get(&state)
    }

    /// Replace the binding for an existing state
    ///
    /// The new binding must use an eligible status and have the same length
    /// as the binding it replaces.
    pub fn set_binding(&mut self, state: u32, event: MidiEvent) -> Result<(), TranslatorError> {
        let current = self
            .bindings
            .get(&state)
            .ok_or(TranslatorError::UnknownState {
                state,
                total: self.n_steps(),
            })?;

        if !ELIGIBLE.contains(&event.kind()) {
            return Err(TranslatorError::IneligibleStatus(event.kind()));
        }
        if current.len() != event.len() {
            return Err(BindingLengthMismatchError {
                expected: current.len(),
                actual: event.len(),
            }
            .into());
        }

        self.bindings.insert(state, event);
        Ok(())
    }

    /// Append a step at the end, seeded like the first step; returns the new step count
    pub fn add_step(&mut self) -> u32 {
        let next = self.n_steps();
        let seed = self.defaults.get(&0).or_else(|| self.bindings.get(&0)).copied();
        if let Some(seed) = seed {
            self.bindings.insert(next, seed);
            self.defaults.insert(next, seed);
        }
        self.n_steps()
    }

    /// Drop the highest step; returns the new step count
    pub fn remove_step(&mut self) -> Result<u32, TranslatorError> {
        let last = self.n_steps().checked_sub(1).filter(|last| *last > 0);
        let last = last.ok_or(TranslatorError::StepFloor)?;
        self.bindings.remove(&last);
        self.defaults.remove(&last);
        Ok(self.n_steps())
    }

    pub fn restore_defaults(&mut self) {
        self.bindings = self.defaults.clone();
    }

    /// Take over user-edited bindings from `previous` for states that exist here
    pub fn adopt_user_bindings(&mut self, previous: &DiscreteResolver) {
        for (state, event) in &previous.bindings {
            if previous.is_default(*state) {
                continue;
            }
            if let Some(slot) = self.bindings.get_mut(state) {
                if slot.len() == event.len() {
                    *slot = *event;
                }
            }
        }
    }

    /// Check a deserialized resolver
    ///
    /// Bindings must cover `0..n` with the same states as the defaults, and
    /// every edited binding must pass the checks of [`Self::set_binding`].
    pub fn validate(&self) -> Result<(), TranslatorError> {
        let total = self.n_steps();
        if !self.is_dense() || !self.bindings.keys().eq(self.defaults.keys()) {
            return Err(TranslatorError::UnknownState {
                state: total,
                total: self.defaults.len() as u32,
            });
        }
        for (state, event) in &self.bindings {
            if self.is_default(*state) {
                continue;
            }
            if !ELIGIBLE.contains(&event.kind()) {
                return Err(TranslatorError::IneligibleStatus(event.kind()));
            }
            if let Some(default) = self.defaults.get(state) {
                if default.len() != event.len() {
                    return Err(BindingLengthMismatchError {
                        expected: default.len(),
                        actual: event.len(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Bindings cover exactly `0..n` with at least one step
    pub fn is_dense(&self) -> bool {
        !self.bindings.is_empty()
            && self
                .bindings
                .keys()
                .enumerate()
                .all(|(index, state)| index as u32 == *state)
    }
}

fn seed_event(
    driver: &InputDriver,
    kind: StatusKind,
    value: u8,
) -> Result<MidiEvent, MalformedEventError> {
    let nibble = kind.nibble().unwrap_or(NOTE_ON);
    let data2 = (kind.arity() != Some(2)).then_some(value);
    MidiEvent::compose(nibble, driver.channel, driver.number, data2)
}

//! Device-bound backlight feedback
//!
//! [`DeviceColorPropagator`] is advanced once for every hardware event that
//! produced a state and answers with the light message for the new step.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::trace;

use crate::color::{light_message, Color, FxDriver, FxValue};
use crate::midi::MidiEvent;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceColorPropagator {
    #[serde(with = "crate::state_manager::state_map")]
    color_bindings: BTreeMap<u32, Color>,
    #[serde(with = "crate::state_manager::state_map")]
    fx_bindings: BTreeMap<u32, FxValue>,
    current_step: u32,
    #[serde(default)]
    default_color: Option<Color>,
    #[serde(default)]
    default_fx: Option<FxDriver>,
    /// Step count of the owning translator; explicit bindings may extend it
    #[serde(default)]
    light_states: u32,
}

impl DeviceColorPropagator {
    pub fn new(default_color: Option<Color>, default_fx: Option<FxDriver>, light_states: u32) -> Self {
        Self {
            color_bindings: BTreeMap::new(),
            fx_bindings: BTreeMap::new(),
            current_step: 0,
            default_color,
            default_fx,
            light_states,
        }
    }

    /// Number of steps the propagator cycles through; 0 disables feedback
    ///
    /// The owning translator's state count is a floor: colors bound past it
    /// extend the cycle.
    pub fn n_steps(&self) -> u32 {
        let bound = self
            .color_bindings
            .keys()
            .next_back()
            .map(|step| step + 1)
            .unwrap_or(0);
        bound.max(self.light_states)
    }

    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    /// Move to the next step and return its light message
    pub fn advance(&mut self) -> Option<MidiEvent> {
        let n_steps = self.n_steps();
        if n_steps == 0 {
            return None;
        }
        self.current_step = (self.current_step + 1) % n_steps;
        trace!("Backlight step -> {}", self.current_step);
        self.peek()
    }

    /// Advance for a translator that just entered `state`
    ///
    /// Stepping normally lands on `state`; when it does not (a repeated gate
    /// press, an enumerated jump) the propagator is moved onto `state`.
    pub fn follow(&mut self, state: u32) -> Option<MidiEvent> {
        let advanced = self.advance();
        if self.current_step == state || state >= self.n_steps() {
            return advanced;
        }
        self.current_step = state;
        self.peek()
    }

    /// Light message for the current step, without advancing
    pub fn peek(&self) -> Option<MidiEvent> {
        if self.n_steps() == 0 {
            return None;
        }
        let color = self.color(self.current_step)?;
        light_message(color, self.fx_value(self.current_step))
    }

    /// Color shown at `step`, falling back to the default color
    pub fn color(&self, step: u32) -> Option<&Color> {
        self.color_bindings
            .get(&step)
            .or(self.default_color.as_ref())
    }

    /// Effect value applied at `step`
    ///
    /// The explicit value wins; otherwise the default effect's default value
    /// is used when the step's color is effectable.
    pub fn fx_value(&self, step: u32) -> Option<[u8; 3]> {
        if let Some(fx) = self.fx_bindings.get(&step) {
            return Some(fx.value);
        }
        let effectable = self.color(step).map(|c| c.effectable).unwrap_or(false);
        if !effectable {
            return None;
        }
        self.default_fx.as_ref().map(|fx| fx.default_val)
    }

    /// Title of the effect selected at `step`
    pub fn fx_title(&self, step: u32) -> Option<&str> {
        self.fx_bindings
            .get(&step)
            .map(|fx| fx.title.as_str())
            .or(self.default_fx.as_ref().map(|fx| fx.title.as_str()))
    }

    /// Set the color for `step`; any effect chosen for the step is dropped
    pub fn set_color(&mut self, step: u32, color: Color) {
        self.color_bindings.insert(step, color);
        self.fx_bindings.remove(&step);
    }

    /// Select an effect for `step`, starting at its default value
    pub fn set_fx(&mut self, step: u32, fx: &FxDriver) {
        self.fx_bindings.insert(
            step,
            FxValue {
                title: fx.title.clone(),
                value: fx.default_val,
            },
        );
    }

    /// Change the value of the effect at `step`
    pub fn set_fx_value(&mut self, step: u32, title: &str, value: [u8; 3]) {
        self.fx_bindings.insert(
            step,
            FxValue {
                title: title.to_string(),
                value,
            },
        );
    }

    pub fn set_light_states(&mut self, light_states: u32) {
        self.light_states = light_states;
        let n_steps = self.n_steps();
        if self.current_step >= n_steps {
            self.current_step = 0;
        }
    }

    /// Align the current step with the translator's state
    pub fn jump_to(&mut self, step: u32) {
        if step < self.n_steps() {
            self.current_step = step;
        }
    }

    /// Forget colors and effects of steps at or beyond `n_steps`
    pub fn truncate(&mut self, n_steps: u32) {
        self.color_bindings.retain(|step, _| *step < n_steps);
        self.fx_bindings.retain(|step, _| *step < n_steps);
        self.set_light_states(n_steps);
    }

    /// Drop every explicit color and effect and start over at step 0
    pub fn restore_defaults(&mut self) {
        self.color_bindings.clear();
        self.fx_bindings.clear();
        self.current_step = 0;
    }

    pub fn is_valid(&self) -> bool {
        self.n_steps() == 0 || self.current_step < self.n_steps()
    }
}

//! Per-input translation façade
//!
//! An [`InputTranslator`] owns everything one physical input needs: its
//! [`TranslatorState`], the [`StateManager`] rules for its hardware, the
//! [`MessageResolver`] for the selected output strategy and, for inputs with
//! a backlight, a [`DeviceColorPropagator`].
//!
//! Every configuration edit validates first and only then mutates, so a
//! rejected edit leaves the translator exactly as it was.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::driver::InputDriver;
use crate::error::{MalformedEventError, TranslatorError};
use crate::midi::{MidiEvent, StatusKind};
use crate::propagator::DeviceColorPropagator;
use crate::resolver::{BinaryOverride, KnobType, MessageResolver};
use crate::response::{self, OutputStrategy};
use crate::state_manager::{StateManager, TranslatorState};

/// Messages produced by one hardware event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranslationResult {
    pub to_client: Option<MidiEvent>,
    pub to_device: Option<MidiEvent>,
}

impl TranslationResult {
    /// Pass an event through to clients untouched
    pub fn passthrough(event: MidiEvent) -> Self {
        Self {
            to_client: Some(event),
            to_device: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_client.is_none() && self.to_device.is_none()
    }
}

/// Serializable state of one translator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputTranslatorSnapshot {
    pub output_strategy: OutputStrategy,
    pub state: TranslatorState,
    pub message_resolver: MessageResolver,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_propagator: Option<DeviceColorPropagator>,
}

#[derive(Debug, Clone)]
pub struct InputTranslator {
    driver: InputDriver,
    output: OutputStrategy,
    state: TranslatorState,
    state_manager: StateManager,
    resolver: MessageResolver,
    propagator: Option<DeviceColorPropagator>,
}

impl InputTranslator {
    /// Translator using the input's native response
    pub fn from_driver(driver: &InputDriver) -> Result<Self, TranslatorError> {
        Self::with_strategy(driver, driver.response.into())
    }

    pub fn with_strategy(driver: &InputDriver, output: OutputStrategy) -> Result<Self, TranslatorError> {
        response::validate(driver.response, output)?;

        let trigger = driver.trigger_event()?;
        let state_manager = StateManager::new(driver.response, trigger, driver.steps.clone());
        let resolver = MessageResolver::for_strategy(output, driver)?;
        let total = total_states(output, &resolver);

        let propagator = driver.has_backlight().then(|| {
            DeviceColorPropagator::new(
                driver.default_color().cloned(),
                driver.default_fx().cloned(),
                total,
            )
        });

        Ok(Self {
            driver: driver.clone(),
            output,
            state: TranslatorState::new(total),
            state_manager,
            resolver,
            propagator,
        })
    }

    /// Rebuild a translator from a saved snapshot
    ///
    /// The snapshot must be coherent with the driver: a compatible strategy,
    /// the resolver that strategy uses with well-formed fields, and a state
    /// inside its state count. Only n-step outputs may carry a step count
    /// other than the one the strategy starts with.
    pub fn restore(driver: &InputDriver, snapshot: InputTranslatorSnapshot) -> Result<Self, TranslatorError> {
        let mut translator = Self::with_strategy(driver, snapshot.output_strategy)?;

        let expected = translator.resolver.name();
        let actual = snapshot.message_resolver.name();
        if expected != actual {
            return Err(TranslatorError::ResolverMismatch { expected, actual });
        }

        snapshot.message_resolver.validate()?;

        let total = total_states(snapshot.output_strategy, &snapshot.message_resolver);
        let fixed = translator.state.total_states;
        if !snapshot.output_strategy.has_variable_steps() && total != fixed {
            return Err(TranslatorError::UnknownState { state: total, total: fixed });
        }

        let state = snapshot.state;
        if !state.is_valid() || state.total_states != total {
            return Err(TranslatorError::UnknownState {
                state: state.current_state,
                total,
            });
        }

        translator.resolver = snapshot.message_resolver;
        translator.state = state;

        if let (Some(current), Some(saved)) = (translator.propagator.as_mut(), snapshot.device_propagator) {
            if !saved.is_valid() {
                return Err(TranslatorError::UnknownState {
                    state: saved.current_step(),
                    total: saved.n_steps(),
                });
            }
            *current = saved;
        }

        Ok(translator)
    }

    pub fn snapshot(&self) -> InputTranslatorSnapshot {
        InputTranslatorSnapshot {
            output_strategy: self.output,
            state: self.state,
            message_resolver: self.resolver.clone(),
            device_propagator: self.propagator.clone(),
        }
    }

    pub fn id(&self) -> &str {
        &self.driver.id
    }

    pub fn driver(&self) -> &InputDriver {
        &self.driver
    }

    pub fn output_strategy(&self) -> OutputStrategy {
        self.output
    }

    pub fn state(&self) -> TranslatorState {
        self.state
    }

    pub fn resolver(&self) -> &MessageResolver {
        &self.resolver
    }

    pub fn propagator(&self) -> Option<&DeviceColorPropagator> {
        self.propagator.as_ref()
    }

    /// Switch the output strategy
    ///
    /// Resets the state to 0. Changing to another strategy rebuilds the
    /// resolver, keeping user-edited bindings whose states still exist.
    pub fn set_output_strategy(&mut self, output: OutputStrategy) -> Result<(), TranslatorError> {
        response::validate(self.driver.response, output)?;

        if output == self.output {
            let total = self.state.total_states;
            self.state.reset(total);
            if let Some(propagator) = self.propagator.as_mut() {
                propagator.jump_to(0);
            }
            return Ok(());
        }

        let mut resolver = MessageResolver::for_strategy(output, &self.driver)?;
        resolver.carry_over(&self.resolver);
        let total = total_states(output, &resolver);

        debug!(
            "Input {}: output {} -> {} ({} states, {} resolver)",
            self.driver.id,
            self.output,
            output,
            total,
            resolver.name()
        );

        self.output = output;
        self.resolver = resolver;
        self.state.reset(total);
        if let Some(propagator) = self.propagator.as_mut() {
            propagator.truncate(total);
            propagator.jump_to(0);
        }
        Ok(())
    }

    /// Translate one hardware event
    pub fn handle(&mut self, event: &MidiEvent) -> TranslationResult {
        let Some(state) = self.state_manager.advance(self.output, &mut self.state, event) else {
            trace!("Input {}: {} produced no state", self.driver.id, event);
            return TranslationResult::default();
        };

        let to_client = self.resolver.resolve(state, event);
        let to_device = self.propagator.as_mut().and_then(|p| p.follow(state));

        trace!(
            "Input {}: {} -> state {} -> {}",
            self.driver.id,
            event,
            state,
            to_client
        );

        TranslationResult {
            to_client: Some(to_client),
            to_device,
        }
    }

    /// Parse and translate raw bytes; malformed input leaves the translator untouched
    pub fn handle_raw(&mut self, bytes: &[u8]) -> Result<TranslationResult, MalformedEventError> {
        let event = MidiEvent::from_bytes(bytes)?;
        Ok(self.handle(&event))
    }

    /// Back to the hardware defaults: native strategy, seeded bindings, default colors
    ///
    /// Under the native strategy the resolver and propagator reset in place,
    /// so steps added to a native n-step input stay with their seeded bindings.
    pub fn restore_defaults(&mut self) -> Result<(), TranslatorError> {
        let native: OutputStrategy = self.driver.response.into();
        if self.output != native {
            *self = Self::from_driver(&self.driver)?;
            debug!("Input {}: restored defaults as {}", self.driver.id, native);
            return Ok(());
        }

        self.resolver.restore_defaults();
        let total = total_states(self.output, &self.resolver);
        self.state.reset(total);
        if let Some(propagator) = self.propagator.as_mut() {
            propagator.restore_defaults();
            propagator.truncate(total);
        }
        debug!("Input {}: restored defaults", self.driver.id);
        Ok(())
    }

    /// Light message for the current state, for resynchronising the device
    pub fn sync_device(&self) -> Option<MidiEvent> {
        self.propagator.as_ref().and_then(DeviceColorPropagator::peek)
    }

    // Discrete bindings and steps

    pub fn set_binding(&mut self, state: u32, event: MidiEvent) -> Result<(), TranslatorError> {
        self.resolver.discrete_mut()?.set_binding(state, event)?;
        debug!("Input {}: state {} bound to {}", self.driver.id, state, event);
        Ok(())
    }

    /// Append a step; returns the new state count
    pub fn add_step(&mut self) -> Result<u32, TranslatorError> {
        self.check_variable_steps()?;
        let total = self.resolver.discrete_mut()?.add_step();
        self.apply_step_count(total);
        Ok(total)
    }

    /// Remove the highest step; returns the new state count
    pub fn remove_step(&mut self) -> Result<u32, TranslatorError> {
        self.check_variable_steps()?;
        let total = self.resolver.discrete_mut()?.remove_step()?;
        self.apply_step_count(total);
        Ok(total)
    }

    fn check_variable_steps(&self) -> Result<(), TranslatorError> {
        if self.output.has_variable_steps() {
            Ok(())
        } else {
            Err(TranslatorError::FixedStepCount)
        }
    }

    fn apply_step_count(&mut self, total: u32) {
        self.state.set_total(total);
        if let Some(propagator) = self.propagator.as_mut() {
            propagator.truncate(total);
        }
        debug!("Input {}: {} steps", self.driver.id, total);
    }

    // Address overrides

    pub fn set_binary_override(&mut self, state: u32, target: BinaryOverride) -> Result<(), TranslatorError> {
        self.resolver.binary_mut()?.set_override(state, target)
    }

    pub fn clear_binary_override(&mut self, state: u32) -> Result<(), TranslatorError> {
        self.resolver.binary_mut()?.clear_override(state);
        Ok(())
    }

    /// Outgoing status of a continuous or pitchbend input
    pub fn set_override_status(&mut self, status: StatusKind) -> Result<(), TranslatorError> {
        match &mut self.resolver {
            MessageResolver::Continuous(r) => r.set_status(status),
            MessageResolver::Pitchbend(r) => r.set_status(status),
            other => Err(TranslatorError::ResolverMismatch {
                expected: "continuous",
                actual: other.name(),
            }),
        }
    }

    /// Outgoing channel of a continuous or pitchbend input
    pub fn set_override_channel(&mut self, channel: u8) -> Result<(), TranslatorError> {
        match &mut self.resolver {
            MessageResolver::Continuous(r) => r.set_channel(channel),
            MessageResolver::Pitchbend(r) => r.set_channel(channel),
            other => Err(TranslatorError::ResolverMismatch {
                expected: "continuous",
                actual: other.name(),
            }),
        }
    }

    pub fn set_override_number(&mut self, number: u8) -> Result<(), TranslatorError> {
        self.resolver.continuous_mut()?.set_number(number)
    }

    pub fn set_knob_type(&mut self, knob_type: KnobType) -> Result<(), TranslatorError> {
        self.resolver.continuous_mut()?.set_knob_type(knob_type);
        Ok(())
    }

    // Backlight

    fn check_step(&self, step: u32) -> Result<(), TranslatorError> {
        if step >= self.state.total_states {
            return Err(TranslatorError::UnknownState {
                state: step,
                total: self.state.total_states,
            });
        }
        Ok(())
    }

    /// Show the available color named `name` at `step`
    pub fn set_color(&mut self, step: u32, name: &str) -> Result<(), TranslatorError> {
        self.check_step(step)?;
        let color = self
            .driver
            .find_color(name)
            .cloned()
            .ok_or_else(|| TranslatorError::UnknownColor(name.to_string()))?;
        let propagator = self.propagator.as_mut().ok_or(TranslatorError::NoBacklight)?;
        propagator.set_color(step, color);
        debug!("Input {}: step {} color {}", self.driver.id, step, name);
        Ok(())
    }

    /// Select the available effect titled `title` at `step`
    pub fn set_fx(&mut self, step: u32, title: &str) -> Result<(), TranslatorError> {
        self.check_step(step)?;
        let fx = self
            .driver
            .find_fx(title)
            .ok_or_else(|| TranslatorError::UnknownFx(title.to_string()))?;
        let propagator = self.propagator.as_mut().ok_or(TranslatorError::NoBacklight)?;
        propagator.set_fx(step, fx);
        Ok(())
    }

    /// Change the value of the effect selected at `step`
    pub fn set_fx_value(&mut self, step: u32, value: [u8; 3]) -> Result<(), TranslatorError> {
        self.check_step(step)?;
        let propagator = self.propagator.as_mut().ok_or(TranslatorError::NoBacklight)?;
        let title = propagator
            .fx_title(step)
            .map(str::to_string)
            .ok_or_else(|| TranslatorError::UnknownFx(String::new()))?;
        let fx = self
            .driver
            .find_fx(&title)
            .ok_or_else(|| TranslatorError::UnknownFx(title.clone()))?;
        if !fx.accepts(&value) {
            return Err(TranslatorError::InvalidFxValue { title, value });
        }
        propagator.set_fx_value(step, &title, value);
        Ok(())
    }

    pub fn color(&self, step: u32) -> Option<&crate::color::Color> {
        self.propagator.as_ref().and_then(|p| p.color(step))
    }

    pub fn fx_value(&self, step: u32) -> Option<[u8; 3]> {
        self.propagator.as_ref().and_then(|p| p.fx_value(step))
    }
}

/// State count implied by a strategy and its resolver
fn total_states(output: OutputStrategy, resolver: &MessageResolver) -> u32 {
    match output {
        OutputStrategy::Gate | OutputStrategy::Toggle => 2,
        OutputStrategy::Constant | OutputStrategy::Continuous => 1,
        OutputStrategy::NStep | OutputStrategy::Enumerated => resolver
            .as_discrete()
            .map(|discrete| discrete.n_steps())
            .unwrap_or(1),
    }
}

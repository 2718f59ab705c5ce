//! Message resolvers
//!
//! A resolver turns a state index and the original hardware event into the
//! event forwarded to clients. The variant is chosen by the output strategy:
//!
//! - gate → [`BinaryResolver`]
//! - toggle, constant, n-step, enumerated → [`DiscreteResolver`]
//! - continuous → [`PitchbendResolver`] for pitchbend inputs, otherwise [`ContinuousResolver`]

use serde::{Deserialize, Serialize};

use crate::driver::InputDriver;
use crate::error::TranslatorError;
use crate::midi::{MidiEvent, StatusKind};
use crate::response::OutputStrategy;

pub mod binary;
pub mod continuous;
pub mod discrete;
pub mod pitchbend;

pub use binary::{BinaryOverride, BinaryResolver};
pub use continuous::{ContinuousResolver, KnobType};
pub use discrete::DiscreteResolver;
pub use pitchbend::PitchbendResolver;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "className")]
pub enum MessageResolver {
    #[serde(rename = "DiscreteMessageResolver")]
    Discrete(DiscreteResolver),
    #[serde(rename = "BinaryMessageResolver")]
    Binary(BinaryResolver),
    #[serde(rename = "ContinuousMessageResolver")]
    Continuous(ContinuousResolver),
    #[serde(rename = "PitchbendMessageResolver")]
    Pitchbend(PitchbendResolver),
}

impl MessageResolver {
    /// Build the resolver matching `output` for this input
    pub fn for_strategy(output: OutputStrategy, driver: &InputDriver) -> Result<Self, TranslatorError> {
        let resolver = match output {
            OutputStrategy::Gate => MessageResolver::Binary(BinaryResolver::new(driver)),
            OutputStrategy::Continuous if driver.status == StatusKind::PitchBend => {
                MessageResolver::Pitchbend(PitchbendResolver::new(driver)?)
            }
            OutputStrategy::Continuous => {
                MessageResolver::Continuous(ContinuousResolver::new(driver)?)
            }
            OutputStrategy::Toggle
            | OutputStrategy::Constant
            | OutputStrategy::NStep
            | OutputStrategy::Enumerated => {
                MessageResolver::Discrete(DiscreteResolver::new(output, driver)?)
            }
        };
        Ok(resolver)
    }

    pub fn resolve(&mut self, state: u32, original: &MidiEvent) -> MidiEvent {
        match self {
            MessageResolver::Discrete(r) => r.resolve(state, original),
            MessageResolver::Binary(r) => r.resolve(state, original),
            MessageResolver::Continuous(r) => r.resolve(original),
            MessageResolver::Pitchbend(r) => r.resolve(original),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MessageResolver::Discrete(_) => "discrete",
            MessageResolver::Binary(_) => "binary",
            MessageResolver::Continuous(_) => "continuous",
            MessageResolver::Pitchbend(_) => "pitchbend",
        }
    }

    pub fn eligible_statuses(&self) -> &[StatusKind] {
        match self {
            MessageResolver::Discrete(r) => r.eligible_statuses(),
            MessageResolver::Binary(r) => r.eligible_statuses(),
            MessageResolver::Continuous(r) => r.eligible_statuses(),
            MessageResolver::Pitchbend(r) => r.eligible_statuses(),
        }
    }

    pub fn restore_defaults(&mut self) {
        match self {
            MessageResolver::Discrete(r) => r.restore_defaults(),
            MessageResolver::Binary(r) => r.restore_defaults(),
            MessageResolver::Continuous(r) => r.restore_defaults(),
            MessageResolver::Pitchbend(r) => r.restore_defaults(),
        }
    }

    /// Reject field values no editing operation could have produced
    pub fn validate(&self) -> Result<(), TranslatorError> {
        match self {
            MessageResolver::Discrete(r) => r.validate(),
            MessageResolver::Binary(r) => r.validate(),
            MessageResolver::Continuous(r) => r.validate(),
            MessageResolver::Pitchbend(r) => r.validate(),
        }
    }

    pub fn as_discrete(&self) -> Option<&DiscreteResolver> {
        match self {
            MessageResolver::Discrete(r) => Some(r),
            _ => None,
        }
    }

    pub fn discrete_mut(&mut self) -> Result<&mut DiscreteResolver, TranslatorError> {
        let actual = self.name();
        match self {
            MessageResolver::Discrete(r) => Ok(r),
            _ => Err(mismatch("discrete", actual)),
        }
    }

    pub fn binary_mut(&mut self) -> Result<&mut BinaryResolver, TranslatorError> {
        let actual = self.name();
        match self {
            MessageResolver::Binary(r) => Ok(r),
            _ => Err(mismatch("binary", actual)),
        }
    }

    pub fn continuous_mut(&mut self) -> Result<&mut ContinuousResolver, TranslatorError> {
        let actual = self.name();
        match self {
            MessageResolver::Continuous(r) => Ok(r),
            _ => Err(mismatch("continuous", actual)),
        }
    }

    pub fn pitchbend_mut(&mut self) -> Result<&mut PitchbendResolver, TranslatorError> {
        let actual = self.name();
        match self {
            MessageResolver::Pitchbend(r) => Ok(r),
            _ => Err(mismatch("pitchbend", actual)),
        }
    }

    /// Keep user-edited discrete bindings from the resolver being replaced
    pub fn carry_over(&mut self, previous: &MessageResolver) {
        if let (MessageResolver::Discrete(next), MessageResolver::Discrete(prev)) = (self, previous) {
            next.adopt_user_bindings(prev);
        }
    }
}

fn mismatch(expected: &'static str, actual: &'static str) -> TranslatorError {
    TranslatorError::ResolverMismatch { expected, actual }
}

//! Hardware responses, output strategies and their compatibility rules

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::IncompatibleResponseError;

/// Native physical behaviour of a control, fixed by its driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareResponse {
    Gate,
    Toggle,
    Continuous,
    Constant,
    #[serde(rename = "n-step")]
    NStep,
}

impl HardwareResponse {
    pub const ALL: [HardwareResponse; 5] = [
        HardwareResponse::Gate,
        HardwareResponse::Toggle,
        HardwareResponse::Continuous,
        HardwareResponse::Constant,
        HardwareResponse::NStep,
    ];

    pub fn as_str(self) -> &'static str {
        OutputStrategy::from(self).as_str()
    }
}

impl fmt::Display for HardwareResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client-facing behaviour selected by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStrategy {
    Gate,
    Toggle,
    Continuous,
    Constant,
    #[serde(rename = "n-step")]
    NStep,
    Enumerated,
}

impl OutputStrategy {
    pub const ALL: [OutputStrategy; 6] = [
        OutputStrategy::Gate,
        OutputStrategy::Toggle,
        OutputStrategy::Continuous,
        OutputStrategy::Constant,
        OutputStrategy::NStep,
        OutputStrategy::Enumerated,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OutputStrategy::Gate => "gate",
            OutputStrategy::Toggle => "toggle",
            OutputStrategy::Continuous => "continuous",
            OutputStrategy::Constant => "constant",
            OutputStrategy::NStep => "n-step",
            OutputStrategy::Enumerated => "enumerated",
        }
    }

    /// Strategies whose step count the user may edit
    ///
    /// Enumerated outputs have one state per hardware position, fixed by the driver.
    pub fn has_variable_steps(self) -> bool {
        self == OutputStrategy::NStep
    }
}

impl From<HardwareResponse> for OutputStrategy {
    fn from(hardware: HardwareResponse) -> Self {
        match hardware {
            HardwareResponse::Gate => OutputStrategy::Gate,
            HardwareResponse::Toggle => OutputStrategy::Toggle,
            HardwareResponse::Continuous => OutputStrategy::Continuous,
            HardwareResponse::Constant => OutputStrategy::Constant,
            HardwareResponse::NStep => OutputStrategy::NStep,
        }
    }
}

impl fmt::Display for OutputStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reject hardware/output pairs that have no coherent semantics
pub fn validate(
    hardware: HardwareResponse,
    output: OutputStrategy,
) -> Result<(), IncompatibleResponseError> {
    use HardwareResponse as H;
    use OutputStrategy as O;

    let illogical = matches!(
        (hardware, output),
        (H::Continuous, O::Gate)
            | (H::Continuous, O::Toggle)
            | (H::Gate, O::Continuous)
            | (H::Toggle, O::Continuous)
            | (H::Toggle, O::Gate)
            | (H::Constant, O::Continuous)
    );

    if illogical {
        Err(IncompatibleResponseError { hardware, output })
    } else {
        Ok(())
    }
}

/// Output strategies a control may be switched to
pub fn compatible_strategies(hardware: HardwareResponse) -> Vec<OutputStrategy> {
    OutputStrategy::ALL
        .into_iter()
        .filter(|output| validate(hardware, *output).is_ok())
        .collect()
}

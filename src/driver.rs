//! Driver catalog
//!
//! Describes the physical inputs of known devices. The catalog is built once
//! at startup (from a YAML file or the embedded default) and handed to
//! whatever needs driver defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tokio::fs;
use tracing::info;

use crate::color::{Color, FxDriver};
use crate::error::MalformedEventError;
use crate::midi::{MidiEvent, StatusKind};
use crate::resolver::KnobType;
use crate::response::HardwareResponse;
use crate::state_manager::StateManager;

/// Embedded default catalog
pub const DEFAULT_CATALOG: &str = include_str!("../docs/default-catalog.yaml");

/// A single physical input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDriver {
    pub id: String,
    pub status: StatusKind,
    #[serde(default)]
    pub channel: u8,
    #[serde(default)]
    pub number: u8,
    pub response: HardwareResponse,
    /// Initial value, e.g. the start position of an endless encoder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<u8>,
    #[serde(default)]
    pub knob_type: KnobType,
    /// Events sent by each position of a stepped switch
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<MidiEvent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub available_colors: Vec<Color>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub available_fx: Vec<FxDriver>,
}

impl InputDriver {
    /// Canonical press event, derived once from status, channel and number
    pub fn trigger_event(&self) -> Result<MidiEvent, MalformedEventError> {
        StateManager::trigger_event(self.status, self.channel, self.number)
    }

    pub fn has_backlight(&self) -> bool {
        !self.available_colors.is_empty()
    }

    /// Color the light shows on startup
    pub fn default_color(&self) -> Option<&Color> {
        self.available_colors.iter().find(|c| c.default)
    }

    pub fn default_fx(&self) -> Option<&FxDriver> {
        self.available_fx.iter().find(|fx| fx.is_default)
    }

    pub fn find_color(&self, name: &str) -> Option<&Color> {
        self.available_colors.iter().find(|c| c.name == name)
    }

    pub fn find_fx(&self, title: &str) -> Option<&FxDriver> {
        self.available_fx.iter().find(|fx| fx.title == title)
    }

    /// Check ranges and response/status consistency
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            anyhow::bail!("Input id cannot be empty");
        }
        if self.channel > 15 {
            anyhow::bail!("Input '{}' channel {} out of range (0-15)", self.id, self.channel);
        }
        if self.number > 127 {
            anyhow::bail!("Input '{}' number {} out of range (0-127)", self.id, self.number);
        }
        if let Some(value) = self.value {
            if value > 127 {
                anyhow::bail!("Input '{}' value {} out of range (0-127)", self.id, value);
            }
        }
        if self.status == StatusKind::SysEx {
            anyhow::bail!("Input '{}' cannot use a sysex status", self.id);
        }

        match self.response {
            HardwareResponse::Continuous => {
                if self.status.is_ambiguous() || self.status.arity() != Some(3) {
                    anyhow::bail!(
                        "Continuous input '{}' needs a concrete 3 byte status, got {}",
                        self.id,
                        self.status
                    );
                }
            }
            HardwareResponse::NStep => {
                if self.steps.is_empty() {
                    anyhow::bail!("Stepped input '{}' must declare at least one step", self.id);
                }
            }
            _ => {}
        }

        self.trigger_event()
            .with_context(|| format!("Input '{}' has no valid trigger event", self.id))?;

        for color in &self.available_colors {
            MidiEvent::from_bytes(&color.array).with_context(|| {
                format!("Color '{}' of input '{}' is not a valid message", color.name, self.id)
            })?;
        }

        Ok(())
    }
}

/// A device and its inputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDriver {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<InputDriver>,
}

impl DeviceDriver {
    pub fn input(&self, id: &str) -> Option<&InputDriver> {
        self.inputs.iter().find(|input| input.id == id)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            anyhow::bail!("Device name cannot be empty");
        }

        let mut ids = HashSet::new();
        for input in &self.inputs {
            input
                .validate()
                .with_context(|| format!("Invalid input in device '{}'", self.name))?;
            if !ids.insert(input.id.as_str()) {
                anyhow::bail!("Duplicate input id '{}' in device '{}'", input.id, self.name);
            }
        }
        Ok(())
    }
}

/// All known devices
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverCatalog {
    #[serde(default)]
    pub devices: Vec<DeviceDriver>,
}

impl DriverCatalog {
    /// Parse and validate a catalog from YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let catalog: DriverCatalog =
            serde_yaml::from_str(yaml).context("Failed to parse driver catalog YAML")?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load a catalog from a YAML file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read driver catalog: {}", path.display()))?;

        let catalog = Self::from_yaml_str(&contents)
            .with_context(|| format!("Invalid driver catalog: {}", path.display()))?;

        info!(
            "Loaded driver catalog {} ({} devices)",
            path.display(),
            catalog.devices.len()
        );
        Ok(catalog)
    }

    /// The catalog shipped with the binary
    pub fn embedded() -> Result<Self> {
        Self::from_yaml_str(DEFAULT_CATALOG).context("Embedded driver catalog is invalid")
    }

    pub fn device(&self, name: &str) -> Option<&DeviceDriver> {
        self.devices.iter().find(|device| device.name == name)
    }

    pub fn device_names(&self) -> impl Iterator<Item = &str> {
        self.devices.iter().map(|device| device.name.as_str())
    }

    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for device in &self.devices {
            device.validate()?;
            if !names.insert(device.name.as_str()) {
                anyhow::bail!("Duplicate device name '{}'", device.name);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Bare input driver without lights
    pub fn driver(
        status: StatusKind,
        channel: u8,
        number: u8,
        response: HardwareResponse,
    ) -> InputDriver {
        InputDriver {
            id: format!("input-{}", number),
            status,
            channel,
            number,
            response,
            value: None,
            knob_type: KnobType::Absolute,
            steps: Vec::new(),
            available_colors: Vec::new(),
            available_fx: Vec::new(),
        }
    }
}

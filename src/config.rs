//! Configuration management for MIDI Relay
//!
//! Handles loading, parsing and saving of the YAML configuration file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AppConfig {
    pub midi: MidiConfig,
    /// Driver catalog file; the embedded catalog is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<PathBuf>,
    /// Project snapshot loaded at start and written at shutdown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<PathBuf>,
}

/// MIDI port configuration
///
/// Port names are matched case-insensitively by substring.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MidiConfig {
    /// Hardware input port
    pub input_port: String,
    /// Hardware output port, receives backlight messages
    pub device_output_port: String,
    /// Port software clients listen on
    pub client_output_port: String,
    /// Device name in the driver catalog
    pub device: String,
    /// Minimum spacing between messages sent to the device (0 = no throttle)
    #[serde(default)]
    pub min_device_interval_ms: u64,
}

impl AppConfig {
    /// Load configuration from YAML file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.midi.input_port.is_empty() {
            anyhow::bail!("MIDI input_port cannot be empty");
        }
        if self.midi.device_output_port.is_empty() {
            anyhow::bail!("MIDI device_output_port cannot be empty");
        }
        if self.midi.client_output_port.is_empty() {
            anyhow::bail!("MIDI client_output_port cannot be empty");
        }
        if self.midi.device.is_empty() {
            anyhow::bail!("MIDI device cannot be empty");
        }
        if self.midi.min_device_interval_ms > 1000 {
            anyhow::bail!(
                "min_device_interval_ms {} is too large (max 1000)",
                self.midi.min_device_interval_ms
            );
        }
        Ok(())
    }
}

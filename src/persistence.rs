//! Project snapshots
//!
//! Saves every translator of a device to a JSON file so edits and current
//! states survive restarts.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

use crate::driver::DriverCatalog;
use crate::router::Router;
use crate::translator::InputTranslatorSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    /// Version of the snapshot format
    pub version: String,
    /// Creation time (milliseconds since epoch)
    pub timestamp: i64,
    /// Catalog name of the device
    pub device: String,
    /// Translator state per input id
    pub inputs: BTreeMap<String, InputTranslatorSnapshot>,
}

impl ProjectSnapshot {
    /// Current snapshot format version
    pub const VERSION: &'static str = "1.0.0";

    pub fn from_router(router: &Router) -> Self {
        Self {
            version: Self::VERSION.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            device: router.device().to_string(),
            inputs: router.snapshot(),
        }
    }

    /// Rebuild a router for the snapshot's device
    pub fn into_router(self, catalog: &DriverCatalog) -> Result<Router> {
        let device = catalog
            .device(&self.device)
            .with_context(|| format!("Device '{}' is not in the driver catalog", self.device))?;
        Router::restore(device, &self.inputs)
    }

    /// Save snapshot to JSON file
    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize project snapshot")?;

        fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write project snapshot: {}", path.display()))?;

        info!("Project saved to {}", path.display());
        Ok(())
    }

    /// Load snapshot from JSON file
    pub async fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read project snapshot: {}", path.display()))?;

        let snapshot: ProjectSnapshot =
            serde_json::from_str(&json).context("Failed to parse project snapshot JSON")?;

        if snapshot.version != Self::VERSION {
            anyhow::bail!(
                "Unsupported project snapshot version {} (expected {})",
                snapshot.version,
                Self::VERSION
            );
        }

        debug!(
            "Project snapshot loaded (device: {}, timestamp: {}, {} inputs)",
            snapshot.device,
            snapshot.timestamp,
            snapshot.inputs.len()
        );

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::OutputStrategy;
    use tempfile::NamedTempFile;

    fn mixer() -> (DriverCatalog, Router) {
        let catalog = DriverCatalog::embedded().unwrap();
        let router = Router::new(catalog.device("Desk Mixer").unwrap()).unwrap();
        (catalog, router)
    }

    #[tokio::test]
    async fn test_snapshot_save_load() {
        let (catalog, mut router) = mixer();
        {
            let mute = router.translator_mut("mute-1").unwrap();
            mute.set_output_strategy(OutputStrategy::NStep).unwrap();
            mute.add_step().unwrap();
            mute.set_color(1, "Amber").unwrap();
        }
        router.route(&[0x90, 16, 127]);
        router.route(&[0xB0, 16, 70]);

        let temp_file = NamedTempFile::new().unwrap();
        let snapshot = ProjectSnapshot::from_router(&router);
        snapshot.save_to_file(temp_file.path()).await.unwrap();

        let loaded = ProjectSnapshot::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(loaded, snapshot);

        let mut restored = loaded.into_router(&catalog).unwrap();
        let mute = restored.translator("mute-1").unwrap();
        assert_eq!(mute.output_strategy(), OutputStrategy::NStep);
        assert_eq!(mute.state().total_states, 2);
        assert_eq!(restored.sync_device(), router.sync_device());

        // Same subsequent input, same output
        for bytes in [[0x90, 16, 127], [0xB0, 16, 60], [0xE0, 3, 64]] {
            assert_eq!(restored.route(&bytes), router.route(&bytes));
        }
    }

    #[tokio::test]
    async fn test_snapshot_version() {
        let (_, router) = mixer();
        let snapshot = ProjectSnapshot::from_router(&router);
        assert_eq!(snapshot.version, ProjectSnapshot::VERSION);
        assert_eq!(snapshot.device, "Desk Mixer");
        assert_eq!(snapshot.inputs.len(), 5);
    }

    #[tokio::test]
    async fn test_rejects_unknown_version() {
        let (_, router) = mixer();
        let mut snapshot = ProjectSnapshot::from_router(&router);
        snapshot.version = "0.1.0".to_string();

        let temp_file = NamedTempFile::new().unwrap();
        snapshot.save_to_file(temp_file.path()).await.unwrap();
        assert!(ProjectSnapshot::load_from_file(temp_file.path()).await.is_err());
    }

    #[test]
    fn test_unknown_device() {
        let (catalog, router) = mixer();
        let mut snapshot = ProjectSnapshot::from_router(&router);
        snapshot.device = "Theremin".to_string();
        assert!(snapshot.into_router(&catalog).is_err());
    }

    #[test]
    fn test_corrupt_input_snapshot_rejected() {
        let (catalog, router) = mixer();
        let mut snapshot = ProjectSnapshot::from_router(&router);
        let mute = snapshot.inputs.get_mut("mute-1").unwrap();
        mute.output_strategy = OutputStrategy::Continuous;
        assert!(snapshot.into_router(&catalog).is_err());
    }
}

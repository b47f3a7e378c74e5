//! Node Configuration

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator_client::ValidatorClientConfig;

/// Node configuration. Loaded from an optional JSON file, then overridden by
/// CLI flags and environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Validator client settings
    #[serde(flatten)]
    pub validator: ValidatorClientConfig,
    /// Slot length in milliseconds
    pub slot_duration_ms: u64,
    /// Slots per epoch
    pub epoch_duration: u64,
    /// Maximum transactions per devnet block
    pub max_txs_per_block: usize,
    /// Synthetic transactions injected into the pool each slot
    pub dev_txs_per_slot: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            validator: ValidatorClientConfig::default(),
            slot_duration_ms: 2_000,
            epoch_duration: 32,
            max_txs_per_block: 64,
            dev_txs_per_slot: 4,
        }
    }
}

impl NodeConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Defaults, or the file contents if a path is given
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Reject values the slot clock cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.slot_duration_ms == 0 {
            anyhow::bail!("slot_duration_ms must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let config = NodeConfig::load(None).unwrap();
        assert_eq!(config.slot_duration_ms, 2_000);
        assert!(config.validator.validator_reexecute);
        assert_eq!(config.validator.attestation_polling_interval_ms, 200);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"validator_private_key": "{}", "validator_reexecute": false, "epoch_duration": 8}}"#,
            "11".repeat(32)
        )
        .unwrap();

        let config = NodeConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.epoch_duration, 8);
        assert_eq!(config.slot_duration_ms, 2_000);
        assert!(!config.validator.validator_reexecute);
        assert_eq!(config.validator.parse_private_key().unwrap(), [0x11; 32]);
    }

    #[test]
    fn test_bad_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(NodeConfig::load(Some(file.path())).is_err());

        let dir = tempfile::tempdir().unwrap();
        assert!(NodeConfig::load(Some(&dir.path().join("missing.json"))).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_slot_duration() {
        assert!(NodeConfig::default().validate().is_ok());

        let config = NodeConfig {
            slot_duration_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}

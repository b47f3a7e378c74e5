//! Validator client configuration

use crate::error::ValidatorError;
use l2_types::decode_hex_array;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// How often the epoch committee is re-read for membership logging
pub const EPOCH_COMMITTEE_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Validator client configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorClientConfig {
    /// Hex-encoded 32-byte ed25519 secret key. Required to start.
    pub validator_private_key: Option<String>,
    /// Re-execute proposals before attesting
    pub validator_reexecute: bool,
    /// Interval between attestation pool polls while collecting
    pub attestation_polling_interval_ms: u64,
    /// Run the node without validator duties
    pub disable_validator: bool,
}

impl Default for ValidatorClientConfig {
    fn default() -> Self {
        Self {
            validator_private_key: None,
            validator_reexecute: true,
            attestation_polling_interval_ms: 200,
            disable_validator: false,
        }
    }
}

impl fmt::Debug for ValidatorClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorClientConfig")
            .field(
                "validator_private_key",
                &self.validator_private_key.as_ref().map(|_| "<redacted>"),
            )
            .field("validator_reexecute", &self.validator_reexecute)
            .field("attestation_polling_interval_ms", &self.attestation_polling_interval_ms)
            .field("disable_validator", &self.disable_validator)
            .finish()
    }
}

impl ValidatorClientConfig {
    pub fn attestation_polling_interval(&self) -> Duration {
        Duration::from_millis(self.attestation_polling_interval_ms)
    }

    /// Decode the configured secret key. Missing or malformed keys are fatal.
    pub fn parse_private_key(&self) -> Result<[u8; 32], ValidatorError> {
        let key = self
            .validator_private_key
            .as_deref()
            .ok_or(ValidatorError::InvalidValidatorPrivateKey)?;
        decode_hex_array::<32>(key.trim()).map_err(|_| ValidatorError::InvalidValidatorPrivateKey)
    }
}

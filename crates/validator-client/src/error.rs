//! Validator errors

use l2_types::{Hash32, TxHash};
use thiserror::Error;

/// Errors raised by the validator client.
///
/// Everything except `InvalidValidatorPrivateKey` and `AttestationTimeout` is
/// contained inside the attestation path and only ends up as an abstention.
#[derive(Error, Debug)]
pub enum ValidatorError {
    #[error("invalid or missing validator private key")]
    InvalidValidatorPrivateKey,

    #[error("transactions not available: {}", format_hashes(.0))]
    TransactionsNotAvailable(Vec<TxHash>),

    #[error("{0} transactions failed during re-execution")]
    ReExFailedTxs(usize),

    #[error("re-execution included {actual} of {expected} transactions")]
    ReExTimeout { expected: usize, actual: usize },

    #[error("re-execution state mismatch: proposal archive {expected}, re-executed archive {actual}")]
    ReExStateMismatch { expected: Hash32, actual: Hash32 },

    #[error("re-execution requested but no block builder is registered")]
    BlockBuilderNotProvided,

    #[error("block builder failed: {0}")]
    BlockBuilder(#[source] anyhow::Error),

    #[error("timed out waiting for {required} attestations for slot {slot}")]
    AttestationTimeout { required: usize, slot: u64 },

    #[error("collaborator error: {0}")]
    Collaborator(#[source] anyhow::Error),
}

impl ValidatorError {
    /// Stable label used for the failed-attestation counters
    pub fn kind(&self) -> &'static str {
        match self {
            ValidatorError::InvalidValidatorPrivateKey => "invalid_validator_private_key",
            ValidatorError::TransactionsNotAvailable(_) => "transactions_not_available",
            ValidatorError::ReExFailedTxs(_) => "reex_failed_txs",
            ValidatorError::ReExTimeout { .. } => "reex_timeout",
            ValidatorError::ReExStateMismatch { .. } => "reex_state_mismatch",
            ValidatorError::BlockBuilderNotProvided => "block_builder_not_provided",
            ValidatorError::BlockBuilder(_) => "block_builder_failed",
            ValidatorError::AttestationTimeout { .. } => "attestation_timeout",
            ValidatorError::Collaborator(_) => "collaborator_error",
        }
    }

    /// True for the three re-execution outcomes that mean the proposal itself is bad
    pub fn is_reexecution_failure(&self) -> bool {
        matches!(
            self,
            ValidatorError::ReExFailedTxs(_)
                | ValidatorError::ReExTimeout { .. }
                | ValidatorError::ReExStateMismatch { .. }
        )
    }
}

fn format_hashes(hashes: &[TxHash]) -> String {
    hashes
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

//! Validator Client - committee duties of a rollup validator
//!
//! Architecture:
//! - Peers gossip block proposals; the client decides whether to attest
//! - Attesting requires a known parent, available txs and (optionally) a
//!   matching re-execution
//! - When this node proposes, it signs one proposal per slot and polls the
//!   attestation pool until the committee threshold is met
//! - A background loop logs committee membership changes per epoch

pub mod block_builder;
pub mod config;
pub mod epoch_cache;
pub mod epoch_watcher;
pub mod error;
pub mod key_store;
pub mod local;
pub mod metrics;
pub mod p2p;
pub mod proposal_validator;
pub mod reexecution;
pub mod time;
pub mod tx_availability;
pub mod validation_service;
pub mod validator;

#[cfg(test)]
mod tests;

pub use block_builder::{BlockBuilder, BuildBlockOptions, BuiltBlock};
pub use config::{ValidatorClientConfig, EPOCH_COMMITTEE_REFRESH_INTERVAL};
pub use epoch_cache::{EpochCache, EpochCommitteeInfo, EpochSelector, ProposerSlots};
pub use epoch_watcher::{CommitteeTransition, EpochCommitteeWatcher};
pub use error::ValidatorError;
pub use key_store::{LocalKeyStore, ValidatorKeyStore};
pub use local::{DevBlockBuilder, LocalP2p, StaticEpochCache};
pub use metrics::{ValidatorMetrics, ValidatorStats};
pub use p2p::{BlockProposalHandler, P2pClient};
pub use proposal_validator::{BlockProposalValidator, InvalidProposalReason};
pub use reexecution::{ReExecutionEngine, ReExecutionResult};
pub use time::{DateProvider, SystemDateProvider};
pub use validation_service::ValidationService;
pub use validator::{ValidatorClient, ValidatorClientBuilder};

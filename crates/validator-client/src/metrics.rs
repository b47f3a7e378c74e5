//! Validator counters
//!
//! Plain counters behind a lock, read out as a [`ValidatorStats`] snapshot.

use l2_types::{BlockProposal, Hash32};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Proposal whose re-execution failed most recently
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedReExecution {
    pub slot: u64,
    pub block_number: u64,
    pub archive: Hash32,
}

/// Snapshot of validator activity
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidatorStats {
    /// Attestations produced for peer proposals
    pub attestations: u64,
    /// Abstentions and failures, by label
    pub failed_attestations: BTreeMap<String, u64>,
    pub failed_reexecutions: u64,
    pub last_failed_reexecution: Option<FailedReExecution>,
    pub reexecutions: u64,
    pub reexecution_total_ms: u64,
    pub last_reexecution_ms: u64,
    pub proposals_created: u64,
    pub duplicate_proposals_skipped: u64,
}

/// Shared handle to the validator counters
#[derive(Debug, Clone, Default)]
pub struct ValidatorMetrics {
    stats: Arc<RwLock<ValidatorStats>>,
}

impl ValidatorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_attestations(&self) {
        self.stats.write().attestations += 1;
    }

    pub fn inc_failed_attestations(&self, reason: &str) {
        *self
            .stats
            .write()
            .failed_attestations
            .entry(reason.to_string())
            .or_insert(0) += 1;
    }

    pub fn record_failed_reexecution(&self, proposal: &BlockProposal) {
        let mut stats = self.stats.write();
        stats.failed_reexecutions += 1;
        stats.last_failed_reexecution = Some(FailedReExecution {
            slot: proposal.slot_number(),
            block_number: proposal.block_number,
            archive: proposal.archive(),
        });
    }

    pub fn record_reexecution_time(&self, elapsed: Duration) {
        let ms = elapsed.as_millis() as u64;
        let mut stats = self.stats.write();
        stats.reexecutions += 1;
        stats.reexecution_total_ms += ms;
        stats.last_reexecution_ms = ms;
    }

    pub fn inc_proposals_created(&self) {
        self.stats.write().proposals_created += 1;
    }

    pub fn inc_duplicate_proposals(&self) {
        self.stats.write().duplicate_proposals_skipped += 1;
    }

    /// Count for one failure label
    pub fn failed_attestations(&self, reason: &str) -> u64 {
        self.stats
            .read()
            .failed_attestations
            .get(reason)
            .copied()
            .unwrap_or(0)
    }

    pub fn stats(&self) -> ValidatorStats {
        self.stats.read().clone()
    }
}

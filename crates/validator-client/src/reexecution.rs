//! Re-execution engine
//!
//! Replays a proposal's transactions through the injected block builder in
//! validate-only mode and compares the outcome with what the proposal claims.
//! There is no internal timeout; the attestation deadline bounds the caller.

use crate::block_builder::{BlockBuilder, BuildBlockOptions};
use crate::error::ValidatorError;
use crate::metrics::ValidatorMetrics;
use crate::p2p::P2pClient;
use futures::future::join_all;
use l2_types::{BlockProposal, Hash32, L2Block, Tx, TxHash};
use std::sync::Arc;
use std::time::Instant;

/// Outcome of a successful re-execution. Never persisted.
#[derive(Debug, Clone)]
pub struct ReExecutionResult {
    pub block: L2Block,
    pub num_failed_txs: usize,
    pub archive: Hash32,
}

/// Drives a [`BlockBuilder`] to re-execute proposals
pub struct ReExecutionEngine {
    p2p: Arc<dyn P2pClient>,
    metrics: ValidatorMetrics,
}

impl ReExecutionEngine {
    pub fn new(p2p: Arc<dyn P2pClient>, metrics: ValidatorMetrics) -> Self {
        Self { p2p, metrics }
    }

    /// Load the proposal's transactions from the pool, in proposal order
    async fn load_txs(&self, tx_hashes: &[TxHash]) -> Result<Vec<Tx>, ValidatorError> {
        let lookups = join_all(tx_hashes.iter().map(|hash| self.p2p.get_tx_by_hash(hash))).await;

        let mut txs = Vec::with_capacity(tx_hashes.len());
        let mut missing = Vec::new();
        for (hash, lookup) in tx_hashes.iter().zip(lookups) {
            match lookup.map_err(ValidatorError::Collaborator)? {
                Some(tx) => txs.push(tx),
                None => missing.push(*hash),
            }
        }

        if !missing.is_empty() {
            return Err(ValidatorError::TransactionsNotAvailable(missing));
        }
        Ok(txs)
    }

    /// Re-execute `proposal` and check it.
    ///
    /// Checks run in order: reverted transactions, included transaction count,
    /// archive root. A proposal with reverted transactions is rejected even if
    /// its archive would match.
    pub async fn re_execute(
        &self,
        builder: &dyn BlockBuilder,
        proposal: &BlockProposal,
    ) -> Result<ReExecutionResult, ValidatorError> {
        let tx_hashes = proposal.tx_hashes();
        let txs = self.load_txs(tx_hashes).await?;

        let started = Instant::now();
        let built = builder
            .build_block(
                proposal.block_number,
                &proposal.payload.header,
                txs,
                BuildBlockOptions {
                    validate_only: true,
                },
            )
            .await;
        self.metrics.record_reexecution_time(started.elapsed());
        let built = built.map_err(ValidatorError::BlockBuilder)?;

        tracing::debug!(
            "Transaction re-execution complete for slot {} ({} txs, {} failed)",
            proposal.slot_number(),
            built.num_txs,
            built.num_failed_txs
        );

        if built.num_failed_txs > 0 {
            self.metrics.record_failed_reexecution(proposal);
            return Err(ValidatorError::ReExFailedTxs(built.num_failed_txs));
        }

        if built.block.tx_count() != tx_hashes.len() {
            self.metrics.record_failed_reexecution(proposal);
            return Err(ValidatorError::ReExTimeout {
                expected: tx_hashes.len(),
                actual: built.block.tx_count(),
            });
        }

        if built.block.archive != proposal.archive() {
            self.metrics.record_failed_reexecution(proposal);
            return Err(ValidatorError::ReExStateMismatch {
                expected: proposal.archive(),
                actual: built.block.archive,
            });
        }

        Ok(ReExecutionResult {
            archive: built.block.archive,
            num_failed_txs: built.num_failed_txs,
            block: built.block,
        })
    }
}

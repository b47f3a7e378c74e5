//! Block builder contract
//!
//! The sequencer's block building pipeline, injected so that re-execution can
//! reuse it without the validator depending on sequencer internals.

use async_trait::async_trait;
use l2_types::{L2Block, ProposedBlockHeader, Tx};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildBlockOptions {
    /// Execute without persisting anything
    pub validate_only: bool,
}

/// Output of one build
#[derive(Debug, Clone)]
pub struct BuiltBlock {
    pub block: L2Block,
    /// Transactions the builder processed
    pub num_txs: usize,
    /// Transactions that reverted
    pub num_failed_txs: usize,
    pub processor_duration: Duration,
}

#[async_trait]
pub trait BlockBuilder: Send + Sync {
    async fn build_block(
        &self,
        block_number: u64,
        header: &ProposedBlockHeader,
        txs: Vec<Tx>,
        opts: BuildBlockOptions,
    ) -> anyhow::Result<BuiltBlock>;
}

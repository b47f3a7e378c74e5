//! Block source contract

use async_trait::async_trait;
use l2_types::L2Block;
use serde::{Deserialize, Serialize};

/// Point-in-time view of the chain. Only the chain-tracking collaborator changes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainPosition {
    pub l1_block_number: u64,
    pub l2_block_number: u64,
    pub l2_proven_block_number: u64,
}

/// Source of canonical L2 blocks.
///
/// Every call must reflect post-reorg canonical state at the time of the call.
#[async_trait]
pub trait L2BlockSource: Send + Sync {
    /// Block by number, or `None` if it does not exist (or was pruned)
    async fn get_block(&self, number: u64) -> anyhow::Result<Option<L2Block>>;

    /// Latest L2 block number
    async fn get_block_number(&self) -> anyhow::Result<u64>;

    /// Latest proven L2 block number
    async fn get_proven_block_number(&self) -> anyhow::Result<u64>;

    /// All heights read from a single snapshot, never a mix of pre- and post-reorg values
    async fn get_chain_position(&self) -> anyhow::Result<ChainPosition>;
}

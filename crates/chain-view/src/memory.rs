//! In-memory block source
//!
//! Stands in for the archiver in tests and in the devnet binary. All state sits
//! behind one lock so a reorg (prune, restore, proof change) is observed by
//! readers either entirely or not at all.

use crate::source::{ChainPosition, L2BlockSource};
use async_trait::async_trait;
use l2_types::L2Block;
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct Inner {
    blocks: BTreeMap<u64, L2Block>,
    proven_block_number: u64,
    l1_block_number: u64,
}

impl Inner {
    fn tip(&self) -> u64 {
        self.blocks.keys().next_back().copied().unwrap_or(0)
    }

    /// Detach every block above `number`, ascending
    fn split_above(&mut self, number: u64) -> Vec<L2Block> {
        let Some(first_removed) = number.checked_add(1) else {
            return Vec::new();
        };
        self.blocks.split_off(&first_removed).into_values().collect()
    }
}

/// Block source backed by a map, with reorg controls
#[derive(Debug, Default)]
pub struct MemoryBlockSource {
    inner: RwLock<Inner>,
}

impl MemoryBlockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append or replace a block
    pub fn add_block(&self, block: L2Block) {
        let mut inner = self.inner.write();
        tracing::trace!("Adding L2 block {} with archive {}", block.number, block.archive);
        inner.blocks.insert(block.number, block);
    }

    /// Remove every block above `number`. Proven height is clamped to the new tip.
    /// Returns the removed blocks in ascending order so they can be restored later.
    pub fn prune_to(&self, number: u64) -> Vec<L2Block> {
        let mut inner = self.inner.write();
        let removed = inner.split_above(number);
        let tip = inner.tip();
        if inner.proven_block_number > tip {
            inner.proven_block_number = tip;
        }
        if !removed.is_empty() {
            tracing::debug!("Pruned {} L2 blocks, tip now {}", removed.len(), tip);
        }
        removed
    }

    /// Put previously pruned blocks back
    pub fn restore(&self, blocks: Vec<L2Block>) {
        let mut inner = self.inner.write();
        for block in blocks {
            inner.blocks.insert(block.number, block);
        }
        tracing::debug!("Restored L2 blocks, tip now {}", inner.tip());
    }

    /// Set the proven height. Going down models a proof removed by a reorg.
    pub fn set_proven(&self, number: u64) {
        self.inner.write().proven_block_number = number;
    }

    pub fn set_l1_block_number(&self, number: u64) {
        self.inner.write().l1_block_number = number;
    }

    /// Apply a reorg atomically: new L1 height, prune to `l2_tip`, set proven height
    pub fn apply_reorg(&self, l1_block_number: u64, l2_tip: u64, proven: u64) -> Vec<L2Block> {
        let mut inner = self.inner.write();
        let removed = inner.split_above(l2_tip);
        inner.l1_block_number = l1_block_number;
        inner.proven_block_number = proven.min(inner.tip());
        removed
    }

    /// Most recent block, if any
    pub fn latest_block(&self) -> Option<L2Block> {
        self.inner.read().blocks.values().next_back().cloned()
    }
}

#[async_trait]
impl L2BlockSource for MemoryBlockSource {
    async fn get_block(&self, number: u64) -> anyhow::Result<Option<L2Block>> {
        Ok(self.inner.read().blocks.get(&number).cloned())
    }

    async fn get_block_number(&self) -> anyhow::Result<u64> {
        Ok(self.inner.read().tip())
    }

    async fn get_proven_block_number(&self) -> anyhow::Result<u64> {
        Ok(self.inner.read().proven_block_number)
    }

    async fn get_chain_position(&self) -> anyhow::Result<ChainPosition> {
        let inner = self.inner.read();
        Ok(ChainPosition {
            l1_block_number: inner.l1_block_number,
            l2_block_number: inner.tip(),
            l2_proven_block_number: inner.proven_block_number,
        })
    }
}

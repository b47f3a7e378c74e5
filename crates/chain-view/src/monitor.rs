//! Chain monitor - polls a block source and reports what moved
//!
//! The monitor keeps only the previous observation, for diffing. Callers that
//! need a height ask the source directly; `run` always returns fresh values.

use crate::source::{ChainPosition, L2BlockSource};
use serde::Serialize;
use std::sync::Arc;

/// A change between two consecutive observations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChainEvent {
    /// L2 tip moved forward
    Advanced { from: u64, to: u64 },
    /// L2 blocks were removed, typically by an L1 reorg or an unproven-epoch prune
    L2Pruned { from: u64, to: u64 },
    /// Proven height went down: a proof was reorged out of L1
    ProofRemoved { from: u64, to: u64 },
    /// Proven height went up, including a proof restored by a reorg
    ProofAdded { from: u64, to: u64 },
    /// L1 head went backwards
    L1Reorg { from: u64, to: u64 },
}

/// Result of one poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainUpdate {
    pub position: ChainPosition,
    pub events: Vec<ChainEvent>,
}

/// Polls an [`L2BlockSource`] and classifies height changes
pub struct ChainMonitor {
    source: Arc<dyn L2BlockSource>,
    last: Option<ChainPosition>,
}

impl ChainMonitor {
    pub fn new(source: Arc<dyn L2BlockSource>) -> Self {
        Self { source, last: None }
    }

    /// Last observed position. For logging and diffing only, never a substitute for asking the source.
    pub fn last_observed(&self) -> Option<ChainPosition> {
        self.last
    }

    /// Poll the source once
    pub async fn run(&mut self) -> anyhow::Result<ChainUpdate> {
        let position = self.source.get_chain_position().await?;
        let events = match self.last {
            Some(prev) => classify(&prev, &position),
            None => {
                tracing::debug!(
                    "Chain monitor started at L1 {} / L2 {} / proven {}",
                    position.l1_block_number,
                    position.l2_block_number,
                    position.l2_proven_block_number
                );
                Vec::new()
            }
        };

        for event in &events {
            match event {
                ChainEvent::Advanced { from, to } => {
                    tracing::debug!("L2 chain advanced from {} to {}", from, to);
                }
                ChainEvent::ProofAdded { from, to } => {
                    tracing::info!("Proven L2 block moved from {} to {}", from, to);
                }
                ChainEvent::L2Pruned { from, to } => {
                    tracing::warn!("L2 chain pruned from {} to {}", from, to);
                }
                ChainEvent::ProofRemoved { from, to } => {
                    tracing::warn!("Proof removed, proven L2 block went from {} to {}", from, to);
                }
                ChainEvent::L1Reorg { from, to } => {
                    tracing::warn!("L1 reorg detected, head went from {} to {}", from, to);
                }
            }
        }

        self.last = Some(position);
        Ok(ChainUpdate { position, events })
    }
}

fn classify(prev: &ChainPosition, next: &ChainPosition) -> Vec<ChainEvent> {
    let mut events = Vec::new();

    if next.l1_block_number < prev.l1_block_number {
        events.push(ChainEvent::L1Reorg {
            from: prev.l1_block_number,
            to: next.l1_block_number,
        });
    }

    if next.l2_block_number < prev.l2_block_number {
        events.push(ChainEvent::L2Pruned {
            from: prev.l2_block_number,
            to: next.l2_block_number,
        });
    } else if next.l2_block_number > prev.l2_block_number {
        events.push(ChainEvent::Advanced {
            from: prev.l2_block_number,
            to: next.l2_block_number,
        });
    }

    if next.l2_proven_block_number < prev.l2_proven_block_number {
        events.push(ChainEvent::ProofRemoved {
            from: prev.l2_proven_block_number,
            to: next.l2_proven_block_number,
        });
    } else if next.l2_proven_block_number > prev.l2_proven_block_number {
        events.push(ChainEvent::ProofAdded {
            from: prev.l2_proven_block_number,
            to: next.l2_proven_block_number,
        });
    }

    events
}

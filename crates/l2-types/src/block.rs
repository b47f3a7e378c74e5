//! L2 blocks, headers and transactions

use crate::primitives::{Address, Hash32, TxHash};
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Roots of the state trees after a block is applied
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq,
    BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct StateReference {
    pub l1_to_l2_message_tree: Hash32,
    pub note_hash_tree: Hash32,
    pub nullifier_tree: Hash32,
    pub public_data_tree: Hash32,
}

/// Header of a proposed block, as signed by the proposer
#[derive(
    Debug, Clone, PartialEq, Eq,
    BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct ProposedBlockHeader {
    /// Archive root of the parent block
    pub last_archive_root: Hash32,
    /// State after applying this block
    pub state_reference: StateReference,
    /// Slot this block was proposed in
    pub slot_number: u64,
    /// Unix seconds
    pub timestamp: u64,
    /// Fee recipient
    pub coinbase: Address,
}

/// A transaction as held by the pool. The payload is opaque to the validator.
#[derive(
    Debug, Clone, PartialEq, Eq,
    BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct Tx {
    hash: TxHash,
    pub payload: Vec<u8>,
}

impl Tx {
    /// Create a transaction, hashing its payload
    pub fn new(payload: Vec<u8>) -> Self {
        let hash = TxHash(Hash32::hash(&payload));
        Self { hash, payload }
    }

    pub fn tx_hash(&self) -> TxHash {
        self.hash
    }
}

/// Effect of one transaction included in a block body
#[derive(
    Debug, Clone, PartialEq, Eq,
    BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct TxEffect {
    pub tx_hash: TxHash,
    pub reverted: bool,
}

/// A materialized L2 block
#[derive(
    Debug, Clone, PartialEq, Eq,
    BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct L2Block {
    pub number: u64,
    pub header: ProposedBlockHeader,
    /// Archive root after this block
    pub archive: Hash32,
    pub tx_effects: Vec<TxEffect>,
}

impl L2Block {
    pub fn slot_number(&self) -> u64 {
        self.header.slot_number
    }

    pub fn tx_count(&self) -> usize {
        self.tx_effects.len()
    }
}

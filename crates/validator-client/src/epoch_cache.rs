//! Epoch committee contract
//!
//! Committee membership can change every epoch. Callers on the attestation path
//! query this source fresh on every decision.

use async_trait::async_trait;
use l2_types::Address;

/// Which epoch a committee query refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochSelector {
    /// Epoch of the current slot
    Now,
    /// Epoch following the current one
    Next,
    /// Epoch containing the given slot
    Slot(u64),
}

/// Committee for one epoch. Order of `committee` carries no meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochCommitteeInfo {
    pub committee: Vec<Address>,
    pub epoch: u64,
}

impl EpochCommitteeInfo {
    pub fn contains(&self, address: &Address) -> bool {
        self.committee.iter().any(|a| a == address)
    }
}

/// Proposers for the current slot and the one after it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProposerSlots {
    pub current_slot: u64,
    pub next_slot: u64,
    pub current_proposer: Address,
    pub next_proposer: Address,
}

/// Source of committee and proposer information
#[async_trait]
pub trait EpochCache: Send + Sync {
    async fn get_committee(&self, selector: EpochSelector) -> anyhow::Result<EpochCommitteeInfo>;

    async fn is_in_committee(&self, address: &Address) -> anyhow::Result<bool>;

    async fn proposer_in_current_or_next_slot(&self) -> anyhow::Result<ProposerSlots>;
}

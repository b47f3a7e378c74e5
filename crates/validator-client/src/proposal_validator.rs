//! Proposal validator - checks proposer eligibility for a slot

use crate::epoch_cache::EpochCache;
use l2_types::{Address, BlockProposal};
use std::sync::Arc;
use thiserror::Error;

/// Why a proposal was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidProposalReason {
    #[error("proposal signature does not verify")]
    InvalidSignature,

    #[error("proposal slot {slot} is neither the current slot {current} nor the next slot {next}")]
    SlotNotCurrentOrNext { slot: u64, current: u64, next: u64 },

    #[error("proposal for slot {slot} signed by {sender}, who is not the current or next proposer")]
    UnexpectedProposer { sender: Address, slot: u64 },

    #[error("committee unavailable: {0}")]
    CommitteeUnavailable(String),
}

/// Accepts proposals from the current proposer, or from the next one to tolerate
/// propagation across a slot boundary. Has no side effects.
pub struct BlockProposalValidator {
    epoch_cache: Arc<dyn EpochCache>,
}

impl BlockProposalValidator {
    pub fn new(epoch_cache: Arc<dyn EpochCache>) -> Self {
        Self { epoch_cache }
    }

    pub async fn validate(&self, proposal: &BlockProposal) -> Option<InvalidProposalReason> {
        let Some(sender) = proposal.get_sender() else {
            return Some(InvalidProposalReason::InvalidSignature);
        };

        let slots = match self.epoch_cache.proposer_in_current_or_next_slot().await {
            Ok(slots) => slots,
            Err(e) => return Some(InvalidProposalReason::CommitteeUnavailable(e.to_string())),
        };

        let slot = proposal.slot_number();
        if slot != slots.current_slot && slot != slots.next_slot {
            return Some(InvalidProposalReason::SlotNotCurrentOrNext {
                slot,
                current: slots.current_slot,
                next: slots.next_slot,
            });
        }

        if sender != slots.current_proposer && sender != slots.next_proposer {
            return Some(InvalidProposalReason::UnexpectedProposer { sender, slot });
        }

        None
    }
}

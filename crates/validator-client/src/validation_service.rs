//! Validation service - turns block metadata into signed messages

use crate::key_store::ValidatorKeyStore;
use l2_types::{
    BlockAttestation, BlockProposal, ConsensusPayload, Hash32, ProposedBlockHeader,
    SignatureDomain, TxHash,
};
use std::sync::Arc;

/// Stateless signer for proposals and attestations
pub struct ValidationService {
    key_store: Arc<dyn ValidatorKeyStore>,
}

impl ValidationService {
    pub fn new(key_store: Arc<dyn ValidatorKeyStore>) -> Self {
        Self { key_store }
    }

    /// Sign a proposal for a block this node built
    pub fn create_block_proposal(
        &self,
        block_number: u64,
        header: ProposedBlockHeader,
        archive: Hash32,
        tx_hashes: Vec<TxHash>,
    ) -> BlockProposal {
        let payload = ConsensusPayload {
            header,
            archive,
            tx_hashes,
        };
        let signature = self
            .key_store
            .sign(&payload.signing_bytes(SignatureDomain::Proposal, block_number));
        BlockProposal::new(block_number, payload, signature)
    }

    /// Sign an attestation over an accepted proposal
    pub fn attest_to_proposal(&self, proposal: &BlockProposal) -> BlockAttestation {
        let payload = proposal.payload.clone();
        let signature = self
            .key_store
            .sign(&payload.signing_bytes(SignatureDomain::Attestation, proposal.block_number));
        BlockAttestation::new(proposal.block_number, payload, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_store::LocalKeyStore;
    use l2_types::{Address, StateReference};

    fn header() -> ProposedBlockHeader {
        ProposedBlockHeader {
            last_archive_root: Hash32::from_byte(4),
            state_reference: StateReference::default(),
            slot_number: 12,
            timestamp: 0,
            coinbase: Address::ZERO,
        }
    }

    #[test]
    fn test_proposal_signed_by_key_store() {
        let store = Arc::new(LocalKeyStore::new([5u8; 32]));
        let service = ValidationService::new(store.clone());
        let tx = TxHash(Hash32::from_byte(9));

        let proposal = service.create_block_proposal(5, header(), Hash32::from_byte(5), vec![tx]);
        assert_eq!(proposal.get_sender(), Some(store.address()));
        assert_eq!(proposal.tx_hashes(), &[tx]);
        assert_eq!(proposal.slot_number(), 12);
    }

    #[test]
    fn test_attestation_references_proposal() {
        let proposer = ValidationService::new(Arc::new(LocalKeyStore::new([5u8; 32])));
        let attester_store = Arc::new(LocalKeyStore::new([6u8; 32]));
        let attester = ValidationService::new(attester_store.clone());

        let proposal = proposer.create_block_proposal(5, header(), Hash32::from_byte(5), vec![]);
        let attestation = attester.attest_to_proposal(&proposal);

        assert_eq!(attestation.archive(), proposal.archive());
        assert_eq!(attestation.slot_number(), proposal.slot_number());
        assert_eq!(attestation.block_number, 5);
        assert_eq!(attestation.get_sender(), Some(attester_store.address()));
    }
}

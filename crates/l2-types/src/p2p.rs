//! Signed consensus messages exchanged between validators
//!
//! Proposals and attestations both sign the same [`ConsensusPayload`], under
//! different domain tags so one can never be replayed as the other.

use crate::block::ProposedBlockHeader;
use crate::primitives::{Address, Hash32, TxHash};
use borsh::{BorshDeserialize, BorshSerialize};
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};

/// What a signature is over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureDomain {
    Proposal,
    Attestation,
}

impl SignatureDomain {
    fn tag(self) -> &'static [u8] {
        match self {
            SignatureDomain::Proposal => b"l2/block-proposal/v1",
            SignatureDomain::Attestation => b"l2/block-attestation/v1",
        }
    }
}

/// The content a proposer commits to and attesters endorse
#[derive(
    Debug, Clone, PartialEq, Eq,
    BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct ConsensusPayload {
    pub header: ProposedBlockHeader,
    /// Archive root the block produces
    pub archive: Hash32,
    /// Ordered, unique
    pub tx_hashes: Vec<TxHash>,
}

impl ConsensusPayload {
    /// Bytes to sign for the given domain and block number
    pub fn signing_bytes(&self, domain: SignatureDomain, block_number: u64) -> Vec<u8> {
        let mut out = domain.tag().to_vec();
        out.extend_from_slice(&block_number.to_le_bytes());
        out.extend(borsh::to_vec(self).expect("ConsensusPayload serialization should not fail"));
        out
    }
}

/// An ed25519 signature together with the key that produced it
#[derive(
    Debug, Clone, PartialEq, Eq,
    BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct Signature {
    pub public_key: [u8; 32],
    pub bytes: Vec<u8>,
}

impl Signature {
    /// Address of the declared signer. Not proof of anything until [`Signature::verify`] passes.
    pub fn declared_signer(&self) -> Address {
        Address::from_public_key(&self.public_key)
    }

    /// Check the signature over `message`
    pub fn verify(&self, message: &[u8]) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.public_key) else {
            return false;
        };
        let Ok(sig) = ed25519_dalek::Signature::from_slice(&self.bytes) else {
            return false;
        };
        key.verify_strict(message, &sig).is_ok()
    }
}

/// A candidate block broadcast by the proposer of a slot
#[derive(
    Debug, Clone, PartialEq, Eq,
    BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct BlockProposal {
    pub block_number: u64,
    pub payload: ConsensusPayload,
    pub signature: Signature,
}

impl BlockProposal {
    pub fn new(block_number: u64, payload: ConsensusPayload, signature: Signature) -> Self {
        Self {
            block_number,
            payload,
            signature,
        }
    }

    pub fn slot_number(&self) -> u64 {
        self.payload.header.slot_number
    }

    /// Archive root; also the identity of the proposal
    pub fn archive(&self) -> Hash32 {
        self.payload.archive
    }

    pub fn tx_hashes(&self) -> &[TxHash] {
        &self.payload.tx_hashes
    }

    /// Signer of the proposal, if the signature is valid
    pub fn get_sender(&self) -> Option<Address> {
        let message = self
            .payload
            .signing_bytes(SignatureDomain::Proposal, self.block_number);
        self.signature
            .verify(&message)
            .then(|| self.signature.declared_signer())
    }
}

/// A committee member's signed endorsement of a proposal
#[derive(
    Debug, Clone, PartialEq, Eq,
    BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct BlockAttestation {
    pub block_number: u64,
    pub payload: ConsensusPayload,
    pub signature: Signature,
}

impl BlockAttestation {
    pub fn new(block_number: u64, payload: ConsensusPayload, signature: Signature) -> Self {
        Self {
            block_number,
            payload,
            signature,
        }
    }

    pub fn slot_number(&self) -> u64 {
        self.payload.header.slot_number
    }

    /// Archive root of the attested proposal
    pub fn archive(&self) -> Hash32 {
        self.payload.archive
    }

    /// Signer of the attestation, if the signature is valid
    pub fn get_sender(&self) -> Option<Address> {
        let message = self
            .payload
            .signing_bytes(SignatureDomain::Attestation, self.block_number);
        self.signature
            .verify(&message)
            .then(|| self.signature.declared_signer())
    }
}

//! Shared types for the rollup validator
//!
//! Blocks, transactions and the signed proposal/attestation messages that
//! the validator client, the chain view and the node binary all agree on.

pub mod block;
pub mod p2p;
pub mod primitives;

pub use block::{L2Block, ProposedBlockHeader, StateReference, Tx, TxEffect};
pub use p2p::{BlockAttestation, BlockProposal, ConsensusPayload, Signature, SignatureDomain};
pub use primitives::{decode_hex_array, Address, Hash32, TxHash, TypesError};

/// Number of the first L2 block. Blocks at or below it have no parent to check.
pub const INITIAL_L2_BLOCK_NUM: u64 = 1;

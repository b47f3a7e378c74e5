//! Transaction pool and gossip contract

use async_trait::async_trait;
use futures::future::BoxFuture;
use l2_types::{BlockAttestation, BlockProposal, Hash32, Tx, TxHash};
use std::sync::Arc;

/// Callback invoked for every block proposal received from a peer
pub type BlockProposalHandler =
    Arc<dyn Fn(BlockProposal) -> BoxFuture<'static, Option<BlockAttestation>> + Send + Sync>;

/// The P2P client as seen by the validator. Implementations are internally synchronized.
#[async_trait]
pub trait P2pClient: Send + Sync {
    /// Pool membership, aligned by index with `hashes`
    async fn has_txs_in_pool(&self, hashes: &[TxHash]) -> anyhow::Result<Vec<bool>>;

    /// Fetch transactions from peers, aligned by index with `hashes`
    async fn request_txs_by_hash(&self, hashes: &[TxHash]) -> anyhow::Result<Vec<Option<Tx>>>;

    async fn get_tx_by_hash(&self, hash: &TxHash) -> anyhow::Result<Option<Tx>>;

    async fn broadcast_proposal(&self, proposal: &BlockProposal) -> anyhow::Result<()>;

    fn register_block_proposal_handler(&self, handler: BlockProposalHandler);

    /// Full current set of attestations for `(slot, proposal_id)`, not a delta
    async fn get_attestations_for_slot(
        &self,
        slot: u64,
        proposal_id: &Hash32,
    ) -> anyhow::Result<Vec<BlockAttestation>>;

    async fn add_attestation(&self, attestation: BlockAttestation) -> anyhow::Result<()>;
}

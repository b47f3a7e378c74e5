//! In-process collaborators
//!
//! Single-node stand-ins for the P2P client, the epoch cache and the block
//! builder. The devnet binary runs on them and tests drive the validator
//! through them.

use crate::block_builder::{BlockBuilder, BuildBlockOptions, BuiltBlock};
use crate::epoch_cache::{EpochCache, EpochCommitteeInfo, EpochSelector, ProposerSlots};
use crate::p2p::{BlockProposalHandler, P2pClient};
use async_trait::async_trait;
use dashmap::DashMap;
use l2_types::{
    Address, BlockAttestation, BlockProposal, Hash32, L2Block, ProposedBlockHeader, Tx, TxEffect,
    TxHash,
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

/// Payload prefix that makes [`DevBlockBuilder`] revert a transaction
pub const REVERT_MARKER: &[u8] = b"revert:";

// ============ P2P ============

/// P2P client with a local pool and a simulated set of peers holding extra txs
pub struct LocalP2p {
    /// Transactions held locally
    tx_pool: DashMap<TxHash, Tx>,
    /// Transactions only peers have; moved into the pool when requested
    remote_txs: DashMap<TxHash, Tx>,
    /// Attestation pool keyed by (slot, proposal archive)
    attestations: DashMap<(u64, Hash32), Vec<BlockAttestation>>,
    /// Proposals broadcast by this node
    proposals: RwLock<Vec<BlockProposal>>,
    handler: RwLock<Option<BlockProposalHandler>>,
    pool_queries: AtomicUsize,
    tx_requests: AtomicUsize,
    attestation_polls: AtomicUsize,
}

impl LocalP2p {
    pub fn new() -> Self {
        Self {
            tx_pool: DashMap::new(),
            remote_txs: DashMap::new(),
            attestations: DashMap::new(),
            proposals: RwLock::new(Vec::new()),
            handler: RwLock::new(None),
            pool_queries: AtomicUsize::new(0),
            tx_requests: AtomicUsize::new(0),
            attestation_polls: AtomicUsize::new(0),
        }
    }

    /// Add a transaction to the local pool
    pub fn add_tx(&self, tx: Tx) {
        self.tx_pool.insert(tx.tx_hash(), tx);
    }

    /// Make a transaction fetchable from peers only
    pub fn add_remote_tx(&self, tx: Tx) {
        self.remote_txs.insert(tx.tx_hash(), tx);
    }

    pub fn has_tx(&self, hash: &TxHash) -> bool {
        self.tx_pool.contains_key(hash)
    }

    /// Remove transactions that made it into a block
    pub fn remove_txs(&self, hashes: &[TxHash]) {
        for hash in hashes {
            self.tx_pool.remove(hash);
        }
    }

    /// Up to `limit` pooled transactions, ordered by hash
    pub fn pending_txs(&self, limit: usize) -> Vec<Tx> {
        let mut txs: Vec<Tx> = self.tx_pool.iter().map(|r| r.value().clone()).collect();
        txs.sort_by_key(|tx| tx.tx_hash());
        txs.truncate(limit);
        txs
    }

    pub fn broadcast_proposals(&self) -> Vec<BlockProposal> {
        self.proposals.read().clone()
    }

    pub fn has_proposal_handler(&self) -> bool {
        self.handler.read().is_some()
    }

    /// Feed a proposal to the registered handler as if a peer had gossiped it
    pub async fn deliver_proposal(&self, proposal: BlockProposal) -> Option<BlockAttestation> {
        let handler = self.handler.read().clone()?;
        handler(proposal).await
    }

    /// Current attestation pool contents for a proposal
    pub fn attestations_for(&self, slot: u64, archive: &Hash32) -> Vec<BlockAttestation> {
        self.attestations
            .get(&(slot, *archive))
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    /// Drop attestations and broadcast proposals for slots below `slot`
    pub fn prune_before(&self, slot: u64) {
        self.attestations.retain(|(s, _), _| *s >= slot);
        let mut proposals = self.proposals.write();
        let before = proposals.len();
        proposals.retain(|p| p.slot_number() >= slot);
        tracing::trace!(
            "Pruned {} proposals below slot {}",
            before - proposals.len(),
            slot
        );
    }

    /// Number of `has_txs_in_pool` calls
    pub fn pool_queries(&self) -> usize {
        self.pool_queries.load(Ordering::SeqCst)
    }

    /// Number of `request_txs_by_hash` calls
    pub fn tx_requests(&self) -> usize {
        self.tx_requests.load(Ordering::SeqCst)
    }

    /// Number of `get_attestations_for_slot` calls
    pub fn attestation_polls(&self) -> usize {
        self.attestation_polls.load(Ordering::SeqCst)
    }
}

impl Default for LocalP2p {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl P2pClient for LocalP2p {
    async fn has_txs_in_pool(&self, hashes: &[TxHash]) -> anyhow::Result<Vec<bool>> {
        self.pool_queries.fetch_add(1, Ordering::SeqCst);
        Ok(hashes.iter().map(|h| self.tx_pool.contains_key(h)).collect())
    }

    async fn request_txs_by_hash(&self, hashes: &[TxHash]) -> anyhow::Result<Vec<Option<Tx>>> {
        self.tx_requests.fetch_add(1, Ordering::SeqCst);
        let fetched = hashes
            .iter()
            .map(|hash| {
                let tx = self.remote_txs.get(hash).map(|r| r.value().clone());
                if let Some(ref tx) = tx {
                    self.tx_pool.insert(*hash, tx.clone());
                }
                tx
            })
            .collect();
        Ok(fetched)
    }

    async fn get_tx_by_hash(&self, hash: &TxHash) -> anyhow::Result<Option<Tx>> {
        Ok(self.tx_pool.get(hash).map(|r| r.value().clone()))
    }

    async fn broadcast_proposal(&self, proposal: &BlockProposal) -> anyhow::Result<()> {
        tracing::debug!(
            "Broadcasting proposal for slot {} (block {})",
            proposal.slot_number(),
            proposal.block_number
        );
        self.proposals.write().push(proposal.clone());
        Ok(())
    }

    fn register_block_proposal_handler(&self, handler: BlockProposalHandler) {
        *self.handler.write() = Some(handler);
    }

    async fn get_attestations_for_slot(
        &self,
        slot: u64,
        proposal_id: &Hash32,
    ) -> anyhow::Result<Vec<BlockAttestation>> {
        self.attestation_polls.fetch_add(1, Ordering::SeqCst);
        Ok(self.attestations_for(slot, proposal_id))
    }

    async fn add_attestation(&self, attestation: BlockAttestation) -> anyhow::Result<()> {
        let key = (attestation.slot_number(), attestation.archive());
        let mut entry = self.attestations.entry(key).or_default();
        if !entry.contains(&attestation) {
            entry.push(attestation);
        }
        Ok(())
    }
}

// ============ Epoch cache ============

/// Fixed committee with round-robin proposers and a manually driven slot clock
pub struct StaticEpochCache {
    committee: RwLock<Vec<Address>>,
    epoch_duration: u64,
    slot: AtomicU64,
}

impl StaticEpochCache {
    pub fn new(committee: Vec<Address>, epoch_duration: u64) -> Self {
        Self {
            committee: RwLock::new(committee),
            epoch_duration: epoch_duration.max(1),
            slot: AtomicU64::new(0),
        }
    }

    pub fn set_slot(&self, slot: u64) {
        self.slot.store(slot, Ordering::SeqCst);
    }

    pub fn current_slot(&self) -> u64 {
        self.slot.load(Ordering::SeqCst)
    }

    /// Replace the committee wholesale
    pub fn set_committee(&self, committee: Vec<Address>) {
        *self.committee.write() = committee;
    }

    pub fn epoch_for_slot(&self, slot: u64) -> u64 {
        slot / self.epoch_duration
    }

    pub fn proposer_for_slot(&self, slot: u64) -> Address {
        let committee = self.committee.read();
        if committee.is_empty() {
            return Address::ZERO;
        }
        committee[(slot % committee.len() as u64) as usize]
    }
}

#[async_trait]
impl EpochCache for StaticEpochCache {
    async fn get_committee(&self, selector: EpochSelector) -> anyhow::Result<EpochCommitteeInfo> {
        let current = self.epoch_for_slot(self.current_slot());
        let epoch = match selector {
            EpochSelector::Now => current,
            EpochSelector::Next => current + 1,
            EpochSelector::Slot(slot) => self.epoch_for_slot(slot),
        };
        Ok(EpochCommitteeInfo {
            committee: self.committee.read().clone(),
            epoch,
        })
    }

    async fn is_in_committee(&self, address: &Address) -> anyhow::Result<bool> {
        Ok(self.committee.read().contains(address))
    }

    async fn proposer_in_current_or_next_slot(&self) -> anyhow::Result<ProposerSlots> {
        let current_slot = self.current_slot();
        let next_slot = current_slot + 1;
        Ok(ProposerSlots {
            current_slot,
            next_slot,
            current_proposer: self.proposer_for_slot(current_slot),
            next_proposer: self.proposer_for_slot(next_slot),
        })
    }
}

// ============ Block builder ============

/// Deterministic builder: archive = blake3(last archive || tx hashes)
#[derive(Debug, Clone, Default)]
pub struct DevBlockBuilder {
    /// Stop including transactions after this many
    max_txs: Option<usize>,
}

impl DevBlockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder that runs out of room after `max_txs` transactions
    pub fn with_max_txs(max_txs: usize) -> Self {
        Self {
            max_txs: Some(max_txs),
        }
    }

    pub fn compute_archive(last_archive: &Hash32, tx_hashes: &[TxHash]) -> Hash32 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(last_archive.as_bytes());
        for hash in tx_hashes {
            hasher.update(hash.0.as_bytes());
        }
        Hash32(*hasher.finalize().as_bytes())
    }
}

#[async_trait]
impl BlockBuilder for DevBlockBuilder {
    async fn build_block(
        &self,
        block_number: u64,
        header: &ProposedBlockHeader,
        txs: Vec<Tx>,
        opts: BuildBlockOptions,
    ) -> anyhow::Result<BuiltBlock> {
        let started = Instant::now();
        let limit = self.max_txs.unwrap_or(txs.len()).min(txs.len());
        let included = &txs[..limit];

        let tx_effects: Vec<TxEffect> = included
            .iter()
            .map(|tx| TxEffect {
                tx_hash: tx.tx_hash(),
                reverted: tx.payload.starts_with(REVERT_MARKER),
            })
            .collect();
        let num_failed_txs = tx_effects.iter().filter(|e| e.reverted).count();
        let hashes: Vec<TxHash> = tx_effects.iter().map(|e| e.tx_hash).collect();

        let block = L2Block {
            number: block_number,
            header: header.clone(),
            archive: Self::compute_archive(&header.last_archive_root, &hashes),
            tx_effects,
        };

        if !opts.validate_only {
            tracing::debug!("Built block {} with {} txs", block_number, limit);
        }

        Ok(BuiltBlock {
            block,
            num_txs: limit,
            num_failed_txs,
            processor_duration: started.elapsed(),
        })
    }
}

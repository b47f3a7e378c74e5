//! Validator client integration tests
//!
//! Drive a full `ValidatorClient` through the in-process collaborators:
//! - Attestation decisions (committee, proposer, parent, txs, re-execution)
//! - Proposal creation and attestation collection
//! - Reorgs of the chain view between proposals
//! - Lifecycle and handler registration

mod attestation_test;

use crate::block_builder::{BlockBuilder, BuildBlockOptions, BuiltBlock};
use crate::epoch_cache::{EpochCache, EpochCommitteeInfo, EpochSelector, ProposerSlots};
use crate::key_store::{LocalKeyStore, ValidatorKeyStore};
use crate::local::{DevBlockBuilder, LocalP2p, StaticEpochCache};
use crate::p2p::{BlockProposalHandler, P2pClient};
use crate::validation_service::ValidationService;
use crate::{ValidatorClient, ValidatorClientBuilder, ValidatorClientConfig};
use async_trait::async_trait;
use l2_chain_view::MemoryBlockSource;
use l2_types::{
    Address, BlockAttestation, BlockProposal, Hash32, L2Block, ProposedBlockHeader,
    StateReference, Tx, TxHash,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Slot the harness clock sits at. Round robin over four members puts the
/// proposer key at index 0.
pub const SLOT: u64 = 8;
/// Block number of the proposal under test
pub const BLOCK_NUMBER: u64 = 5;

pub fn proposer_key() -> Arc<LocalKeyStore> {
    Arc::new(LocalKeyStore::new([1u8; 32]))
}

pub fn my_key() -> Arc<LocalKeyStore> {
    Arc::new(LocalKeyStore::new([2u8; 32]))
}

pub fn peer_key(n: u8) -> Arc<LocalKeyStore> {
    Arc::new(LocalKeyStore::new([10 + n; 32]))
}

/// Archive of block `n` on the canonical test chain
pub fn archive_of(n: u64) -> Hash32 {
    Hash32::hash(&n.to_le_bytes())
}

pub fn header(slot: u64, last_archive_root: Hash32) -> ProposedBlockHeader {
    ProposedBlockHeader {
        last_archive_root,
        state_reference: StateReference::default(),
        slot_number: slot,
        timestamp: 1_700_000_000 + slot * 12,
        coinbase: Address::ZERO,
    }
}

pub fn block(number: u64, archive: Hash32) -> L2Block {
    L2Block {
        number,
        header: header(number, archive_of(number - 1)),
        archive,
        tx_effects: vec![],
    }
}

pub fn txs(n: u8) -> Vec<Tx> {
    (0..n).map(|i| Tx::new(vec![0xc0, i])).collect()
}

pub fn hashes(txs: &[Tx]) -> Vec<TxHash> {
    txs.iter().map(|t| t.tx_hash()).collect()
}

/// Proposal signed by `key` on top of `last_archive_root`, with the archive a
/// faithful re-execution would produce
pub fn proposal_with(
    key: Arc<LocalKeyStore>,
    block_number: u64,
    slot: u64,
    last_archive_root: Hash32,
    txs: &[Tx],
) -> BlockProposal {
    let tx_hashes = hashes(txs);
    let archive = DevBlockBuilder::compute_archive(&last_archive_root, &tx_hashes);
    ValidationService::new(key).create_block_proposal(
        block_number,
        header(slot, last_archive_root),
        archive,
        tx_hashes,
    )
}

/// Honest proposal for BLOCK_NUMBER at SLOT on the canonical chain
pub fn proposal(txs: &[Tx]) -> BlockProposal {
    proposal_with(proposer_key(), BLOCK_NUMBER, SLOT, archive_of(BLOCK_NUMBER - 1), txs)
}

pub fn attestation_from(key: Arc<LocalKeyStore>, proposal: &BlockProposal) -> BlockAttestation {
    ValidationService::new(key).attest_to_proposal(proposal)
}

pub fn fast_config() -> ValidatorClientConfig {
    ValidatorClientConfig {
        attestation_polling_interval_ms: 10,
        ..Default::default()
    }
}

/// Everything a test needs to poke at around one validator
pub struct Harness {
    pub validator: Arc<ValidatorClient>,
    pub p2p: Arc<LocalP2p>,
    pub epoch_cache: Arc<StaticEpochCache>,
    pub blocks: Arc<MemoryBlockSource>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(fast_config())
    }

    /// Committee [proposer, me, peer 1, peer 2], clock at SLOT, blocks 1..=4
    /// in the chain view, dev builder registered
    pub fn with_config(config: ValidatorClientConfig) -> Self {
        let committee = vec![
            proposer_key().address(),
            my_key().address(),
            peer_key(1).address(),
            peer_key(2).address(),
        ];
        let epoch_cache = Arc::new(StaticEpochCache::new(committee, 32));
        epoch_cache.set_slot(SLOT);

        let blocks = Arc::new(MemoryBlockSource::new());
        for n in 1..BLOCK_NUMBER {
            blocks.add_block(block(n, archive_of(n)));
        }

        let p2p = Arc::new(LocalP2p::new());
        let validator =
            ValidatorClientBuilder::new(config, epoch_cache.clone(), p2p.clone(), blocks.clone())
                .key_store(my_key())
                .build()
                .unwrap();
        validator.register_block_builder(Arc::new(DevBlockBuilder::new()));

        Self {
            validator,
            p2p,
            epoch_cache,
            blocks,
        }
    }

    /// Put txs in the local pool
    pub fn pool(&self, txs: &[Tx]) {
        for tx in txs {
            self.p2p.add_tx(tx.clone());
        }
    }
}

// ============ Scripted collaborators ============

/// P2P client whose attestation polls replay a script. The last entry repeats
/// once the script runs out. Everything else goes to the wrapped LocalP2p.
pub struct ScriptedP2p {
    pub inner: LocalP2p,
    script: Mutex<VecDeque<anyhow::Result<Vec<BlockAttestation>>>>,
    last: Mutex<Vec<BlockAttestation>>,
    polls: AtomicUsize,
}

impl ScriptedP2p {
    pub fn new(script: Vec<anyhow::Result<Vec<BlockAttestation>>>) -> Self {
        Self {
            inner: LocalP2p::new(),
            script: Mutex::new(script.into()),
            last: Mutex::new(Vec::new()),
            polls: AtomicUsize::new(0),
        }
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl P2pClient for ScriptedP2p {
    async fn has_txs_in_pool(&self, hashes: &[TxHash]) -> anyhow::Result<Vec<bool>> {
        self.inner.has_txs_in_pool(hashes).await
    }

    async fn request_txs_by_hash(&self, hashes: &[TxHash]) -> anyhow::Result<Vec<Option<Tx>>> {
        self.inner.request_txs_by_hash(hashes).await
    }

    async fn get_tx_by_hash(&self, hash: &TxHash) -> anyhow::Result<Option<Tx>> {
        self.inner.get_tx_by_hash(hash).await
    }

    async fn broadcast_proposal(&self, proposal: &BlockProposal) -> anyhow::Result<()> {
        self.inner.broadcast_proposal(proposal).await
    }

    fn register_block_proposal_handler(&self, handler: BlockProposalHandler) {
        self.inner.register_block_proposal_handler(handler)
    }

    async fn get_attestations_for_slot(
        &self,
        _slot: u64,
        _proposal_id: &Hash32,
    ) -> anyhow::Result<Vec<BlockAttestation>> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().pop_front();
        match next {
            Some(Ok(attestations)) => {
                *self.last.lock() = attestations.clone();
                Ok(attestations)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self.last.lock().clone()),
        }
    }

    async fn add_attestation(&self, attestation: BlockAttestation) -> anyhow::Result<()> {
        self.inner.add_attestation(attestation).await
    }
}

/// Epoch cache that can be told to fail every call
pub struct FlakyEpochCache {
    pub inner: StaticEpochCache,
    failing: AtomicBool,
}

impl FlakyEpochCache {
    pub fn new(inner: StaticEpochCache) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("L1 RPC unreachable");
        }
        Ok(())
    }
}

#[async_trait]
impl EpochCache for FlakyEpochCache {
    async fn get_committee(&self, selector: EpochSelector) -> anyhow::Result<EpochCommitteeInfo> {
        self.check()?;
        self.inner.get_committee(selector).await
    }

    async fn is_in_committee(&self, address: &Address) -> anyhow::Result<bool> {
        self.check()?;
        self.inner.is_in_committee(address).await
    }

    async fn proposer_in_current_or_next_slot(&self) -> anyhow::Result<ProposerSlots> {
        self.check()?;
        self.inner.proposer_in_current_or_next_slot().await
    }
}

/// Builder whose execution engine is down
pub struct StubBlockBuilder;

#[async_trait]
impl BlockBuilder for StubBlockBuilder {
    async fn build_block(
        &self,
        block_number: u64,
        _header: &ProposedBlockHeader,
        _txs: Vec<Tx>,
        _opts: BuildBlockOptions,
    ) -> anyhow::Result<BuiltBlock> {
        anyhow::bail!("world state unavailable for block {}", block_number)
    }
}

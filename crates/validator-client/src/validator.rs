//! Validator client - decides attestations, creates proposals, collects votes
//!
//! Every failure on the attestation path ends in an abstention: nothing below
//! `attest_to_proposal` propagates out of it.

use crate::block_builder::BlockBuilder;
use crate::config::{ValidatorClientConfig, EPOCH_COMMITTEE_REFRESH_INTERVAL};
use crate::epoch_cache::EpochCache;
use crate::epoch_watcher::EpochCommitteeWatcher;
use crate::error::ValidatorError;
use crate::key_store::{LocalKeyStore, ValidatorKeyStore};
use crate::metrics::ValidatorMetrics;
use crate::p2p::{BlockProposalHandler, P2pClient};
use crate::proposal_validator::BlockProposalValidator;
use crate::reexecution::{ReExecutionEngine, ReExecutionResult};
use crate::time::{DateProvider, SystemDateProvider};
use crate::tx_availability;
use crate::validation_service::ValidationService;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use l2_chain_view::L2BlockSource;
use l2_types::{
    Address, BlockAttestation, BlockProposal, Hash32, ProposedBlockHeader, TxHash,
    INITIAL_L2_BLOCK_NUM,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Validator client for one signing key
pub struct ValidatorClient {
    epoch_cache: Arc<dyn EpochCache>,
    p2p: Arc<dyn P2pClient>,
    block_source: Arc<dyn L2BlockSource>,
    config: ValidatorClientConfig,
    date_provider: Arc<dyn DateProvider>,
    validation_service: ValidationService,
    proposal_validator: BlockProposalValidator,
    reexecution: ReExecutionEngine,
    metrics: ValidatorMetrics,
    /// Last proposal this node created; guards against signing two for one slot
    previous_proposal: Mutex<Option<BlockProposal>>,
    /// Sequencer's builder, registered after construction
    block_builder: RwLock<Option<Arc<dyn BlockBuilder>>>,
    epoch_watcher: EpochCommitteeWatcher,
    my_address: Address,
}

impl ValidatorClient {
    /// Build from config, deriving the key store from `validator_private_key`,
    /// and register the proposal handler with the P2P client
    pub fn create(
        config: ValidatorClientConfig,
        epoch_cache: Arc<dyn EpochCache>,
        p2p: Arc<dyn P2pClient>,
        block_source: Arc<dyn L2BlockSource>,
    ) -> Result<Arc<Self>, ValidatorError> {
        ValidatorClientBuilder::new(config, epoch_cache, p2p, block_source).build()
    }

    pub fn validator_address(&self) -> Address {
        self.my_address
    }

    pub fn metrics(&self) -> &ValidatorMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &ValidatorClientConfig {
        &self.config
    }

    /// Last epoch seen by the committee watcher
    pub fn last_epoch(&self) -> Option<u64> {
        self.epoch_watcher.last_epoch()
    }

    /// Log committee membership and start the committee watcher
    pub async fn start(&self) {
        let me = self.my_address;
        match self.epoch_cache.is_in_committee(&me).await {
            Ok(true) => tracing::info!(
                "Started validator with address {} in current validator committee",
                me
            ),
            Ok(false) => tracing::info!("Started validator with address {}", me),
            Err(e) => tracing::warn!(
                "Started validator with address {} (committee unknown: {})",
                me,
                e
            ),
        }
        self.epoch_watcher.start();
    }

    /// Stop the committee watcher and wait for it
    pub async fn stop(&self) {
        self.epoch_watcher.stop().await;
        tracing::info!("Validator {} stopped", self.my_address);
    }

    /// Route peer proposals from the P2P client into `attest_to_proposal`
    pub fn register_block_proposal_handler(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let handler: BlockProposalHandler = Arc::new(
            move |proposal: BlockProposal| -> BoxFuture<'static, Option<BlockAttestation>> {
                let weak = weak.clone();
                Box::pin(async move {
                    let validator = weak.upgrade()?;
                    validator.attest_to_proposal(&proposal).await
                })
            },
        );
        self.p2p.register_block_proposal_handler(handler);
    }

    /// Register the builder used for re-execution
    pub fn register_block_builder(&self, builder: Arc<dyn BlockBuilder>) {
        *self.block_builder.write() = Some(builder);
    }

    /// Decide whether to attest to a peer proposal. `None` means abstain.
    pub async fn attest_to_proposal(&self, proposal: &BlockProposal) -> Option<BlockAttestation> {
        let slot_number = proposal.slot_number();
        let block_number = proposal.block_number;
        tracing::debug!("Received request to attest for slot {}", slot_number);

        match self.epoch_cache.is_in_committee(&self.my_address).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("Not in the committee, skipping attestation");
                return None;
            }
            Err(e) => {
                tracing::warn!(
                    "Could not check committee membership, skipping attestation: {}",
                    e
                );
                self.metrics.inc_failed_attestations("collaborator_error");
                return None;
            }
        }

        if let Some(reason) = self.proposal_validator.validate(proposal).await {
            tracing::debug!("Proposal is not valid, skipping attestation: {}", reason);
            self.metrics.inc_failed_attestations("invalid_proposal");
            return None;
        }

        // A parent we don't know, or one with a different archive, means the
        // proposal builds on a branch we can't verify: either we're behind or
        // the parent was reorged out. Both look the same from here.
        if block_number > INITIAL_L2_BLOCK_NUM {
            let parent = match self.block_source.get_block(block_number - 1).await {
                Ok(parent) => parent,
                Err(e) => {
                    tracing::warn!("Failed to fetch parent block {}: {}", block_number - 1, e);
                    self.metrics.inc_failed_attestations("collaborator_error");
                    return None;
                }
            };
            let Some(parent) = parent else {
                tracing::debug!("Parent block for {} not found, skipping attestation", block_number);
                self.metrics.inc_failed_attestations("parent_block_not_found");
                return None;
            };
            if proposal.payload.header.last_archive_root != parent.archive {
                tracing::debug!(
                    "Parent block archive root for proposal does not match, skipping attestation \
                     (slot {}, block {}, proposal last archive {}, parent archive {})",
                    slot_number,
                    block_number,
                    proposal.payload.header.last_archive_root,
                    parent.archive
                );
                self.metrics.inc_failed_attestations("parent_block_does_not_match");
                return None;
            }
        }

        tracing::debug!(
            "Processing attestation for slot {} (block {}, {} txs, archive {})",
            slot_number,
            block_number,
            proposal.tx_hashes().len(),
            proposal.archive()
        );

        if let Err(e) = self.check_proposal_contents(proposal).await {
            self.metrics.inc_failed_attestations(e.kind());
            if e.is_reexecution_failure() {
                tracing::error!(
                    "Re-execution of proposal for slot {} failed, skipping attestation: {}",
                    slot_number,
                    e
                );
            } else {
                tracing::warn!("Failed to attest to proposal for slot {}: {}", slot_number, e);
            }
            return None;
        }

        tracing::info!("Attesting to proposal for slot {} (block {})", slot_number, block_number);
        self.metrics.inc_attestations();
        Some(self.do_attest_to_proposal(proposal).await)
    }

    async fn check_proposal_contents(&self, proposal: &BlockProposal) -> Result<(), ValidatorError> {
        self.ensure_transactions_are_available(proposal).await?;
        if self.config.validator_reexecute {
            tracing::debug!("Re-executing transactions in the proposal before attesting");
            self.re_execute_transactions(proposal).await?;
        }
        Ok(())
    }

    /// Check pool availability of every transaction in the proposal, fetching missing ones
    pub async fn ensure_transactions_are_available(
        &self,
        proposal: &BlockProposal,
    ) -> Result<(), ValidatorError> {
        tx_availability::ensure_transactions_are_available(self.p2p.as_ref(), proposal.tx_hashes())
            .await
    }

    /// Re-execute the proposal with the registered builder
    pub async fn re_execute_transactions(
        &self,
        proposal: &BlockProposal,
    ) -> Result<ReExecutionResult, ValidatorError> {
        let builder = self
            .block_builder
            .read()
            .clone()
            .ok_or(ValidatorError::BlockBuilderNotProvided)?;
        self.reexecution.re_execute(builder.as_ref(), proposal).await
    }

    /// Sign a proposal for this node's slot. Returns `None` if one was already
    /// made for the same slot.
    pub fn create_block_proposal(
        &self,
        block_number: u64,
        header: ProposedBlockHeader,
        archive: Hash32,
        tx_hashes: Vec<TxHash>,
    ) -> Option<BlockProposal> {
        let mut previous = self.previous_proposal.lock();
        if previous
            .as_ref()
            .is_some_and(|p| p.slot_number() == header.slot_number)
        {
            tracing::debug!("Already made a proposal for slot {}, skipping proposal", header.slot_number);
            self.metrics.inc_duplicate_proposals();
            return None;
        }

        let proposal = self
            .validation_service
            .create_block_proposal(block_number, header, archive, tx_hashes);
        *previous = Some(proposal.clone());
        self.metrics.inc_proposals_created();
        Some(proposal)
    }

    pub async fn broadcast_block_proposal(&self, proposal: &BlockProposal) -> anyhow::Result<()> {
        self.p2p.broadcast_proposal(proposal).await
    }

    /// Self-attest, then poll the attestation pool until `required` distinct
    /// senders have attested or `deadline` passes.
    pub async fn collect_attestations(
        &self,
        proposal: &BlockProposal,
        required: usize,
        deadline: DateTime<Utc>,
    ) -> Result<Vec<BlockAttestation>, ValidatorError> {
        let slot = proposal.slot_number();
        tracing::debug!(
            "Collecting {} attestations for slot {} with deadline {}",
            required,
            slot,
            deadline.to_rfc3339()
        );

        if deadline < self.date_provider.now() {
            tracing::error!(
                "Deadline {} for collecting {} attestations for slot {} is in the past",
                deadline.to_rfc3339(),
                required,
                slot
            );
            return Err(ValidatorError::AttestationTimeout { required, slot });
        }

        let proposal_id = proposal.archive();
        self.do_attest_to_proposal(proposal).await;
        let me = self.my_address;
        let interval = self.config.attestation_polling_interval();

        let mut held: Vec<(Address, BlockAttestation)> = Vec::new();
        loop {
            match self.p2p.get_attestations_for_slot(slot, &proposal_id).await {
                Ok(collected) => {
                    let known: HashSet<Address> = held.iter().map(|(sender, _)| *sender).collect();
                    let latest = dedup_by_sender(collected, slot, &proposal_id);
                    for (sender, _) in &latest {
                        if *sender != me && !known.contains(sender) {
                            tracing::debug!("Received attestation for slot {} from {}", slot, sender);
                        }
                    }
                    held = latest;
                }
                Err(e) => {
                    tracing::warn!("Failed to poll attestations for slot {}: {}", slot, e);
                }
            }

            if held.len() >= required {
                tracing::info!("Collected all {} attestations for slot {}", required, slot);
                return Ok(held.into_iter().map(|(_, attestation)| attestation).collect());
            }

            if deadline < self.date_provider.now() {
                tracing::error!(
                    "Timeout {} waiting for {} attestations for slot {}",
                    deadline.to_rfc3339(),
                    required,
                    slot
                );
                return Err(ValidatorError::AttestationTimeout { required, slot });
            }

            tracing::debug!("Collected {} attestations so far", held.len());
            tokio::time::sleep(interval).await;
        }
    }

    async fn do_attest_to_proposal(&self, proposal: &BlockProposal) -> BlockAttestation {
        let attestation = self.validation_service.attest_to_proposal(proposal);
        if let Err(e) = self.p2p.add_attestation(attestation.clone()).await {
            tracing::warn!(
                "Failed to add own attestation for slot {} to the pool: {}",
                proposal.slot_number(),
                e
            );
        }
        attestation
    }
}

/// Keep one attestation per verified sender, first seen wins. Attestations for
/// another proposal or with a bad signature are dropped.
fn dedup_by_sender(
    attestations: Vec<BlockAttestation>,
    slot: u64,
    proposal_id: &Hash32,
) -> Vec<(Address, BlockAttestation)> {
    let mut seen = HashSet::new();
    attestations
        .into_iter()
        .filter(|a| a.slot_number() == slot && a.archive() == *proposal_id)
        .filter_map(|a| a.get_sender().map(|sender| (sender, a)))
        .filter(|(sender, _)| seen.insert(*sender))
        .collect()
}

/// Builder for ValidatorClient
pub struct ValidatorClientBuilder {
    config: ValidatorClientConfig,
    epoch_cache: Arc<dyn EpochCache>,
    p2p: Arc<dyn P2pClient>,
    block_source: Arc<dyn L2BlockSource>,
    key_store: Option<Arc<dyn ValidatorKeyStore>>,
    date_provider: Arc<dyn DateProvider>,
    epoch_refresh_interval: Duration,
}

impl ValidatorClientBuilder {
    pub fn new(
        config: ValidatorClientConfig,
        epoch_cache: Arc<dyn EpochCache>,
        p2p: Arc<dyn P2pClient>,
        block_source: Arc<dyn L2BlockSource>,
    ) -> Self {
        Self {
            config,
            epoch_cache,
            p2p,
            block_source,
            key_store: None,
            date_provider: Arc::new(SystemDateProvider),
            epoch_refresh_interval: EPOCH_COMMITTEE_REFRESH_INTERVAL,
        }
    }

    /// Use this key store instead of the configured private key
    pub fn key_store(mut self, key_store: Arc<dyn ValidatorKeyStore>) -> Self {
        self.key_store = Some(key_store);
        self
    }

    pub fn date_provider(mut self, date_provider: Arc<dyn DateProvider>) -> Self {
        self.date_provider = date_provider;
        self
    }

    pub fn epoch_refresh_interval(mut self, interval: Duration) -> Self {
        self.epoch_refresh_interval = interval;
        self
    }

    pub fn build(self) -> Result<Arc<ValidatorClient>, ValidatorError> {
        let key_store = match self.key_store {
            Some(key_store) => key_store,
            None => Arc::new(LocalKeyStore::from_config(&self.config)?),
        };
        let my_address = key_store.address();
        let metrics = ValidatorMetrics::new();

        let validator = Arc::new(ValidatorClient {
            validation_service: ValidationService::new(key_store),
            proposal_validator: BlockProposalValidator::new(self.epoch_cache.clone()),
            reexecution: ReExecutionEngine::new(self.p2p.clone(), metrics.clone()),
            epoch_watcher: EpochCommitteeWatcher::new(
                self.epoch_cache.clone(),
                my_address,
                self.epoch_refresh_interval,
            ),
            epoch_cache: self.epoch_cache,
            p2p: self.p2p,
            block_source: self.block_source,
            config: self.config,
            date_provider: self.date_provider,
            metrics,
            previous_proposal: Mutex::new(None),
            block_builder: RwLock::new(None),
            my_address,
        });

        validator.register_block_proposal_handler();
        tracing::debug!("Initialized validator with address {}", my_address);
        Ok(validator)
    }
}

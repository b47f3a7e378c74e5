//! Rollup Validator
//!
//! Runs a single-node devnet: this validator is the whole committee. Each slot
//! it builds a block from the local pool, proposes it, collects its own
//! attestation and appends the block to the in-memory chain view.

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use l2_chain_view::{ChainMonitor, MemoryBlockSource};
use l2_types::{Hash32, ProposedBlockHeader, StateReference, Tx, TxHash, INITIAL_L2_BLOCK_NUM};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use validator_client::{
    BlockBuilder, BuildBlockOptions, DevBlockBuilder, LocalKeyStore, LocalP2p, StaticEpochCache,
    ValidatorClient, ValidatorKeyStore,
};

mod config;

/// Slots of gossip state the devnet P2P pool keeps around
const RETAINED_SLOTS: u64 = 32;

use config::NodeConfig;

/// Rollup committee validator
#[derive(Parser, Debug)]
#[command(name = "rollup-validator")]
#[command(about = "Attests to, proposes and collects votes on L2 blocks", long_about = None)]
struct Args {
    /// JSON config file. CLI flags and environment variables override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Hex-encoded 32-byte ed25519 secret key
    #[arg(long, env = "VALIDATOR_PRIVATE_KEY", hide_env_values = true)]
    validator_private_key: Option<String>,

    /// Re-execute proposals before attesting
    #[arg(long, env = "VALIDATOR_REEXECUTE")]
    validator_reexecute: Option<bool>,

    /// Attestation pool polling interval in milliseconds
    #[arg(long, env = "VALIDATOR_ATTESTATIONS_POLLING_INTERVAL_MS")]
    attestation_polling_interval_ms: Option<u64>,

    /// Run without validator duties
    #[arg(long, env = "VALIDATOR_DISABLED")]
    disable_validator: Option<bool>,

    /// Slot length in milliseconds
    #[arg(long)]
    slot_duration_ms: Option<u64>,

    /// Slots per epoch
    #[arg(long)]
    epoch_duration: Option<u64>,

    /// Maximum transactions per block
    #[arg(long)]
    max_txs_per_block: Option<usize>,

    /// Synthetic transactions added to the pool each slot
    #[arg(long)]
    dev_txs_per_slot: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    /// Layer CLI and env values over the file config
    fn resolve(&self) -> Result<NodeConfig> {
        let mut config = NodeConfig::load(self.config.as_deref())?;
        if let Some(key) = &self.validator_private_key {
            config.validator.validator_private_key = Some(key.clone());
        }
        if let Some(reexecute) = self.validator_reexecute {
            config.validator.validator_reexecute = reexecute;
        }
        if let Some(interval) = self.attestation_polling_interval_ms {
            config.validator.attestation_polling_interval_ms = interval;
        }
        if let Some(disabled) = self.disable_validator {
            config.validator.disable_validator = disabled;
        }
        if let Some(ms) = self.slot_duration_ms {
            config.slot_duration_ms = ms;
        }
        if let Some(epoch) = self.epoch_duration {
            config.epoch_duration = epoch;
        }
        if let Some(max) = self.max_txs_per_block {
            config.max_txs_per_block = max;
        }
        if let Some(n) = self.dev_txs_per_slot {
            config.dev_txs_per_slot = n;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Everything one devnet slot touches
struct Devnet {
    config: NodeConfig,
    validator: Arc<ValidatorClient>,
    p2p: Arc<LocalP2p>,
    epoch_cache: Arc<StaticEpochCache>,
    blocks: Arc<MemoryBlockSource>,
    builder: Arc<DevBlockBuilder>,
    monitor: ChainMonitor,
}

impl Devnet {
    fn slot_duration(&self) -> Duration {
        Duration::from_millis(self.config.slot_duration_ms)
    }

    fn inject_txs(&self, slot: u64) {
        for i in 0..self.config.dev_txs_per_slot {
            self.p2p.add_tx(Tx::new(format!("devnet:{}:{}", slot, i).into_bytes()));
        }
    }

    /// Build, propose and finalize one block
    async fn run_slot(&mut self, slot: u64) -> Result<()> {
        self.epoch_cache.set_slot(slot);
        self.inject_txs(slot);

        let (block_number, last_archive_root) = match self.blocks.latest_block() {
            Some(parent) => (parent.number + 1, parent.archive),
            None => (INITIAL_L2_BLOCK_NUM, Hash32::ZERO),
        };
        let header = ProposedBlockHeader {
            last_archive_root,
            state_reference: StateReference::default(),
            slot_number: slot,
            timestamp: Utc::now().timestamp().max(0) as u64,
            coinbase: self.validator.validator_address(),
        };

        let txs = self.p2p.pending_txs(self.config.max_txs_per_block);
        let built = self
            .builder
            .build_block(block_number, &header, txs, BuildBlockOptions::default())
            .await?;
        let tx_hashes: Vec<TxHash> = built.block.tx_effects.iter().map(|e| e.tx_hash).collect();

        let Some(proposal) = self.validator.create_block_proposal(
            block_number,
            header,
            built.block.archive,
            tx_hashes.clone(),
        ) else {
            return Ok(());
        };
        self.validator.broadcast_block_proposal(&proposal).await?;

        let deadline =
            Utc::now() + chrono::Duration::milliseconds(self.config.slot_duration_ms as i64);
        let attestations = self.validator.collect_attestations(&proposal, 1, deadline).await?;

        tracing::info!(
            "Block {} finalized in slot {} with {} txs and {} attestations (archive {})",
            block_number,
            slot,
            tx_hashes.len(),
            attestations.len(),
            built.block.archive
        );
        self.p2p.remove_txs(&tx_hashes);
        self.p2p.prune_before(slot.saturating_sub(RETAINED_SLOTS));
        self.blocks.add_block(built.block);
        self.monitor.run().await?;

        if slot % self.config.epoch_duration.max(1) == 0 {
            let stats = self.validator.metrics().stats();
            tracing::info!(
                "Epoch {}: {} proposals created, {} duplicates skipped, {} attestations",
                self.epoch_cache.epoch_for_slot(slot),
                stats.proposals_created,
                stats.duplicate_proposals_skipped,
                stats.attestations
            );
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = args.resolve()?;
    tracing::debug!("Resolved config: {:?}", config);

    if config.validator.disable_validator {
        return run_monitor_only(config).await;
    }

    run_devnet(config).await
}

/// Follow the chain view without any validator duties
async fn run_monitor_only(config: NodeConfig) -> Result<()> {
    tracing::info!("Validator duties disabled, running chain monitor only");

    let blocks = Arc::new(MemoryBlockSource::new());
    let mut monitor = ChainMonitor::new(blocks);
    let mut ticker = tokio::time::interval(Duration::from_millis(config.slot_duration_ms));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = monitor.run().await {
                    tracing::error!("Chain monitor poll failed: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down...");
                break;
            }
        }
    }

    Ok(())
}

async fn run_devnet(config: NodeConfig) -> Result<()> {
    let address = LocalKeyStore::from_config(&config.validator)?.address();

    tracing::info!("Starting rollup validator - DEVNET MODE");
    tracing::info!("  Address: {}", address);
    tracing::info!("  Slot duration: {}ms", config.slot_duration_ms);
    tracing::info!("  Epoch duration: {} slots", config.epoch_duration);
    tracing::info!("  Re-execution: {}", config.validator.validator_reexecute);

    let p2p = Arc::new(LocalP2p::new());
    let epoch_cache = Arc::new(StaticEpochCache::new(vec![address], config.epoch_duration));
    let blocks = Arc::new(MemoryBlockSource::new());
    let builder = Arc::new(DevBlockBuilder::new());

    let validator = ValidatorClient::create(
        config.validator.clone(),
        epoch_cache.clone(),
        p2p.clone(),
        blocks.clone(),
    )?;
    validator.register_block_builder(builder.clone());
    validator.start().await;

    let mut devnet = Devnet {
        monitor: ChainMonitor::new(blocks.clone()),
        config,
        validator: validator.clone(),
        p2p,
        epoch_cache,
        blocks,
        builder,
    };
    devnet.monitor.run().await?;

    let mut ticker = tokio::time::interval(devnet.slot_duration());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut slot = 1u64;

    tracing::info!("Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = devnet.run_slot(slot).await {
                    tracing::error!("Slot {} failed: {}", slot, e);
                }
                slot += 1;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down...");
                break;
            }
        }
    }

    validator.stop().await;
    let stats = validator.metrics().stats();
    tracing::info!(
        "Validator stopped after {} slots ({} proposals)",
        slot - 1,
        stats.proposals_created
    );

    Ok(())
}

//! Attestation decision tests

use super::*;
use crate::error::ValidatorError;
use crate::local::REVERT_MARKER;

#[tokio::test]
async fn test_attests_to_honest_proposal() {
    let h = Harness::new();
    let txs = txs(3);
    h.pool(&txs);
    let proposal = proposal(&txs);

    let attestation = h.validator.attest_to_proposal(&proposal).await.unwrap();

    assert_eq!(attestation.get_sender(), Some(my_key().address()));
    assert_eq!(attestation.archive(), proposal.archive());
    assert_eq!(attestation.slot_number(), SLOT);
    assert_eq!(h.validator.metrics().stats().attestations, 1);
    assert_eq!(h.p2p.attestations_for(SLOT, &proposal.archive()), vec![attestation]);
}

#[tokio::test]
async fn test_not_in_committee_does_nothing_else() {
    let h = Harness::new();
    h.epoch_cache
        .set_committee(vec![proposer_key().address(), peer_key(1).address()]);
    let txs = txs(2);
    h.pool(&txs);

    assert!(h.validator.attest_to_proposal(&proposal(&txs)).await.is_none());
    assert_eq!(h.p2p.pool_queries(), 0);
    assert_eq!(h.p2p.tx_requests(), 0);
    let stats = h.validator.metrics().stats();
    assert_eq!(stats.attestations, 0);
    assert!(stats.failed_attestations.is_empty());
}

#[tokio::test]
async fn test_unexpected_proposer_rejected() {
    let h = Harness::new();
    let txs = txs(1);
    h.pool(&txs);
    // Slot 8 belongs to the proposer, slot 9 to us: peer 2 owns neither
    let proposal = proposal_with(peer_key(2), BLOCK_NUMBER, SLOT, archive_of(4), &txs);

    assert!(h.validator.attest_to_proposal(&proposal).await.is_none());
    assert_eq!(h.validator.metrics().failed_attestations("invalid_proposal"), 1);
    assert_eq!(h.p2p.pool_queries(), 0);
}

#[tokio::test]
async fn test_parent_archive_mismatch() {
    let h = Harness::new();
    h.blocks.add_block(block(4, Hash32::from_byte(0xAA)));
    let txs = txs(1);
    h.pool(&txs);
    let proposal = proposal_with(proposer_key(), 5, SLOT, Hash32::from_byte(0xBB), &txs);

    assert!(h.validator.attest_to_proposal(&proposal).await.is_none());
    assert_eq!(
        h.validator.metrics().failed_attestations("parent_block_does_not_match"),
        1
    );
    assert_eq!(h.p2p.pool_queries(), 0);
}

#[tokio::test]
async fn test_parent_not_found() {
    let h = Harness::new();
    let txs = txs(1);
    h.pool(&txs);
    // Chain view only has blocks 1..=4
    let proposal = proposal_with(proposer_key(), 7, SLOT, archive_of(6), &txs);

    assert!(h.validator.attest_to_proposal(&proposal).await.is_none());
    assert_eq!(h.validator.metrics().failed_attestations("parent_block_not_found"), 1);
}

#[tokio::test]
async fn test_first_block_skips_parent_check() {
    let h = Harness::new();
    let txs = txs(1);
    h.pool(&txs);
    let proposal = proposal_with(proposer_key(), 1, SLOT, Hash32::from_byte(0x42), &txs);

    assert!(h.validator.attest_to_proposal(&proposal).await.is_some());
}

#[tokio::test]
async fn test_missing_txs_reported_exactly() {
    let h = Harness::new();
    let txs = txs(3);
    h.p2p.add_tx(txs[0].clone());
    h.p2p.add_remote_tx(txs[1].clone());
    let proposal = proposal(&txs);

    match h.validator.ensure_transactions_are_available(&proposal).await {
        Err(ValidatorError::TransactionsNotAvailable(missing)) => {
            assert_eq!(missing, vec![txs[2].tx_hash()]);
        }
        other => panic!("unexpected result: {other:?}"),
    }

    assert!(h.validator.attest_to_proposal(&proposal).await.is_none());
    assert_eq!(
        h.validator.metrics().failed_attestations("transactions_not_available"),
        1
    );
}

#[tokio::test]
async fn test_fetches_missing_txs_then_attests() {
    let h = Harness::new();
    let txs = txs(2);
    h.p2p.add_tx(txs[0].clone());
    h.p2p.add_remote_tx(txs[1].clone());

    assert!(h.validator.attest_to_proposal(&proposal(&txs)).await.is_some());
    assert_eq!(h.p2p.tx_requests(), 1);
}

#[tokio::test]
async fn test_reverted_tx_fails_reexecution() {
    let h = Harness::new();
    let mut payload = REVERT_MARKER.to_vec();
    payload.extend_from_slice(b"transfer");
    let txs = vec![Tx::new(payload), Tx::new(vec![7])];
    h.pool(&txs);
    let proposal = proposal(&txs);

    let err = h.validator.re_execute_transactions(&proposal).await.unwrap_err();
    assert!(matches!(err, ValidatorError::ReExFailedTxs(1)));

    assert!(h.validator.attest_to_proposal(&proposal).await.is_none());
    let stats = h.validator.metrics().stats();
    assert_eq!(stats.failed_attestations.get("reex_failed_txs"), Some(&1));
    assert_eq!(stats.failed_reexecutions, 2);
    assert_eq!(
        stats.last_failed_reexecution.map(|f| f.archive),
        Some(proposal.archive())
    );
}

#[tokio::test]
async fn test_state_mismatch_rejected() {
    let h = Harness::new();
    let txs = txs(2);
    h.pool(&txs);
    let proposal = ValidationService::new(proposer_key()).create_block_proposal(
        BLOCK_NUMBER,
        header(SLOT, archive_of(4)),
        Hash32::from_byte(0xee),
        hashes(&txs),
    );

    assert!(h.validator.attest_to_proposal(&proposal).await.is_none());
    assert_eq!(h.validator.metrics().failed_attestations("reex_state_mismatch"), 1);
}

#[tokio::test]
async fn test_reexecution_disabled_skips_state_check() {
    let h = Harness::with_config(ValidatorClientConfig {
        validator_reexecute: false,
        ..fast_config()
    });
    let txs = txs(2);
    h.pool(&txs);
    let proposal = ValidationService::new(proposer_key()).create_block_proposal(
        BLOCK_NUMBER,
        header(SLOT, archive_of(4)),
        Hash32::from_byte(0xee),
        hashes(&txs),
    );

    assert!(h.validator.attest_to_proposal(&proposal).await.is_some());
    assert_eq!(h.validator.metrics().stats().reexecutions, 0);
}

#[tokio::test]
async fn test_block_builder_not_provided() {
    let h = Harness::new();
    let validator = ValidatorClientBuilder::new(
        fast_config(),
        h.epoch_cache.clone(),
        h.p2p.clone(),
        h.blocks.clone(),
    )
    .key_store(my_key())
    .build()
    .unwrap();
    let txs = txs(1);
    h.pool(&txs);
    let proposal = proposal(&txs);

    assert!(matches!(
        validator.re_execute_transactions(&proposal).await,
        Err(ValidatorError::BlockBuilderNotProvided)
    ));
    assert!(validator.attest_to_proposal(&proposal).await.is_none());
    assert_eq!(
        validator.metrics().failed_attestations("block_builder_not_provided"),
        1
    );
}

#[tokio::test]
async fn test_builder_error_abstains() {
    let h = Harness::new();
    h.validator.register_block_builder(Arc::new(StubBlockBuilder));
    let txs = txs(1);
    h.pool(&txs);
    let proposal = proposal(&txs);

    assert!(matches!(
        h.validator.re_execute_transactions(&proposal).await,
        Err(ValidatorError::BlockBuilder(_))
    ));
    assert!(h.validator.attest_to_proposal(&proposal).await.is_none());
    let stats = h.validator.metrics().stats();
    assert_eq!(stats.failed_attestations.get("block_builder_failed"), Some(&1));
    // Builder errors are not re-execution verdicts
    assert_eq!(stats.failed_reexecutions, 0);
    assert_eq!(stats.reexecutions, 2);
}

#[tokio::test]
async fn test_epoch_cache_failure_abstains() {
    let cache = StaticEpochCache::new(
        vec![proposer_key().address(), my_key().address()],
        32,
    );
    cache.set_slot(SLOT);
    let flaky = Arc::new(FlakyEpochCache::new(cache));
    let p2p = Arc::new(LocalP2p::new());
    let blocks = Arc::new(MemoryBlockSource::new());
    let validator = ValidatorClientBuilder::new(fast_config(), flaky.clone(), p2p.clone(), blocks)
        .key_store(my_key())
        .build()
        .unwrap();
    let txs = txs(1);
    p2p.add_tx(txs[0].clone());

    flaky.set_failing(true);
    let proposal = proposal_with(proposer_key(), 1, SLOT, Hash32::ZERO, &txs);
    assert!(validator.attest_to_proposal(&proposal).await.is_none());
    assert_eq!(validator.metrics().failed_attestations("collaborator_error"), 1);
    assert_eq!(p2p.pool_queries(), 0);

    flaky.set_failing(false);
    validator.register_block_builder(Arc::new(DevBlockBuilder::new()));
    assert!(validator.attest_to_proposal(&proposal).await.is_some());
}

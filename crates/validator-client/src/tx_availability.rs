//! Transaction availability check
//!
//! Local pool first, then a network fetch for whatever is missing. Most of the
//! time gossip has already delivered every transaction and no request is sent.

use crate::error::ValidatorError;
use crate::p2p::P2pClient;
use l2_types::TxHash;

/// Make sure every hash in `tx_hashes` is held locally or can be fetched.
///
/// On failure the error carries only the hashes that are still missing after
/// the network request.
pub async fn ensure_transactions_are_available(
    p2p: &dyn P2pClient,
    tx_hashes: &[TxHash],
) -> Result<(), ValidatorError> {
    if tx_hashes.is_empty() {
        return Ok(());
    }

    let availability = p2p
        .has_txs_in_pool(tx_hashes)
        .await
        .map_err(ValidatorError::Collaborator)?;

    let missing: Vec<TxHash> = tx_hashes
        .iter()
        .enumerate()
        .filter(|(i, _)| !availability.get(*i).copied().unwrap_or(false))
        .map(|(_, hash)| *hash)
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    tracing::debug!(
        "Missing {} transactions in the tx pool, requesting from the network",
        missing.len()
    );

    let requested = p2p
        .request_txs_by_hash(&missing)
        .await
        .map_err(ValidatorError::Collaborator)?;

    let still_missing: Vec<TxHash> = missing
        .iter()
        .enumerate()
        .filter(|(i, hash)| match requested.get(*i) {
            Some(Some(tx)) => tx.tx_hash() != **hash,
            _ => true,
        })
        .map(|(_, hash)| *hash)
        .collect();

    if still_missing.is_empty() {
        Ok(())
    } else {
        Err(ValidatorError::TransactionsNotAvailable(still_missing))
    }
}

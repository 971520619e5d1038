//! Idempotency ledger: idempotency key to the purchase it produced.
//!
//! The ledger is the unique `idempotency_key` column of purchases, so a key
//! is recorded in the same transaction as the purchase it belongs to.

use boxoffice_core::error::EngineError;
use boxoffice_core::store::{StoreTransaction, TicketStore};
use boxoffice_core::types::Purchase;

/// Longest accepted idempotency key, in characters.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

/// Trim a client key; blank keys count as absent.
pub(crate) fn normalize(key: Option<String>) -> Result<Option<String>, EngineError> {
    let Some(key) = key else {
        return Ok(None);
    };
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(EngineError::validation(format!(
            "idempotency key must be at most {MAX_IDEMPOTENCY_KEY_LEN} characters"
        )));
    }
    Ok(Some(trimmed.to_string()))
}

/// `FindByKey`: the purchase recorded under `key`, with its tickets.
pub(crate) async fn find_by_key(
    tx: &mut dyn StoreTransaction,
    key: Option<&str>,
) -> Result<Option<Purchase>, EngineError> {
    match key {
        Some(key) => Ok(tx.purchase_by_key(key).await?),
        None => Ok(None),
    }
}

/// After a failed attempt, look for a purchase a concurrent request committed
/// under the same key.
///
/// Runs in a fresh transaction since the failed one has been rolled back.
pub(crate) async fn recover_race(
    store: &dyn TicketStore,
    key: &str,
) -> Result<Option<Purchase>, EngineError> {
    let mut tx = store.begin().await?;
    let found = tx.purchase_by_key(key).await?;
    if let Err(error) = tx.rollback().await {
        super::log_rollback_failure(&error);
    }
    Ok(found)
}

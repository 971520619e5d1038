//! Pricing lookup: a show's unit price and start time.
//!
//! Every seat of a show costs the same. There is no dynamic pricing.

use boxoffice_core::error::EngineError;
use boxoffice_core::store::StoreTransaction;
use boxoffice_core::types::{Money, Show, ShowId};

/// Price of the seats being bought.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Quote {
    pub unit_price: Money,
    pub total: Money,
}

/// Load a show, failing with `NotFound` for unknown ids.
pub(crate) async fn load_show(
    tx: &mut dyn StoreTransaction,
    show_id: ShowId,
) -> Result<Show, EngineError> {
    tx.show(show_id)
        .await?
        .ok_or_else(|| EngineError::not_found("Show", show_id))
}

/// Load a show that is open for sale.
pub(crate) async fn active_show(
    tx: &mut dyn StoreTransaction,
    show_id: ShowId,
) -> Result<Show, EngineError> {
    let show = load_show(tx, show_id).await?;
    if !show.active {
        return Err(EngineError::validation(format!(
            "show {show_id} is not open for sale"
        )));
    }
    Ok(show)
}

/// Price `seat_count` seats of `show`.
pub(crate) fn quote(show: &Show, seat_count: usize) -> Result<Quote, EngineError> {
    let unit_price = show.unit_price;
    let total = u64::try_from(seat_count)
        .ok()
        .and_then(|count| unit_price.checked_multiply(count))
        .ok_or_else(|| EngineError::validation("purchase total is out of range"))?;
    Ok(Quote { unit_price, total })
}

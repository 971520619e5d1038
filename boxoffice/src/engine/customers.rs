//! Customer resolver: find-or-create the buyer of a purchase.

use boxoffice_core::error::EngineError;
use boxoffice_core::store::StoreTransaction;
use boxoffice_core::types::{Customer, CustomerId, CustomerIdentity, RegisteredCustomer};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Provider recorded on anonymous box-office customers.
pub const WALK_IN_PROVIDER: &str = "box-office";

/// Display name given to walk-ins that did not leave one.
pub const WALK_IN_NAME: &str = "Walk-in";

/// Reject a registered identity whose provider or subject is blank.
pub(crate) fn validate_registered(identity: &RegisteredCustomer) -> Result<(), EngineError> {
    if identity.provider.trim().is_empty() || identity.subject.trim().is_empty() {
        return Err(EngineError::validation(
            "customer provider and subject are required",
        ));
    }
    Ok(())
}

/// Check the buyer of a sale without touching the store. Walk-ins need nothing.
pub(crate) fn validate(identity: Option<&CustomerIdentity>) -> Result<(), EngineError> {
    match identity {
        Some(CustomerIdentity::Registered(registered)) => validate_registered(registered),
        Some(CustomerIdentity::WalkIn { .. }) | None => Ok(()),
    }
}

/// Resolve a registered identity to its customer record.
///
/// Creates the record on first sight; later calls refresh email and name
/// when the identity carries them.
pub(crate) async fn resolve_registered(
    tx: &mut dyn StoreTransaction,
    identity: &RegisteredCustomer,
    now: DateTime<Utc>,
) -> Result<Customer, EngineError> {
    validate_registered(identity)?;
    let provider = identity.provider.trim();
    let subject = identity.subject.trim();

    let candidate = Customer {
        id: CustomerId::new(),
        provider: provider.to_string(),
        subject: subject.to_string(),
        email: non_blank(identity.email.as_deref()),
        name: non_blank(identity.name.as_deref()),
        walk_in: false,
        created_at: now,
    };
    Ok(tx.upsert_customer(&candidate).await?)
}

/// Resolve the buyer of a sale; `None` means an anonymous walk-in.
pub(crate) async fn resolve(
    tx: &mut dyn StoreTransaction,
    identity: Option<&CustomerIdentity>,
    now: DateTime<Utc>,
) -> Result<Customer, EngineError> {
    match identity {
        Some(CustomerIdentity::Registered(registered)) => {
            resolve_registered(tx, registered, now).await
        }
        Some(CustomerIdentity::WalkIn { email, name }) => {
            let walk_in = walk_in(email.as_deref(), name.as_deref(), now);
            Ok(tx.upsert_customer(&walk_in).await?)
        }
        None => Ok(tx.upsert_customer(&walk_in(None, None, now)).await?),
    }
}

/// A fresh walk-in record; each anonymous sale gets its own.
fn walk_in(email: Option<&str>, name: Option<&str>, now: DateTime<Utc>) -> Customer {
    Customer {
        id: CustomerId::new(),
        provider: WALK_IN_PROVIDER.to_string(),
        subject: format!("walk-in:{}", Uuid::new_v4()),
        email: non_blank(email),
        name: non_blank(name).or_else(|| Some(WALK_IN_NAME.to_string())),
        walk_in: true,
        created_at: now,
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

//! Domain types for the box office engine.
//!
//! Value objects (identifiers, [`Money`]), the persisted records the engine
//! reads and writes ([`Show`], [`ShowSeat`], [`Purchase`], [`Ticket`],
//! [`Customer`]) and the state enums with their stable wire/database names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            #[doc = concat!("Wrap a raw integer as a `", stringify!($name), "`")]
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the raw integer
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

integer_id!(
    /// Identifier of a scheduled screening.
    ShowId
);
integer_id!(
    /// Identifier of a physical seat. Opaque to the engine, scoped by the show's seat map.
    SeatId
);
integer_id!(
    /// Identifier of the per-show inventory row for one seat.
    ShowSeatId
);
integer_id!(
    /// Identifier of the room a show plays in.
    RoomId
);
uuid_id!(
    /// Identifier of a purchase (paid or pending).
    PurchaseId
);
uuid_id!(
    /// Identifier of a single ticket line.
    TicketId
);
uuid_id!(
    /// Identifier of a customer record.
    CustomerId
);

// ============================================================================
// Money Value Object (cents-based to avoid floating point errors)
// ============================================================================

/// Fixed-point amount with two fractional digits, stored as integer cents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Multiplies money by a quantity with overflow checking
    #[must_use]
    pub const fn checked_multiply(self, quantity: u64) -> Option<Self> {
        match self.0.checked_mul(quantity) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Sums an iterator of amounts, `None` on overflow.
    pub fn checked_sum<I>(amounts: I) -> Option<Self>
    where
        I: IntoIterator<Item = Self>,
    {
        amounts
            .into_iter()
            .try_fold(Self::ZERO, Self::checked_add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// State enums
// ============================================================================

/// A stored or submitted name did not match any known variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Inventory state of one seat for one show.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatState {
    /// Free to claim.
    Available,
    /// Claimed by a pending reservation until `hold_expiry`.
    Held,
    /// Paid for. Terminal.
    Sold,
}

impl SeatState {
    /// Database/wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "AVAILABLE",
            Self::Held => "HELD",
            Self::Sold => "SOLD",
        }
    }

    /// Parse from the database/wire name.
    ///
    /// # Errors
    ///
    /// Returns [`ParseEnumError`] for unknown names.
    pub fn parse(s: &str) -> Result<Self, ParseEnumError> {
        match s {
            "AVAILABLE" => Ok(Self::Available),
            "HELD" => Ok(Self::Held),
            "SOLD" => Ok(Self::Sold),
            _ => Err(ParseEnumError::new("seat state", s)),
        }
    }
}

/// Lifecycle of a purchase header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseState {
    /// Reservation whose tickets are still held.
    Pending,
    /// Every ticket issued.
    Paid,
    /// Every held ticket was voided after its hold lapsed.
    Cancelled,
}

impl PurchaseState {
    /// Database/wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Parse from the database/wire name.
    ///
    /// # Errors
    ///
    /// Returns [`ParseEnumError`] for unknown names.
    pub fn parse(s: &str) -> Result<Self, ParseEnumError> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PAID" => Ok(Self::Paid),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(ParseEnumError::new("purchase state", s)),
        }
    }
}

/// Lifecycle of a ticket line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketState {
    /// Backs a hold; no redemption code yet.
    Held,
    /// Paid and redeemable.
    Issued,
    /// Hold lapsed and the seat went back to inventory.
    Void,
}

impl TicketState {
    /// Database/wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Held => "HELD",
            Self::Issued => "ISSUED",
            Self::Void => "VOID",
        }
    }

    /// Parse from the database/wire name.
    ///
    /// # Errors
    ///
    /// Returns [`ParseEnumError`] for unknown names.
    pub fn parse(s: &str) -> Result<Self, ParseEnumError> {
        match s {
            "HELD" => Ok(Self::Held),
            "ISSUED" => Ok(Self::Issued),
            "VOID" => Ok(Self::Void),
            _ => Err(ParseEnumError::new("ticket state", s)),
        }
    }

    /// `true` for tickets that still occupy their seat.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        !matches!(self, Self::Void)
    }
}

/// Declared payment method. The engine records it; it never settles payments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Cash at the box office. Also the placeholder on pending reservations.
    Cash,
    /// Card payment.
    Card,
    /// `PayPal` payment.
    #[serde(rename = "PAYPAL")]
    PayPal,
}

impl PaymentMethod {
    /// Database/wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "CASH",
            Self::Card => "CARD",
            Self::PayPal => "PAYPAL",
        }
    }

    /// Parse a method name, ignoring ASCII case and surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`ParseEnumError`] for unknown methods.
    pub fn parse(s: &str) -> Result<Self, ParseEnumError> {
        let trimmed = s.trim();
        [Self::Cash, Self::Card, Self::PayPal]
            .into_iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseEnumError::new("payment method", s))
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Records
// ============================================================================

/// A scheduled screening. Read-only to the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Show {
    /// Show identifier
    pub id: ShowId,
    /// Room the show plays in
    pub room_id: RoomId,
    /// Start of the screening
    pub starts_at: DateTime<Utc>,
    /// End of the screening
    pub ends_at: DateTime<Utc>,
    /// Price of every seat
    pub unit_price: Money,
    /// Inactive shows accept no sales or reservations
    pub active: bool,
}

/// Physical seat layout entry, provisioned outside the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    /// Seat identifier
    pub id: SeatId,
    /// Row label (e.g. "A")
    pub row: String,
    /// Column number within the row
    pub column: i32,
    /// Seat category (e.g. "STANDARD", "VIP")
    pub seat_type: String,
}

/// The inventory unit: one seat for one show.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowSeat {
    /// Row identifier
    pub id: ShowSeatId,
    /// Show the row belongs to
    pub show_id: ShowId,
    /// Seat the row tracks
    pub seat_id: SeatId,
    /// Row label of the seat
    pub row: String,
    /// Column number of the seat
    pub column: i32,
    /// Seat category
    pub seat_type: String,
    /// Stored state
    pub state: SeatState,
    /// Meaningful only while `state` is `Held`
    pub hold_expiry: Option<DateTime<Utc>>,
}

/// One seat line of a purchase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Ticket identifier
    pub id: TicketId,
    /// Owning purchase
    pub purchase_id: PurchaseId,
    /// Inventory row backing the ticket
    pub show_seat_id: ShowSeatId,
    /// Seat backing the ticket
    pub seat_id: SeatId,
    /// Price charged for this seat
    pub unit_price: Money,
    /// Ticket state
    pub state: TicketState,
    /// Opaque redemption code, present once issued
    pub code: Option<String>,
}

/// A financial transaction covering one or more seats of one show.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    /// Purchase identifier
    pub id: PurchaseId,
    /// Buyer
    pub customer_id: CustomerId,
    /// Show the seats belong to
    pub show_id: ShowId,
    /// Sum of every ticket's unit price
    pub total: Money,
    /// Purchase state
    pub state: PurchaseState,
    /// Declared payment method (`Cash` placeholder while pending)
    pub payment_method: PaymentMethod,
    /// Client-supplied retry token, unique when present
    pub idempotency_key: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Ticket lines, ordered by seat
    pub tickets: Vec<Ticket>,
}

impl Purchase {
    /// Sum of the ticket prices, `None` on overflow.
    #[must_use]
    pub fn ticket_total(&self) -> Option<Money> {
        Money::checked_sum(self.tickets.iter().map(|ticket| ticket.unit_price))
    }

    /// `true` when `total` equals the sum of ticket prices.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.ticket_total() == Some(self.total)
    }

    /// Seats backed by this purchase's tickets.
    #[must_use]
    pub fn seat_ids(&self) -> Vec<SeatId> {
        self.tickets.iter().map(|ticket| ticket.seat_id).collect()
    }
}

/// A customer record owning purchases.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Customer identifier
    pub id: CustomerId,
    /// Identity provider (e.g. "google", or the box office for walk-ins)
    pub provider: String,
    /// Subject within the provider, unique per provider
    pub subject: String,
    /// Contact email
    pub email: Option<String>,
    /// Display name
    pub name: Option<String>,
    /// Anonymous box-office customer
    pub walk_in: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Identity asserted by the upstream authentication layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredCustomer {
    /// Identity provider
    pub provider: String,
    /// Subject within the provider
    pub subject: String,
    /// Email, refreshed on every purchase when present
    pub email: Option<String>,
    /// Display name, refreshed on every purchase when present
    pub name: Option<String>,
}

/// Who is buying.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CustomerIdentity {
    /// An authenticated account.
    Registered(RegisteredCustomer),
    /// An anonymous box-office customer; a fresh record is created per sale.
    WalkIn {
        /// Optional contact email
        email: Option<String>,
        /// Optional display name
        name: Option<String>,
    },
}

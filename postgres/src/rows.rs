//! Row structs and their conversion into domain records.

use boxoffice_core::error::StoreError;
use boxoffice_core::types::{
    Customer, CustomerId, Money, PaymentMethod, Purchase, PurchaseId, PurchaseState, RoomId,
    SeatId, SeatState, Show, ShowId, ShowSeat, ShowSeatId, Ticket, TicketId, TicketState,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub(crate) fn money_from_cents(cents: i64) -> Result<Money, StoreError> {
    u64::try_from(cents)
        .map(Money::from_cents)
        .map_err(|_| StoreError::Corrupt(format!("Negative amount: {cents}")))
}

pub(crate) fn cents_from_money(money: Money) -> Result<i64, StoreError> {
    i64::try_from(money.cents())
        .map_err(|_| StoreError::Database(format!("Amount out of range: {money}")))
}

/// Map an sqlx error, keeping unique violations distinguishable.
pub(crate) fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |e| {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return StoreError::DuplicateKey(format!("{context}: {e}"));
            }
        }
        StoreError::Database(format!("{context}: {e}"))
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ShowRow {
    pub id: i64,
    pub room_id: i64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub unit_price_cents: i64,
    pub active: bool,
}

impl TryFrom<ShowRow> for Show {
    type Error = StoreError;

    fn try_from(row: ShowRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ShowId::new(row.id),
            room_id: RoomId::new(row.room_id),
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            unit_price: money_from_cents(row.unit_price_cents)?,
            active: row.active,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ShowSeatRow {
    pub id: i64,
    pub show_id: i64,
    pub seat_id: i64,
    pub seat_row: String,
    pub seat_column: i32,
    pub seat_type: String,
    pub state: String,
    pub hold_expiry: Option<DateTime<Utc>>,
}

impl TryFrom<ShowSeatRow> for ShowSeat {
    type Error = StoreError;

    fn try_from(row: ShowSeatRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ShowSeatId::new(row.id),
            show_id: ShowId::new(row.show_id),
            seat_id: SeatId::new(row.seat_id),
            row: row.seat_row,
            column: row.seat_column,
            seat_type: row.seat_type,
            state: SeatState::parse(&row.state)?,
            hold_expiry: row.hold_expiry,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct TicketRow {
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub show_seat_id: i64,
    pub seat_id: i64,
    pub unit_price_cents: i64,
    pub state: String,
    pub code: Option<String>,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = StoreError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: TicketId::from_uuid(row.id),
            purchase_id: PurchaseId::from_uuid(row.purchase_id),
            show_seat_id: ShowSeatId::new(row.show_seat_id),
            seat_id: SeatId::new(row.seat_id),
            unit_price: money_from_cents(row.unit_price_cents)?,
            state: TicketState::parse(&row.state)?,
            code: row.code,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PurchaseRow {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub show_id: i64,
    pub total_cents: i64,
    pub state: String,
    pub payment_method: String,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PurchaseRow {
    pub(crate) fn into_purchase(self, tickets: Vec<Ticket>) -> Result<Purchase, StoreError> {
        Ok(Purchase {
            id: PurchaseId::from_uuid(self.id),
            customer_id: CustomerId::from_uuid(self.customer_id),
            show_id: ShowId::new(self.show_id),
            total: money_from_cents(self.total_cents)?,
            state: PurchaseState::parse(&self.state)?,
            payment_method: PaymentMethod::parse(&self.payment_method)?,
            idempotency_key: self.idempotency_key,
            created_at: self.created_at,
            tickets,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CustomerRow {
    pub id: Uuid,
    pub provider: String,
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub walk_in: bool,
    pub created_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Self {
            id: CustomerId::from_uuid(row.id),
            provider: row.provider,
            subject: row.subject,
            email: row.email,
            name: row.name,
            walk_in: row.walk_in,
            created_at: row.created_at,
        }
    }
}

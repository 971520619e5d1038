//! Show and seat-map fixtures.

use crate::memory::InMemoryTicketStore;
use boxoffice_core::types::{Money, RoomId, Seat, SeatId, Show, ShowId};
use chrono::{DateTime, Duration, Utc};

/// Builder for a show and its seat map.
///
/// Defaults: room 1, starts two hours after the Unix epoch, runs two hours,
/// 9.00 per seat, active, no seats.
#[derive(Debug, Clone)]
pub struct ShowFixture {
    show: Show,
    seats: Vec<Seat>,
}

impl ShowFixture {
    /// Start a fixture for `show_id`.
    #[must_use]
    pub fn new(show_id: i64) -> Self {
        let starts_at = DateTime::<Utc>::default() + Duration::hours(2);
        Self {
            show: Show {
                id: ShowId::new(show_id),
                room_id: RoomId::new(1),
                starts_at,
                ends_at: starts_at + Duration::hours(2),
                unit_price: Money::from_cents(900),
                active: true,
            },
            seats: Vec::new(),
        }
    }

    /// Start the show `hours` after `now`; keeps a two hour runtime.
    #[must_use]
    pub fn starting_in_hours(mut self, now: DateTime<Utc>, hours: i64) -> Self {
        self.show.starts_at = now + Duration::hours(hours);
        self.show.ends_at = self.show.starts_at + Duration::hours(2);
        self
    }

    /// Start the show at an absolute instant; keeps a two hour runtime.
    #[must_use]
    pub fn starting_at(mut self, starts_at: DateTime<Utc>) -> Self {
        self.show.starts_at = starts_at;
        self.show.ends_at = starts_at + Duration::hours(2);
        self
    }

    /// Set the seat price.
    #[must_use]
    pub const fn price(mut self, unit_price: Money) -> Self {
        self.show.unit_price = unit_price;
        self
    }

    /// Mark the show inactive.
    #[must_use]
    pub const fn inactive(mut self) -> Self {
        self.show.active = false;
        self
    }

    /// Add seats with the given ids, laid out ten per row starting at row "A".
    #[must_use]
    pub fn seats(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        for id in ids {
            let index = self.seats.len();
            self.seats.push(Seat {
                id: SeatId::new(id),
                row: row_label(index / 10),
                column: i32::try_from(index % 10 + 1).unwrap_or(i32::MAX),
                seat_type: "STANDARD".to_string(),
            });
        }
        self
    }

    /// The show record.
    #[must_use]
    pub const fn show(&self) -> &Show {
        &self.show
    }

    /// The seat layout.
    #[must_use]
    pub fn seat_layout(&self) -> &[Seat] {
        &self.seats
    }

    /// Provision the show and its seat map in an in-memory store.
    pub async fn provision(&self, store: &InMemoryTicketStore) {
        store.provision_show(self.show.clone(), &self.seats).await;
    }
}

fn row_label(index: usize) -> String {
    let letter = u8::try_from(index % 26).map_or('A', |offset| char::from(b'A' + offset));
    if index < 26 {
        letter.to_string()
    } else {
        format!("{letter}{}", index / 26)
    }
}

//! # Box Office Testing
//!
//! Test doubles and fixtures for the box office engine.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - An in-memory [`InMemoryTicketStore`] implementing the store port
//! - Show and seat-map fixtures
//! - proptest strategies for seat selections
//!
//! ## Example
//!
//! ```ignore
//! use boxoffice_testing::{InMemoryTicketStore, ShowFixture, ManualClock};
//!
//! #[tokio::test]
//! async fn sells_a_seat() {
//!     let clock = ManualClock::starting_at(test_clock().now());
//!     let fixture = ShowFixture::new(1).starting_in_hours(clock.now(), 2).seats(1..=3);
//!     let store = InMemoryTicketStore::new();
//!     fixture.provision(&store).await;
//!     // build the engine over `store` and `clock`...
//! }
//! ```

use boxoffice_core::environment::Clock;
use chrono::{DateTime, Utc};

pub mod fixtures;
pub mod memory;

/// Mock implementations of Environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use chrono::Duration;
    use std::sync::{Arc, Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use boxoffice_testing::mocks::FixedClock;
    /// use boxoffice_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when a test tells it to.
    ///
    /// Clones share the same instant, so a test can keep one handle and give
    /// another to the engine.
    ///
    /// ```
    /// use boxoffice_testing::mocks::{ManualClock, test_clock};
    /// use boxoffice_core::environment::Clock;
    /// use chrono::Duration;
    ///
    /// let clock = ManualClock::starting_at(test_clock().now());
    /// let engine_clock = clock.clone();
    /// clock.advance(Duration::minutes(90));
    /// assert_eq!(engine_clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a clock frozen at `time`.
        #[must_use]
        pub fn starting_at(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward (or backward, for a negative delta).
        pub fn advance(&self, delta: Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += delta;
        }

        /// Jump to an absolute instant.
        pub fn set(&self, instant: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = instant;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use boxoffice_core::types::{Money, SeatId};
    use proptest::prelude::*;
    use proptest::sample::subsequence;

    /// Non-empty, duplicate-free selections drawn from seats `1..=seat_count`.
    pub fn seat_selection(seat_count: i64, max_len: usize) -> impl Strategy<Value = Vec<SeatId>> {
        let seats: Vec<SeatId> = (1..=seat_count).map(SeatId::new).collect();
        let upper = max_len.min(seats.len()).max(1);
        subsequence(seats, 1..=upper)
    }

    /// Ticket prices from free seats up to 100.00.
    pub fn unit_price() -> impl Strategy<Value = Money> {
        (0u64..=10_000).prop_map(Money::from_cents)
    }
}

// Re-export commonly used items
pub use fixtures::ShowFixture;
pub use memory::InMemoryTicketStore;
pub use mocks::{FixedClock, ManualClock, test_clock};

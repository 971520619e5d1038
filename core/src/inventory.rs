//! Seat state machine.
//!
//! ```text
//!             claim(Reclaimable → Held{expiry})
//!   AVAILABLE ─────────────────────────────────▶ HELD
//!       │  ▲                                       │
//!       │  └──── release / reclaim once expired ───┤
//!       │                                          │ claim(ActiveHold → Sold)
//!       └── claim(Reclaimable → Sold) ──▶ SOLD ◀───┘
//! ```
//!
//! Every mutation of a [`ShowSeat`] goes through a compare-and-set claim:
//! the store updates only rows matching a [`ClaimRule`] at the instant `now`,
//! and reports how many rows moved. The rules are defined here once and
//! mirrored by each store implementation (the Postgres adapter expresses the
//! same predicates in SQL).

use crate::types::{SeatId, SeatState, ShowSeat, ShowSeatId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which current states a seat may be in to be claimed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimRule {
    /// `AVAILABLE`, or `HELD` with `hold_expiry <= now`.
    ///
    /// A `HELD` row without an expiry counts as expired.
    Reclaimable,
    /// `HELD` with `hold_expiry > now`.
    ActiveHold,
}

/// Where a claimed seat ends up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeatTarget {
    /// Held for a pending reservation until the given instant.
    Held {
        /// When the hold lapses.
        expiry: DateTime<Utc>,
    },
    /// Sold; clears any hold expiry.
    Sold,
}

impl SeatTarget {
    /// State written by the claim.
    #[must_use]
    pub const fn state(&self) -> SeatState {
        match self {
            Self::Held { .. } => SeatState::Held,
            Self::Sold => SeatState::Sold,
        }
    }

    /// Expiry written by the claim.
    #[must_use]
    pub const fn hold_expiry(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Held { expiry } => Some(*expiry),
            Self::Sold => None,
        }
    }
}

/// An inventory row moved by a claim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClaimedSeat {
    /// Inventory row
    pub id: ShowSeatId,
    /// Seat the row tracks
    pub seat_id: SeatId,
}

impl From<&ShowSeat> for ClaimedSeat {
    fn from(seat: &ShowSeat) -> Self {
        Self {
            id: seat.id,
            seat_id: seat.seat_id,
        }
    }
}

impl ShowSeat {
    /// `true` while the seat is held and the hold has not lapsed at `now`.
    #[must_use]
    pub fn has_active_hold(&self, now: DateTime<Utc>) -> bool {
        self.state == SeatState::Held && self.hold_expiry.is_some_and(|expiry| expiry > now)
    }

    /// `true` when the seat is held but the hold lapsed at or before `now`.
    #[must_use]
    pub fn has_expired_hold(&self, now: DateTime<Utc>) -> bool {
        self.state == SeatState::Held && !self.has_active_hold(now)
    }

    /// Whether a claim under `rule` would move this seat at `now`.
    #[must_use]
    pub fn is_claimable(&self, rule: ClaimRule, now: DateTime<Utc>) -> bool {
        match rule {
            ClaimRule::Reclaimable => {
                self.state == SeatState::Available || self.has_expired_hold(now)
            }
            ClaimRule::ActiveHold => self.has_active_hold(now),
        }
    }

    /// Compare-and-set: move the seat to `target` if `rule` allows it at `now`.
    ///
    /// Returns `true` when the seat moved.
    pub fn claim(&mut self, rule: ClaimRule, target: SeatTarget, now: DateTime<Utc>) -> bool {
        if !self.is_claimable(rule, now) {
            return false;
        }
        self.state = target.state();
        self.hold_expiry = target.hold_expiry();
        true
    }

    /// Return an expired hold to inventory. Returns `true` when the seat moved.
    pub fn release_if_expired(&mut self, now: DateTime<Utc>) -> bool {
        if !self.has_expired_hold(now) {
            return false;
        }
        self.state = SeatState::Available;
        self.hold_expiry = None;
        true
    }

    /// State as seen by a buyer at `now`: a lapsed hold reads as available.
    #[must_use]
    pub fn effective_state(&self, now: DateTime<Utc>) -> SeatState {
        if self.has_expired_hold(now) {
            SeatState::Available
        } else {
            self.state
        }
    }
}

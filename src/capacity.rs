//! Capacity tracking for mentors and events.
//!
//! A [`CapacityTracker`] maintains one counter per `(resource, window)` pair
//! and hands out [`ReservationToken`]s for successful reservations. All
//! mutation of committed counts goes through [`reserve`](CapacityTracker::reserve)
//! and [`release`](CapacityTracker::release); no other component touches the
//! counters directly.
//!
//! Atomicity is per counter key: `reserve` performs its read-check-increment
//! while holding the dashmap shard entry for that key, so two concurrent
//! reservations against the same mentor cannot both slip past the limit, and
//! reservations against unrelated resources never contend on a shared lock.

use chrono::{DateTime, Datelike, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{Error, Result};

/// The accounting window a counter applies to.
///
/// Mentor capacity is counted per calendar month (a reservation created in
/// month M counts against M only); event seats are counted for the lifetime
/// of the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapacityWindow {
    Month { year: i32, month: u32 },
    Lifetime,
}

impl CapacityWindow {
    /// The month window a timestamp falls into.
    pub fn month_of(at: DateTime<Utc>) -> Self {
        CapacityWindow::Month {
            year: at.year(),
            month: at.month(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CounterKey {
    resource_id: Uuid,
    window: CapacityWindow,
}

/// Proof of a successful reservation; required to release the slot later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationToken {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub window: CapacityWindow,
}

/// Per-resource committed-count bookkeeping with atomic reserve/release.
#[derive(Default)]
pub struct CapacityTracker {
    counters: DashMap<CounterKey, u32>,
    /// Tokens that currently count against a counter. Release is idempotent
    /// because a token can only be removed from this map once.
    live_tokens: DashMap<Uuid, CounterKey>,
}

impl CapacityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim one slot against `resource_id` within `window`.
    ///
    /// Fails with [`Error::CapacityExceeded`] without mutating anything when
    /// the committed count has already reached `max_capacity`.
    pub fn reserve(&self, resource_id: Uuid, window: CapacityWindow, max_capacity: u32) -> Result<ReservationToken> {
        let key = CounterKey { resource_id, window };
        let mut committed = self.counters.entry(key).or_insert(0);
        if *committed >= max_capacity {
            return Err(Error::CapacityExceeded {
                resource_id,
                max: max_capacity,
            });
        }
        *committed += 1;
        drop(committed);

        let token = ReservationToken {
            id: Uuid::new_v4(),
            resource_id,
            window,
        };
        self.live_tokens.insert(token.id, key);
        tracing::debug!(resource = %resource_id, token = %token.id, "reserved capacity slot");
        Ok(token)
    }

    /// Return a slot to the pool. Releasing an unknown or already-released
    /// token is a no-op, so duplicate rollback paths cannot double-decrement.
    pub fn release(&self, token_id: Uuid) {
        let Some((_, key)) = self.live_tokens.remove(&token_id) else {
            tracing::debug!(token = %token_id, "release of unknown token ignored");
            return;
        };
        if let Some(mut committed) = self.counters.get_mut(&key) {
            *committed = committed.saturating_sub(1);
        }
        tracing::debug!(resource = %key.resource_id, token = %token_id, "released capacity slot");
    }

    /// Confirm that a reservation settled successfully. The slot keeps
    /// counting against the window until it lapses, so this does not touch
    /// the counter.
    pub fn commit(&self, token_id: Uuid) {
        if !self.live_tokens.contains_key(&token_id) {
            tracing::warn!(token = %token_id, "commit of unknown token ignored");
        }
    }

    /// Current committed count for a resource within a window.
    pub fn committed(&self, resource_id: Uuid, window: CapacityWindow) -> u32 {
        let key = CounterKey { resource_id, window };
        self.counters.get(&key).map(|c| *c).unwrap_or(0)
    }
}

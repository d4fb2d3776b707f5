//! In-memory reservation record store.
//!
//! Records are created by the match/registration entry points, have their
//! `status` mutated exclusively by the lifecycle state machine, and are never
//! destroyed: terminal records persist for audit. The store also enforces the
//! event-registration uniqueness constraint - at most one non-cancelled
//! registration per `(event, participant)` pair - atomically at insert time.

use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::RefMut;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::capacity::{CapacityWindow, ReservationToken};
use crate::errors::{Error, Result};
use crate::types::{ParticipantId, ReservationId};

/// Lifecycle status of a reservation. `Completed` and `Cancelled` are
/// terminal; no transition leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ReservationStatus::Completed | ReservationStatus::Cancelled)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Active => "active",
            ReservationStatus::Completed => "completed",
            ReservationStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Mentorship-specific reservation payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentorshipDetails {
    pub topic: String,
    pub description: String,
    pub hours_per_month: u32,
    /// Stamped when the mentorship activates
    pub start_date: Option<NaiveDate>,
    /// Stamped on completion or cancellation
    pub end_date: Option<NaiveDate>,
}

/// Event-registration-specific reservation payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDetails {
    pub fee: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReservationKind {
    Mentorship(MentorshipDetails),
    Event(EventDetails),
}

/// A claim against a scarce capacity-bound resource (mentor slot or event
/// seat) prior to payment confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    /// Student or registrant
    pub subject_id: ParticipantId,
    /// Mentor or event
    pub resource_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: ReservationStatus,
    /// Amount the settling payment intent must carry
    pub amount: Decimal,
    /// Capacity token claimed at creation; released on cancellation
    pub capacity_token: Uuid,
    pub capacity_window: CapacityWindow,
    pub kind: ReservationKind,
}

impl Reservation {
    pub fn new_mentorship(
        student_id: ParticipantId,
        mentor_id: Uuid,
        token: &ReservationToken,
        amount: Decimal,
        details: MentorshipDetails,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject_id: student_id,
            resource_id: mentor_id,
            created_at: Utc::now(),
            status: ReservationStatus::Pending,
            amount,
            capacity_token: token.id,
            capacity_window: token.window,
            kind: ReservationKind::Mentorship(details),
        }
    }

    pub fn new_event_registration(
        participant_id: ParticipantId,
        event_id: Uuid,
        token: &ReservationToken,
        fee: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject_id: participant_id,
            resource_id: event_id,
            created_at: Utc::now(),
            status: ReservationStatus::Pending,
            amount: fee,
            capacity_token: token.id,
            capacity_window: token.window,
            kind: ReservationKind::Event(EventDetails { fee }),
        }
    }

    pub fn is_event_registration(&self) -> bool {
        matches!(self.kind, ReservationKind::Event(_))
    }
}

/// Record store with secondary indexes for matching and uniqueness checks.
#[derive(Default)]
pub struct RecordStore {
    reservations: DashMap<ReservationId, Reservation>,
    /// All reservation ids ever created against a resource, for audit and
    /// counter recomputation.
    by_resource: DashMap<Uuid, Vec<ReservationId>>,
    /// Non-cancelled event registrations keyed by (event, participant).
    /// Insert-time occupancy check enforces the uniqueness constraint.
    event_pairs: DashMap<(Uuid, ParticipantId), ReservationId>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly created mentorship reservation.
    pub fn insert_mentorship(&self, reservation: Reservation) {
        debug_assert!(!reservation.is_event_registration());
        self.index_resource(reservation.resource_id, reservation.id);
        self.reservations.insert(reservation.id, reservation);
    }

    /// Insert a freshly created event registration, enforcing the
    /// (event, participant) uniqueness constraint atomically.
    pub fn insert_event_registration(&self, reservation: Reservation) -> Result<()> {
        debug_assert!(reservation.is_event_registration());
        match self.event_pairs.entry((reservation.resource_id, reservation.subject_id)) {
            Entry::Occupied(_) => {
                return Err(Error::AlreadyRegistered {
                    resource_id: reservation.resource_id,
                    subject_id: reservation.subject_id,
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(reservation.id);
            }
        }
        self.index_resource(reservation.resource_id, reservation.id);
        self.reservations.insert(reservation.id, reservation);
        Ok(())
    }

    fn index_resource(&self, resource_id: Uuid, reservation_id: ReservationId) {
        self.by_resource.entry(resource_id).or_default().push(reservation_id);
    }

    pub fn get(&self, id: ReservationId) -> Option<Reservation> {
        self.reservations.get(&id).map(|r| r.clone())
    }

    /// Exclusive handle for status mutation; used only by the lifecycle
    /// state machine.
    pub(crate) fn get_mut(&self, id: ReservationId) -> Option<RefMut<'_, ReservationId, Reservation>> {
        self.reservations.get_mut(&id)
    }

    /// Free the (event, participant) pair when a registration is cancelled,
    /// so the participant may register again.
    pub(crate) fn release_event_pair(&self, event_id: Uuid, participant_id: ParticipantId, reservation_id: ReservationId) {
        self.event_pairs
            .remove_if(&(event_id, participant_id), |_, held| *held == reservation_id);
    }

    /// Whether a mentor already holds an active mentorship with this student.
    pub fn has_active_mentorship(&self, mentor_id: Uuid, student_id: ParticipantId) -> bool {
        let Some(ids) = self.by_resource.get(&mentor_id) else {
            return false;
        };
        ids.iter().any(|id| {
            self.reservations
                .get(id)
                .map(|r| {
                    r.status == ReservationStatus::Active && r.subject_id == student_id && !r.is_event_registration()
                })
                .unwrap_or(false)
        })
    }

    /// Pending reservations created before the cutoff, for the expiry sweep.
    pub fn pending_older_than(&self, cutoff: DateTime<Utc>) -> Vec<ReservationId> {
        self.reservations
            .iter()
            .filter(|r| r.status == ReservationStatus::Pending && r.created_at < cutoff)
            .map(|r| r.id)
            .collect()
    }

    /// Recompute the committed count for a resource window from the records
    /// themselves. The capacity counters are derived state and must always
    /// equal this.
    pub fn recount_committed(&self, resource_id: Uuid, window: CapacityWindow) -> u32 {
        let Some(ids) = self.by_resource.get(&resource_id) else {
            return 0;
        };
        ids.iter()
            .filter_map(|id| self.reservations.get(id))
            .filter(|r| r.capacity_window == window && r.status != ReservationStatus::Cancelled)
            .count() as u32
    }
}

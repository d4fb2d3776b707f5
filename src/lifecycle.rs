//! Reservation lifecycle state machine.
//!
//! Owns every status mutation: `pending -> active -> completed`,
//! `pending -> cancelled` (payment failure or timeout), and
//! `active -> cancelled` (manual termination). Terminal states absorb.
//!
//! Transition requests are idempotent where re-delivery is expected: a
//! transition that is already satisfied (confirming an already-active record,
//! cancelling an already-cancelled one) is a silent success reported as
//! [`Transition::AlreadySatisfied`]. A transition from an incompatible state
//! fails with `InvalidTransition` and is never applied.

use chrono::Utc;
use std::sync::Arc;

use crate::capacity::CapacityTracker;
use crate::errors::{Error, Result};
use crate::store::{RecordStore, Reservation, ReservationKind, ReservationStatus};
use crate::types::{ReservationId, abbrev_uuid};

/// Outcome of a transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// The record was already in the requested state; nothing changed.
    AlreadySatisfied,
}

pub struct LifecycleStateMachine {
    store: Arc<RecordStore>,
    tracker: Arc<CapacityTracker>,
}

impl LifecycleStateMachine {
    pub fn new(store: Arc<RecordStore>, tracker: Arc<CapacityTracker>) -> Self {
        Self { store, tracker }
    }

    /// `pending -> active`, driven by a verified successful payment event.
    #[tracing::instrument(skip(self), fields(reservation_id = %abbrev_uuid(&reservation_id)))]
    pub fn confirm_payment(&self, reservation_id: ReservationId) -> Result<Transition> {
        let mut record = self.record(reservation_id)?;
        match record.status {
            ReservationStatus::Pending => {
                record.status = ReservationStatus::Active;
                if let ReservationKind::Mentorship(details) = &mut record.kind {
                    details.start_date.get_or_insert_with(|| Utc::now().date_naive());
                }
                self.tracker.commit(record.capacity_token);
                tracing::info!("reservation activated");
                Ok(Transition::Applied)
            }
            ReservationStatus::Active => Ok(Transition::AlreadySatisfied),
            from => Err(Error::InvalidTransition {
                from,
                attempted: "confirm payment for",
            }),
        }
    }

    /// `pending -> cancelled` on a failed payment; releases the slot.
    #[tracing::instrument(skip(self), fields(reservation_id = %abbrev_uuid(&reservation_id)))]
    pub fn fail_payment(&self, reservation_id: ReservationId) -> Result<Transition> {
        self.cancel_pending(reservation_id, "fail payment for")
    }

    /// `pending -> cancelled` when no confirmation arrived within the expiry
    /// window; releases the slot so abandoned checkouts free capacity.
    #[tracing::instrument(skip(self), fields(reservation_id = %abbrev_uuid(&reservation_id)))]
    pub fn expire(&self, reservation_id: ReservationId) -> Result<Transition> {
        self.cancel_pending(reservation_id, "expire")
    }

    /// `active -> completed`. Administrative; the slot stays counted against
    /// the window.
    #[tracing::instrument(skip(self), fields(reservation_id = %abbrev_uuid(&reservation_id)))]
    pub fn complete(&self, reservation_id: ReservationId) -> Result<Transition> {
        let mut record = self.record(reservation_id)?;
        match record.status {
            ReservationStatus::Active => {
                record.status = ReservationStatus::Completed;
                if let ReservationKind::Mentorship(details) = &mut record.kind {
                    details.end_date = Some(Utc::now().date_naive());
                }
                tracing::info!("reservation completed");
                Ok(Transition::Applied)
            }
            ReservationStatus::Completed => Ok(Transition::AlreadySatisfied),
            from => Err(Error::InvalidTransition {
                from,
                attempted: "complete",
            }),
        }
    }

    /// `pending | active -> cancelled`; releases the slot.
    #[tracing::instrument(skip(self), fields(reservation_id = %abbrev_uuid(&reservation_id)))]
    pub fn cancel(&self, reservation_id: ReservationId) -> Result<Transition> {
        let mut record = self.record(reservation_id)?;
        match record.status {
            ReservationStatus::Pending | ReservationStatus::Active => {
                self.mark_cancelled(&mut record);
                tracing::info!("reservation cancelled");
                Ok(Transition::Applied)
            }
            ReservationStatus::Cancelled => Ok(Transition::AlreadySatisfied),
            from => Err(Error::InvalidTransition { from, attempted: "cancel" }),
        }
    }

    fn cancel_pending(&self, reservation_id: ReservationId, attempted: &'static str) -> Result<Transition> {
        let mut record = self.record(reservation_id)?;
        match record.status {
            ReservationStatus::Pending => {
                self.mark_cancelled(&mut record);
                tracing::info!("pending reservation cancelled");
                Ok(Transition::Applied)
            }
            ReservationStatus::Cancelled => Ok(Transition::AlreadySatisfied),
            from => Err(Error::InvalidTransition { from, attempted }),
        }
    }

    fn mark_cancelled(&self, record: &mut Reservation) {
        record.status = ReservationStatus::Cancelled;
        if let ReservationKind::Mentorship(details) = &mut record.kind {
            details.end_date = Some(Utc::now().date_naive());
        }
        self.tracker.release(record.capacity_token);
        if record.is_event_registration() {
            self.store
                .release_event_pair(record.resource_id, record.subject_id, record.id);
        }
    }

    fn record(&self, id: ReservationId) -> Result<dashmap::mapref::one::RefMut<'_, ReservationId, Reservation>> {
        self.store.get_mut(id).ok_or_else(|| Error::NotFound {
            resource: "reservation",
            id: id.to_string(),
        })
    }
}

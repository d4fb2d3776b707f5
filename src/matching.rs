//! Mentor-student matching.
//!
//! Candidate selection is deterministic: eligible mentors are ordered by
//! ascending committed count for the current month (load balancing), tie
//! broken by ascending mentor id. Matching and capacity reservation form a
//! single admission step - if the preferred mentor's reservation loses a race
//! and comes back `CapacityExceeded`, the next candidate is tried instead of
//! surfacing the race to the caller.

use chrono::Utc;
use std::sync::Arc;

use crate::capacity::{CapacityTracker, CapacityWindow, ReservationToken};
use crate::directory::{Branch, Directory, Participant, Role};
use crate::errors::{Error, Result};
use crate::store::RecordStore;
use crate::types::ParticipantId;

pub struct MatchingEngine {
    directory: Arc<dyn Directory>,
    tracker: Arc<CapacityTracker>,
    store: Arc<RecordStore>,
}

impl MatchingEngine {
    pub fn new(directory: Arc<dyn Directory>, tracker: Arc<CapacityTracker>, store: Arc<RecordStore>) -> Self {
        Self {
            directory,
            tracker,
            store,
        }
    }

    /// Find an eligible mentor for `student_id` in `branch` and reserve one
    /// of their slots for the current month.
    ///
    /// Returns the matched mentor together with the capacity token the
    /// caller must attach to the reservation record (or release if record
    /// creation fails).
    #[tracing::instrument(skip(self))]
    pub async fn match_student(&self, student_id: ParticipantId, branch: Branch) -> Result<(Participant, ReservationToken)> {
        let student = self.directory.lookup_participant(student_id).await?;
        if student.role != Role::Student {
            return Err(Error::BadRequest {
                message: format!("participant {student_id} is not a student"),
            });
        }

        let window = CapacityWindow::month_of(Utc::now());
        let mut candidates: Vec<Participant> = self
            .directory
            .list_mentors(branch)
            .await?
            .into_iter()
            .filter(|mentor| !self.store.has_active_mentorship(mentor.id, student_id))
            .collect();
        candidates.sort_by_key(|mentor| (self.tracker.committed(mentor.id, window), mentor.id));

        for mentor in candidates {
            match self.tracker.reserve(mentor.id, window, mentor.monthly_capacity) {
                Ok(token) => {
                    tracing::info!(student = %student_id, mentor = %mentor.id, "matched student to mentor");
                    return Ok((mentor, token));
                }
                // Lost the slot to a concurrent match; try the next candidate
                Err(Error::CapacityExceeded { .. }) => continue,
                Err(other) => return Err(other),
            }
        }

        Err(Error::NoMentorAvailable { branch })
    }
}

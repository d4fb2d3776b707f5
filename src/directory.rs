//! Read-only directory of participants and events.
//!
//! The directory is an external collaborator from the core's perspective: the
//! allocation and settlement machinery only ever queries it, never writes to
//! it. The [`Directory`] trait is the seam; [`InMemoryDirectory`] is the
//! implementation used by the binary (seeded from configuration) and by
//! tests.

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{Error, Result};
use crate::types::{EventId, ParticipantId};

/// Academic tracks offered by the college.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Branch {
    Cse,
    It,
    Ece,
    Eee,
    Me,
    Ce,
    Che,
    Ae,
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Branch::Cse => "CSE",
            Branch::It => "IT",
            Branch::Ece => "ECE",
            Branch::Eee => "EEE",
            Branch::Me => "ME",
            Branch::Ce => "CE",
            Branch::Che => "CHE",
            Branch::Ae => "AE",
        };
        write!(f, "{s}")
    }
}

/// Directory role of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Mentor,
    Student,
}

/// A mentor or student identity. Immutable from the core's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub role: Role,
    pub branch: Branch,
    /// Mentors must opt in before they are considered by the matching engine
    pub is_mentor: bool,
    /// How many students this mentor will take per calendar month
    pub monthly_capacity: u32,
    /// Mentorship rate per hour-per-month unit
    pub monthly_rate: Decimal,
}

/// A registrable event with a bounded number of seats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: EventId,
    pub title: String,
    pub registration_fee: Decimal,
    pub max_participants: u32,
    pub is_active: bool,
}

/// Read-only lookup of participants and events.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn lookup_participant(&self, id: ParticipantId) -> Result<Participant>;

    /// All opted-in mentors for a branch, in unspecified order.
    async fn list_mentors(&self, branch: Branch) -> Result<Vec<Participant>>;

    async fn lookup_event(&self, id: EventId) -> Result<EventSummary>;
}

/// Directory backed by in-process maps, seeded from configuration.
#[derive(Default)]
pub struct InMemoryDirectory {
    participants: DashMap<ParticipantId, Participant>,
    events: DashMap<EventId, EventSummary>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_participant(&self, participant: Participant) {
        self.participants.insert(participant.id, participant);
    }

    pub fn insert_event(&self, event: EventSummary) {
        self.events.insert(event.id, event);
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn lookup_participant(&self, id: ParticipantId) -> Result<Participant> {
        self.participants
            .get(&id)
            .map(|p| p.clone())
            .ok_or_else(|| Error::NotFound {
                resource: "participant",
                id: id.to_string(),
            })
    }

    async fn list_mentors(&self, branch: Branch) -> Result<Vec<Participant>> {
        Ok(self
            .participants
            .iter()
            .filter(|p| p.role == Role::Mentor && p.is_mentor && p.branch == branch)
            .map(|p| p.clone())
            .collect())
    }

    async fn lookup_event(&self, id: EventId) -> Result<EventSummary> {
        self.events.get(&id).map(|e| e.clone()).ok_or_else(|| Error::NotFound {
            resource: "event",
            id: id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn mentor(branch: Branch, is_mentor: bool) -> Participant {
        Participant {
            id: Uuid::new_v4(),
            name: "Asha Verma".to_string(),
            role: Role::Mentor,
            branch,
            is_mentor,
            monthly_capacity: 5,
            monthly_rate: Decimal::from(100),
        }
    }

    #[tokio::test]
    async fn test_list_mentors_filters_branch_and_flag() {
        let dir = InMemoryDirectory::new();
        let cse_mentor = mentor(Branch::Cse, true);
        dir.insert_participant(cse_mentor.clone());
        dir.insert_participant(mentor(Branch::Ece, true));
        dir.insert_participant(mentor(Branch::Cse, false)); // opted out

        let mentors = dir.list_mentors(Branch::Cse).await.unwrap();
        assert_eq!(mentors.len(), 1);
        assert_eq!(mentors[0].id, cse_mentor.id);
    }

    #[tokio::test]
    async fn test_lookup_participant_not_found() {
        let dir = InMemoryDirectory::new();
        let err = dir.lookup_participant(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { resource: "participant", .. }));
    }

    #[test]
    fn test_branch_serde_uses_uppercase_codes() {
        let json = serde_json::to_string(&Branch::Cse).unwrap();
        assert_eq!(json, r#""CSE""#);
        let branch: Branch = serde_json::from_str(r#""ECE""#).unwrap();
        assert_eq!(branch, Branch::Ece);
    }
}

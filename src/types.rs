//! Common type definitions shared across the settlement core.
//!
//! All entity IDs are UUIDs wrapped in type aliases for better type safety:
//!
//! - [`ParticipantId`]: a mentor, student, or other directory identity
//! - [`ReservationId`]: a claim against a capacity-bound resource
//! - [`EventId`]: an event whose seats are capacity-bound
//!
//! Resources (the things capacity is counted against) are identified by plain
//! [`uuid::Uuid`]s because a resource is either a mentor or an event depending
//! on the reservation kind.

use uuid::Uuid;

// Type aliases for IDs
pub type ParticipantId = Uuid;
pub type ReservationId = Uuid;
pub type EventId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

//! Request/response data structures for API communication.

pub mod matches;
pub mod registrations;
pub mod reservations;

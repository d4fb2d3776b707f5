//! Request/response models for mentor-student matching.

use serde::{Deserialize, Serialize};

use crate::api::models::reservations::PaymentIntentView;
use crate::directory::Branch;
use crate::store::ReservationStatus;
use crate::types::{ParticipantId, ReservationId};

/// Request body for `POST /api/v1/matches`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatchRequest {
    pub student_id: ParticipantId,
    pub branch: Branch,
    pub topic: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Defaults to `reservations.default_hours_per_month` when omitted
    #[serde(default)]
    pub hours_per_month: Option<u32>,
}

/// Response body for a successful match. `payment_intent` is absent when the
/// gateway was unreachable; the client retries via the reservation's
/// payment-intent endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResponse {
    pub reservation_id: ReservationId,
    pub mentor_id: ParticipantId,
    pub mentor_name: String,
    pub status: ReservationStatus,
    pub amount: rust_decimal::Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent: Option<PaymentIntentView>,
}

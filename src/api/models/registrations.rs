//! Request/response models for event registrations.

use serde::{Deserialize, Serialize};

use crate::api::models::reservations::PaymentIntentView;
use crate::store::ReservationStatus;
use crate::types::{EventId, ParticipantId, ReservationId};

/// Request body for `POST /api/v1/registrations`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistrationRequest {
    pub participant_id: ParticipantId,
    pub event_id: EventId,
}

/// Response body for a created registration. Zero-fee registrations come
/// back already `active` with no payment intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub reservation_id: ReservationId,
    pub event_id: EventId,
    pub status: ReservationStatus,
    pub amount: rust_decimal::Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent: Option<PaymentIntentView>,
}

//! HTTP request handlers for all API endpoints.
//!
//! Each handler is responsible for:
//! - Request validation and deserialization
//! - Business logic execution via the core components
//! - Response serialization
//!
//! # Handler Modules
//!
//! - [`matches`]: Mentor-student match requests
//! - [`registrations`]: Event seat registrations
//! - [`reservations`]: Reservation status, payment intent reissue, completion, cancellation
//! - [`webhook`]: Signed payment gateway callbacks
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`] which automatically converts to
//! appropriate HTTP status codes and JSON error responses.

use axum::Json;
use rust_decimal::Decimal;
use serde_json::{Value, json};

use crate::AppState;
use crate::broker::PaymentIntent;
use crate::errors::Error;
use crate::types::ReservationId;

pub mod matches;
pub mod registrations;
pub mod reservations;
pub mod webhook;

/// Health check endpoint.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Issue a payment intent for a freshly created reservation, tolerating
/// gateway unavailability.
///
/// The admission has already succeeded at this point - the reservation exists
/// and holds its capacity slot - so a gateway outage must not fail the
/// request. The client gets the reservation without an intent and retries via
/// the reservation's payment-intent endpoint; the expiry sweep bounds how
/// long an unpaid slot can be held.
pub(crate) async fn issue_intent(state: &AppState, reservation_id: ReservationId, amount: Decimal) -> Option<PaymentIntent> {
    match state
        .broker
        .create_intent(reservation_id, amount, &state.config.reservations.currency)
        .await
    {
        Ok(intent) => Some(intent),
        Err(Error::GatewayUnavailable { reason }) => {
            tracing::warn!(
                reservation = %reservation_id,
                reason,
                "gateway unavailable at admission; reservation created without intent"
            );
            None
        }
        Err(other) => {
            tracing::error!(reservation = %reservation_id, "intent creation failed: {other:#}");
            None
        }
    }
}

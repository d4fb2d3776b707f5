//! HTTP handlers for event registrations.

use axum::{Json, extract::State, http::StatusCode};

use crate::AppState;
use crate::api::handlers::issue_intent;
use crate::api::models::registrations::{RegistrationRequest, RegistrationResponse};
use crate::capacity::CapacityWindow;
use crate::errors::{Error, Result};
use crate::store::Reservation;

/// `POST /api/v1/registrations` - register a participant for an event,
/// claiming one of its bounded seats.
///
/// Zero-fee registrations activate immediately; paid ones come back
/// `pending` with a payment intent and settle via the gateway webhook.
#[tracing::instrument(skip(state, request), fields(participant = %request.participant_id, event = %request.event_id))]
pub async fn register_for_event(
    State(state): State<AppState>,
    Json(request): Json<RegistrationRequest>,
) -> Result<(StatusCode, Json<RegistrationResponse>)> {
    let participant = state.directory.lookup_participant(request.participant_id).await?;
    let event = state.directory.lookup_event(request.event_id).await?;
    if !event.is_active {
        return Err(Error::BadRequest {
            message: format!("event {} is not open for registration", event.id),
        });
    }

    // Seats are a lifetime pool, not a monthly window
    let token = state
        .tracker
        .reserve(event.id, CapacityWindow::Lifetime, event.max_participants)?;
    let reservation = Reservation::new_event_registration(participant.id, event.id, &token, event.registration_fee);
    let reservation_id = reservation.id;
    let amount = reservation.amount;

    if let Err(e) = state.store.insert_event_registration(reservation) {
        // Duplicate pair lost the slot it claimed; hand it back
        state.tracker.release(token.id);
        return Err(e);
    }

    let payment_intent = if event.registration_fee.is_zero() {
        // Nothing to collect; the registration is settled at admission
        state.lifecycle.confirm_payment(reservation_id)?;
        None
    } else {
        issue_intent(&state, reservation_id, amount).await
    };

    let status = state
        .store
        .get(reservation_id)
        .ok_or_else(|| Error::NotFound {
            resource: "reservation",
            id: reservation_id.to_string(),
        })?
        .status;

    Ok((
        StatusCode::CREATED,
        Json(RegistrationResponse {
            reservation_id,
            event_id: event.id,
            status,
            amount,
            payment_intent: payment_intent.map(Into::into),
        }),
    ))
}

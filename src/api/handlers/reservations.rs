//! HTTP handlers for reservation status and lifecycle endpoints.

use axum::{
    Json,
    extract::{Path, State},
};

use crate::AppState;
use crate::api::models::reservations::{PaymentIntentView, ReservationView};
use crate::errors::{Error, Result};
use crate::store::ReservationStatus;
use crate::types::ReservationId;

fn view(state: &AppState, reservation_id: ReservationId) -> Result<ReservationView> {
    let record = state.store.get(reservation_id).ok_or_else(|| Error::NotFound {
        resource: "reservation",
        id: reservation_id.to_string(),
    })?;
    let intent = state.broker.current_intent(reservation_id);
    Ok(ReservationView::from_record(record, intent))
}

/// `GET /api/v1/reservations/{id}` - current status of a reservation,
/// including its current payment intent if one exists.
pub async fn get_status(
    State(state): State<AppState>,
    Path(reservation_id): Path<ReservationId>,
) -> Result<Json<ReservationView>> {
    Ok(Json(view(&state, reservation_id)?))
}

/// `POST /api/v1/reservations/{id}/payment-intent` - (re)issue the payment
/// intent for a pending reservation.
///
/// Used when the gateway was unavailable at admission, or after the prior
/// intent expired. Returns the existing intent unchanged while it is still
/// live.
#[tracing::instrument(skip(state))]
pub async fn retry_payment_intent(
    State(state): State<AppState>,
    Path(reservation_id): Path<ReservationId>,
) -> Result<Json<PaymentIntentView>> {
    let record = state.store.get(reservation_id).ok_or_else(|| Error::NotFound {
        resource: "reservation",
        id: reservation_id.to_string(),
    })?;
    if record.status != ReservationStatus::Pending {
        return Err(Error::InvalidTransition {
            from: record.status,
            attempted: "issue a payment intent for",
        });
    }

    let intent = state
        .broker
        .create_intent(reservation_id, record.amount, &state.config.reservations.currency)
        .await?;
    Ok(Json(intent.into()))
}

/// `POST /api/v1/reservations/{id}/complete` - mark an active reservation
/// completed. The capacity slot stays counted against its window.
#[tracing::instrument(skip(state))]
pub async fn complete(
    State(state): State<AppState>,
    Path(reservation_id): Path<ReservationId>,
) -> Result<Json<ReservationView>> {
    state.lifecycle.complete(reservation_id)?;
    Ok(Json(view(&state, reservation_id)?))
}

/// `POST /api/v1/reservations/{id}/cancel` - cancel a pending or active
/// reservation, releasing its capacity slot and expiring any live intent so
/// a late settlement cannot resurrect it.
#[tracing::instrument(skip(state))]
pub async fn cancel(
    State(state): State<AppState>,
    Path(reservation_id): Path<ReservationId>,
) -> Result<Json<ReservationView>> {
    state.lifecycle.cancel(reservation_id)?;
    state.broker.expire(reservation_id);
    Ok(Json(view(&state, reservation_id)?))
}

//! HTTP handlers for mentor-student match requests.

use axum::{Json, extract::State, http::StatusCode};
use rust_decimal::Decimal;

use crate::AppState;
use crate::api::handlers::issue_intent;
use crate::api::models::matches::{MatchRequest, MatchResponse};
use crate::errors::{Error, Result};
use crate::store::{MentorshipDetails, Reservation};

/// `POST /api/v1/matches` - match a student to the least-loaded eligible
/// mentor and reserve one of their slots for the current month.
///
/// On success the reservation is `pending` with a payment intent attached;
/// settlement arrives later via the gateway webhook.
#[tracing::instrument(skip(state, request), fields(student = %request.student_id, branch = %request.branch))]
pub async fn request_match(
    State(state): State<AppState>,
    Json(request): Json<MatchRequest>,
) -> Result<(StatusCode, Json<MatchResponse>)> {
    let hours = request
        .hours_per_month
        .unwrap_or(state.config.reservations.default_hours_per_month);
    if hours == 0 {
        return Err(Error::BadRequest {
            message: "hours_per_month must be positive".to_string(),
        });
    }
    if request.topic.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "topic must not be empty".to_string(),
        });
    }

    let (mentor, token) = state.matching.match_student(request.student_id, request.branch).await?;

    let amount = mentor.monthly_rate * Decimal::from(hours);
    let reservation = Reservation::new_mentorship(
        request.student_id,
        mentor.id,
        &token,
        amount,
        MentorshipDetails {
            topic: request.topic,
            description: request.description.unwrap_or_default(),
            hours_per_month: hours,
            start_date: None,
            end_date: None,
        },
    );
    let reservation_id = reservation.id;
    let status = reservation.status;
    state.store.insert_mentorship(reservation);

    let payment_intent = issue_intent(&state, reservation_id, amount).await;

    Ok((
        StatusCode::CREATED,
        Json(MatchResponse {
            reservation_id,
            mentor_id: mentor.id,
            mentor_name: mentor.name,
            status,
            amount,
            payment_intent: payment_intent.map(Into::into),
        }),
    ))
}

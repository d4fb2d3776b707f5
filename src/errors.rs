use crate::directory::Branch;
use crate::store::ReservationStatus;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;
use uuid::Uuid;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: &'static str, id: String },

    /// A resource is at its configured capacity limit
    #[error("resource {resource_id} is at capacity ({max})")]
    CapacityExceeded { resource_id: Uuid, max: u32 },

    /// No mentor in the requested branch can take another student this month
    #[error("no mentor available for branch {branch}")]
    NoMentorAvailable { branch: Branch },

    /// A participant already holds a non-cancelled registration for this event
    #[error("participant {subject_id} is already registered for event {resource_id}")]
    AlreadyRegistered { resource_id: Uuid, subject_id: Uuid },

    /// A lifecycle transition was attempted from an incompatible state
    #[error("cannot {attempted} a reservation in state {from}")]
    InvalidTransition {
        from: ReservationStatus,
        attempted: &'static str,
    },

    /// Webhook signature verification failed - a security boundary, never applied
    #[error("webhook signature verification failed")]
    InvalidSignature,

    /// The external payment gateway could not be reached in time
    #[error("payment gateway unavailable: {reason}")]
    GatewayUnavailable { reason: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::CapacityExceeded { .. } => StatusCode::CONFLICT,
            Error::NoMentorAvailable { .. } => StatusCode::CONFLICT,
            Error::AlreadyRegistered { .. } => StatusCode::CONFLICT,
            Error::InvalidTransition { .. } => StatusCode::CONFLICT,
            Error::InvalidSignature => StatusCode::UNAUTHORIZED,
            Error::GatewayUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, id } => format!("{resource} with ID {id} not found"),
            Error::CapacityExceeded { .. } => "The requested resource is fully booked".to_string(),
            Error::NoMentorAvailable { branch } => {
                format!("No mentor is currently available for branch {branch}")
            }
            Error::AlreadyRegistered { .. } => "Already registered for this event".to_string(),
            Error::InvalidTransition { from, attempted } => {
                format!("Cannot {attempted} a reservation in state {from}")
            }
            Error::InvalidSignature => "Invalid webhook signature".to_string(),
            Error::GatewayUnavailable { .. } => {
                "Payment gateway is temporarily unavailable, please retry".to_string()
            }
            Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details - different log levels based on severity
        match &self {
            Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::InvalidSignature => {
                tracing::warn!("Rejected webhook: {}", self);
            }
            Error::GatewayUnavailable { .. } => {
                tracing::warn!("Gateway error: {}", self);
            }
            Error::InvalidTransition { .. } => {
                tracing::warn!("Lifecycle error: {}", self);
            }
            Error::CapacityExceeded { .. } | Error::NoMentorAvailable { .. } | Error::AlreadyRegistered { .. } => {
                tracing::info!("Admission refused: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let body = json!({ "message": self.user_message() });
        (status, Json(body)).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Matches** (`/api/v1/matches`): Mentor-student match requests
//! - **Registrations** (`/api/v1/registrations`): Event seat registrations
//! - **Reservations** (`/api/v1/reservations/*`): Status, payment intent
//!   reissue, completion, and cancellation
//! - **Webhook** (`/payment/webhook`): Signed payment gateway callbacks

pub mod handlers;
pub mod models;

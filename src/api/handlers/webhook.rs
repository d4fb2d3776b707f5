//! HTTP handler for inbound payment gateway webhooks.

use axum::{Json, extract::State, http::HeaderMap};
use serde_json::{Value, json};

use crate::AppState;
use crate::errors::Result;

/// `POST /payment/webhook` - verified gateway callback.
///
/// The raw body is taken as a `String` because the signature covers the
/// exact bytes as sent; re-serializing a parsed value would not verify.
/// Authentic-but-unactionable deliveries are acknowledged with 200 so the
/// gateway stops redelivering them.
#[tracing::instrument(skip_all)]
pub async fn receive(State(state): State<AppState>, headers: HeaderMap, body: String) -> Result<Json<Value>> {
    let ack = state.reconciler.handle(&headers, &body)?;
    Ok(Json(json!({ "received": true, "result": ack.as_str() })))
}

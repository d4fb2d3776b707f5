//! Payment gateway abstraction layer.
//!
//! This module defines the `PaymentGateway` trait which abstracts intent
//! creation across gateways. The core never talks to a gateway SDK directly;
//! it is handed a boxed implementation chosen from configuration.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::config::PaymentConfig;
use crate::types::ReservationId;

pub mod dummy;
pub mod http;

/// Create a payment gateway from configuration.
///
/// This is the single point where config becomes a gateway instance. Adding
/// a new gateway requires adding a match arm here.
pub fn create_gateway(config: &PaymentConfig) -> anyhow::Result<Arc<dyn PaymentGateway>> {
    match config {
        PaymentConfig::Http(http_config) => Ok(Arc::new(http::HttpGateway::new(http_config)?)),
        PaymentConfig::Dummy(_) => Ok(Arc::new(dummy::DummyGateway::new())),
    }
}

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors surfaced by a payment gateway
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway API error: {0}")]
    Api(String),

    #[error("gateway request timed out")]
    Timeout,

    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),
}

/// Outbound request to create an intent. `reservation_id` travels in the
/// intent metadata and comes back on the webhook.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CreateIntentRequest {
    pub amount: Decimal,
    pub currency: String,
    pub metadata: IntentMetadata,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IntentMetadata {
    pub reservation_id: ReservationId,
}

/// What the gateway hands back for a freshly created intent.
#[derive(Debug, Clone)]
pub struct IssuedIntent {
    pub intent_id: String,
    pub client_secret: String,
}

/// Abstract payment gateway interface.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment intent with the external gateway.
    ///
    /// The call itself is not responsible for timeouts; the broker bounds it
    /// with the configured deadline.
    async fn create_intent(&self, request: &CreateIntentRequest) -> Result<IssuedIntent>;
}

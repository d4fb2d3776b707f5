//! Dummy payment gateway implementation.
//!
//! Issues intents locally without any network call. Useful for development
//! and tests; paired with the webhook endpoint it still exercises the full
//! settlement path because nothing settles until a (signed) callback arrives.

use async_trait::async_trait;
use uuid::Uuid;

use crate::payment_providers::{CreateIntentRequest, IssuedIntent, PaymentGateway, Result};

/// Gateway that fabricates intents in-process.
#[derive(Default)]
pub struct DummyGateway;

impl DummyGateway {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PaymentGateway for DummyGateway {
    async fn create_intent(&self, request: &CreateIntentRequest) -> Result<IssuedIntent> {
        let suffix = Uuid::new_v4().simple().to_string();
        let intent_id = format!("pi_dummy_{suffix}");
        tracing::info!(
            reservation = %request.metadata.reservation_id,
            intent = %intent_id,
            amount = %request.amount,
            "dummy gateway issued intent"
        );
        Ok(IssuedIntent {
            client_secret: format!("{intent_id}_secret_{}", Uuid::new_v4().simple()),
            intent_id,
        })
    }
}

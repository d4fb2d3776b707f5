//! HTTP payment gateway implementation.
//!
//! Talks to an external gateway over its REST API: `POST
//! {base_url}/v1/payment_intents` with the amount, currency, and reservation
//! metadata, authenticated with a bearer secret key. The gateway later
//! reports the intent outcome via the signed webhook endpoint.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::HttpGatewayConfig;
use crate::payment_providers::{CreateIntentRequest, GatewayError, IssuedIntent, PaymentGateway, Result};

pub struct HttpGateway {
    client: reqwest::Client,
    base_url: url::Url,
    api_key: String,
}

/// Gateway wire response for intent creation.
#[derive(Debug, Deserialize)]
struct CreateIntentResponse {
    id: String,
    client_secret: String,
}

impl HttpGateway {
    pub fn new(config: &HttpGatewayConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn create_intent(&self, request: &CreateIntentRequest) -> Result<IssuedIntent> {
        let url = self
            .base_url
            .join("v1/payment_intents")
            .map_err(|e| GatewayError::Api(format!("invalid gateway URL: {e}")))?;

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::Api(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(%status, "gateway rejected intent creation");
            return Err(GatewayError::Api(format!("gateway returned {status}")));
        }

        let body: CreateIntentResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        tracing::info!(
            reservation = %request.metadata.reservation_id,
            intent = %body.id,
            "gateway issued intent"
        );
        Ok(IssuedIntent {
            intent_id: body.id,
            client_secret: body.client_secret,
        })
    }
}

//! Payment intent brokerage.
//!
//! One non-expired intent may exist per reservation at a time. Creation is
//! idempotent keyed by reservation: asking again while the prior intent is
//! still `Created` hands back the existing intent instead of issuing a
//! duplicate. A new intent may be issued once the prior one expired.
//!
//! The gateway call is the only slow step in the core and is bounded by the
//! configured timeout; on timeout or gateway error the caller sees
//! `GatewayUnavailable` and the reservation stays `pending` with its
//! capacity slot intact (bounded overall by the expiry sweep).

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{Error, Result};
use crate::payment_providers::{CreateIntentRequest, IntentMetadata, PaymentGateway};
use crate::types::{ReservationId, abbrev_uuid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentStatus {
    Created,
    Succeeded,
    Failed,
    Expired,
}

/// A gateway payment intent tied to a reservation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Gateway-issued intent id
    pub id: String,
    pub reservation_id: ReservationId,
    pub amount: Decimal,
    pub currency: String,
    pub status: IntentStatus,
    pub client_secret: String,
    pub created_at: DateTime<Utc>,
}

pub struct PaymentIntentBroker {
    gateway: Arc<dyn PaymentGateway>,
    gateway_timeout: Duration,
    intents: DashMap<ReservationId, PaymentIntent>,
}

impl PaymentIntentBroker {
    pub fn new(gateway: Arc<dyn PaymentGateway>, gateway_timeout: Duration) -> Self {
        Self {
            gateway,
            gateway_timeout,
            intents: DashMap::new(),
        }
    }

    /// Create (or return the existing live) intent for a reservation.
    #[tracing::instrument(skip(self, amount), fields(reservation_id = %abbrev_uuid(&reservation_id)))]
    pub async fn create_intent(&self, reservation_id: ReservationId, amount: Decimal, currency: &str) -> Result<PaymentIntent> {
        if let Some(existing) = self.intents.get(&reservation_id) {
            if existing.status == IntentStatus::Created {
                tracing::debug!(reservation = %reservation_id, intent = %existing.id, "returning existing live intent");
                return Ok(existing.clone());
            }
        }

        let request = CreateIntentRequest {
            amount,
            currency: currency.to_string(),
            metadata: IntentMetadata { reservation_id },
        };
        let issued = tokio::time::timeout(self.gateway_timeout, self.gateway.create_intent(&request))
            .await
            .map_err(|_| Error::GatewayUnavailable {
                reason: format!("intent creation exceeded {:?}", self.gateway_timeout),
            })?
            .map_err(|e| Error::GatewayUnavailable { reason: e.to_string() })?;

        let intent = PaymentIntent {
            id: issued.intent_id,
            reservation_id,
            amount,
            currency: currency.to_string(),
            status: IntentStatus::Created,
            client_secret: issued.client_secret,
            created_at: Utc::now(),
        };

        // Two racing callers may both reach the gateway; the first stored
        // live intent wins so everyone sees a single current intent.
        match self.intents.entry(reservation_id) {
            Entry::Occupied(occupied) if occupied.get().status == IntentStatus::Created => Ok(occupied.get().clone()),
            Entry::Occupied(mut occupied) => {
                occupied.insert(intent.clone());
                Ok(intent)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(intent.clone());
                Ok(intent)
            }
        }
    }

    /// The reservation's current intent, if any.
    pub fn current_intent(&self, reservation_id: ReservationId) -> Option<PaymentIntent> {
        self.intents.get(&reservation_id).map(|i| i.clone())
    }

    /// Expire the reservation's live intent so a fresh one may be issued.
    /// No-op when there is no live intent.
    pub fn expire(&self, reservation_id: ReservationId) {
        if let Some(mut intent) = self.intents.get_mut(&reservation_id) {
            if intent.status == IntentStatus::Created {
                intent.status = IntentStatus::Expired;
                tracing::info!(reservation = %reservation_id, intent = %intent.id, "intent expired");
            }
        }
    }

    pub fn mark_succeeded(&self, reservation_id: ReservationId) {
        self.mark(reservation_id, IntentStatus::Succeeded);
    }

    pub fn mark_failed(&self, reservation_id: ReservationId) {
        self.mark(reservation_id, IntentStatus::Failed);
    }

    // Only a live intent settles; a late outcome for an expired intent
    // leaves it expired.
    fn mark(&self, reservation_id: ReservationId, status: IntentStatus) {
        if let Some(mut intent) = self.intents.get_mut(&reservation_id) {
            if intent.status == IntentStatus::Created {
                intent.status = status;
            }
        }
    }
}

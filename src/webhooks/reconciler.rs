//! Webhook reconciliation: turn gateway callbacks into lifecycle
//! transitions, at most once.
//!
//! The reconciler is the security boundary for inbound settlement: nothing
//! mutates state until the payload's signature has been verified against the
//! shared secret. After that, the flow is deliberately tolerant - the
//! gateway retries until it sees a 2xx, so everything that can never become
//! processable (unknown event types, stale intents, transitions that no
//! longer apply) is acknowledged and ignored rather than errored.

use axum::http::HeaderMap;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::broker::PaymentIntentBroker;
use crate::errors::{Error, Result};
use crate::lifecycle::LifecycleStateMachine;
use crate::types::ReservationId;
use crate::webhooks::signing;

/// Event types the reconciler settles on. Everything else is acked and
/// dropped.
const EVENT_SUCCEEDED: &str = "payment_intent.succeeded";
const EVENT_FAILED: &str = "payment_intent.payment_failed";

/// Outcome of a processed (authentic) webhook delivery. All variants map to
/// a 2xx acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// A lifecycle transition was applied.
    Applied,
    /// Redelivery of an event whose transition was already satisfied.
    AlreadyApplied,
    /// Authentic but not actionable; reason is logged.
    Ignored,
}

impl Ack {
    pub fn as_str(self) -> &'static str {
        match self {
            Ack::Applied => "applied",
            Ack::AlreadyApplied => "already_applied",
            Ack::Ignored => "ignored",
        }
    }
}

/// Gateway event envelope: `{type, data: {object: {id, status, metadata}}}`.
#[derive(Debug, Deserialize)]
struct GatewayEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: GatewayEventData,
}

#[derive(Debug, Deserialize)]
struct GatewayEventData {
    object: GatewayIntentObject,
}

#[derive(Debug, Deserialize)]
struct GatewayIntentObject {
    id: String,
    #[allow(dead_code)]
    status: Option<String>,
    metadata: GatewayIntentMetadata,
}

#[derive(Debug, Deserialize)]
struct GatewayIntentMetadata {
    reservation_id: ReservationId,
}

pub struct WebhookReconciler {
    secret: String,
    timestamp_tolerance: Duration,
    broker: Arc<PaymentIntentBroker>,
    lifecycle: Arc<LifecycleStateMachine>,
}

impl WebhookReconciler {
    pub fn new(
        secret: String,
        timestamp_tolerance: Duration,
        broker: Arc<PaymentIntentBroker>,
        lifecycle: Arc<LifecycleStateMachine>,
    ) -> Self {
        Self {
            secret,
            timestamp_tolerance,
            broker,
            lifecycle,
        }
    }

    /// Verify and apply one gateway delivery.
    ///
    /// Errors: [`Error::InvalidSignature`] when authenticity cannot be
    /// established (no state change), [`Error::BadRequest`] when an
    /// authentic payload is malformed.
    #[tracing::instrument(skip_all)]
    pub fn handle(&self, headers: &HeaderMap, body: &str) -> Result<Ack> {
        let (msg_id, timestamp, signature) = self.signature_headers(headers)?;

        let skew = (Utc::now().timestamp() - timestamp).unsigned_abs();
        if skew > self.timestamp_tolerance.as_secs() {
            tracing::warn!(msg_id, skew, "webhook timestamp outside tolerance");
            return Err(Error::InvalidSignature);
        }

        if !signing::verify_signature(&msg_id, timestamp, body, &signature, &self.secret) {
            return Err(Error::InvalidSignature);
        }

        let event: GatewayEvent = serde_json::from_str(body).map_err(|e| Error::BadRequest {
            message: format!("malformed webhook payload: {e}"),
        })?;

        if event.event_type != EVENT_SUCCEEDED && event.event_type != EVENT_FAILED {
            tracing::debug!(event_type = %event.event_type, "ignoring webhook event type");
            return Ok(Ack::Ignored);
        }

        let reservation_id = event.data.object.metadata.reservation_id;
        let Some(current) = self.broker.current_intent(reservation_id) else {
            tracing::warn!(reservation = %reservation_id, "webhook for reservation with no intent on record");
            return Ok(Ack::Ignored);
        };
        if current.id != event.data.object.id {
            // A superseded intent can never become current again; ack so the
            // gateway stops redelivering.
            tracing::warn!(
                reservation = %reservation_id,
                payload_intent = %event.data.object.id,
                current_intent = %current.id,
                "webhook carries stale intent"
            );
            return Ok(Ack::Ignored);
        }

        if event.event_type == EVENT_SUCCEEDED {
            self.broker.mark_succeeded(reservation_id);
            self.settle(reservation_id, self.lifecycle.confirm_payment(reservation_id))
        } else {
            self.broker.mark_failed(reservation_id);
            self.settle(reservation_id, self.lifecycle.fail_payment(reservation_id))
        }
    }

    fn settle(&self, reservation_id: ReservationId, outcome: Result<crate::lifecycle::Transition>) -> Result<Ack> {
        match outcome {
            Ok(crate::lifecycle::Transition::Applied) => Ok(Ack::Applied),
            Ok(crate::lifecycle::Transition::AlreadySatisfied) => Ok(Ack::AlreadyApplied),
            Err(Error::InvalidTransition { from, attempted }) => {
                tracing::warn!(
                    reservation = %reservation_id,
                    %from,
                    attempted,
                    "webhook transition not applicable; acknowledged without applying"
                );
                Ok(Ack::Ignored)
            }
            Err(other) => Err(other),
        }
    }

    fn signature_headers(&self, headers: &HeaderMap) -> Result<(String, i64, String)> {
        let get = |name: &str| -> Result<String> {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .ok_or(Error::InvalidSignature)
        };
        let msg_id = get("webhook-id")?;
        let timestamp = get("webhook-timestamp")?.parse::<i64>().map_err(|_| Error::InvalidSignature)?;
        let signature = get("webhook-signature")?;
        Ok((msg_id, timestamp, signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::{CapacityTracker, CapacityWindow};
    use crate::payment_providers::dummy::DummyGateway;
    use crate::store::{RecordStore, Reservation, ReservationStatus};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    struct Fixture {
        secret: String,
        store: Arc<RecordStore>,
        tracker: Arc<CapacityTracker>,
        broker: Arc<PaymentIntentBroker>,
        reconciler: WebhookReconciler,
    }

    impl Fixture {
        fn new() -> Self {
            let secret = signing::generate_secret();
            let store = Arc::new(RecordStore::new());
            let tracker = Arc::new(CapacityTracker::new());
            let lifecycle = Arc::new(LifecycleStateMachine::new(store.clone(), tracker.clone()));
            let broker = Arc::new(PaymentIntentBroker::new(
                Arc::new(DummyGateway::new()),
                Duration::from_secs(5),
            ));
            let reconciler = WebhookReconciler::new(secret.clone(), Duration::from_secs(300), broker.clone(), lifecycle);
            Self {
                secret,
                store,
                tracker,
                broker,
                reconciler,
            }
        }

        /// Pending event registration with a live intent.
        async fn pending_reservation(&self) -> crate::types::ReservationId {
            let event_id = Uuid::new_v4();
            let token = self.tracker.reserve(event_id, CapacityWindow::Lifetime, 10).unwrap();
            let reservation = Reservation::new_event_registration(Uuid::new_v4(), event_id, &token, Decimal::from(250));
            let id = reservation.id;
            self.store.insert_event_registration(reservation).unwrap();
            self.broker.create_intent(id, Decimal::from(250), "inr").await.unwrap();
            id
        }

        fn payload(&self, event_type: &str, intent_id: &str, reservation_id: Uuid) -> String {
            serde_json::json!({
                "type": event_type,
                "data": {
                    "object": {
                        "id": intent_id,
                        "status": "succeeded",
                        "metadata": { "reservation_id": reservation_id }
                    }
                }
            })
            .to_string()
        }

        fn signed_headers(&self, body: &str) -> HeaderMap {
            self.signed_headers_with_secret(body, &self.secret)
        }

        fn signed_headers_with_secret(&self, body: &str, secret: &str) -> HeaderMap {
            let msg_id = format!("msg_{}", Uuid::new_v4().simple());
            let timestamp = Utc::now().timestamp();
            let signature = signing::sign_payload(&msg_id, timestamp, body, secret).unwrap();

            let mut headers = HeaderMap::new();
            headers.insert("webhook-id", msg_id.parse().unwrap());
            headers.insert("webhook-timestamp", timestamp.to_string().parse().unwrap());
            headers.insert("webhook-signature", signature.parse().unwrap());
            headers
        }
    }

    #[tokio::test]
    async fn test_succeeded_event_activates_reservation() {
        let fx = Fixture::new();
        let id = fx.pending_reservation().await;
        let intent = fx.broker.current_intent(id).unwrap();

        let body = fx.payload(EVENT_SUCCEEDED, &intent.id, id);
        let ack = fx.reconciler.handle(&fx.signed_headers(&body), &body).unwrap();

        assert_eq!(ack, Ack::Applied);
        assert_eq!(fx.store.get(id).unwrap().status, ReservationStatus::Active);
        assert_eq!(
            fx.broker.current_intent(id).unwrap().status,
            crate::broker::IntentStatus::Succeeded
        );
    }

    #[tokio::test]
    async fn test_redelivery_is_idempotent() {
        let fx = Fixture::new();
        let id = fx.pending_reservation().await;
        let intent = fx.broker.current_intent(id).unwrap();
        let event_id = fx.store.get(id).unwrap().resource_id;

        let body = fx.payload(EVENT_SUCCEEDED, &intent.id, id);
        assert_eq!(fx.reconciler.handle(&fx.signed_headers(&body), &body).unwrap(), Ack::Applied);
        let committed_after_first = fx.tracker.committed(event_id, CapacityWindow::Lifetime);

        // Same payload, fresh delivery headers - the gateway redelivers
        assert_eq!(
            fx.reconciler.handle(&fx.signed_headers(&body), &body).unwrap(),
            Ack::AlreadyApplied
        );
        assert_eq!(fx.store.get(id).unwrap().status, ReservationStatus::Active);
        assert_eq!(fx.tracker.committed(event_id, CapacityWindow::Lifetime), committed_after_first);
    }

    #[tokio::test]
    async fn test_forged_signature_rejected_then_genuine_applies() {
        let fx = Fixture::new();
        let id = fx.pending_reservation().await;
        let intent = fx.broker.current_intent(id).unwrap();
        let body = fx.payload(EVENT_SUCCEEDED, &intent.id, id);

        let forged = fx.signed_headers_with_secret(&body, &signing::generate_secret());
        let err = fx.reconciler.handle(&forged, &body).unwrap_err();
        assert!(matches!(err, Error::InvalidSignature));
        assert_eq!(fx.store.get(id).unwrap().status, ReservationStatus::Pending);

        let ack = fx.reconciler.handle(&fx.signed_headers(&body), &body).unwrap();
        assert_eq!(ack, Ack::Applied);
        assert_eq!(fx.store.get(id).unwrap().status, ReservationStatus::Active);
    }

    #[tokio::test]
    async fn test_failed_event_cancels_and_releases() {
        let fx = Fixture::new();
        let id = fx.pending_reservation().await;
        let intent = fx.broker.current_intent(id).unwrap();
        let event_id = fx.store.get(id).unwrap().resource_id;

        let body = fx.payload(EVENT_FAILED, &intent.id, id);
        let ack = fx.reconciler.handle(&fx.signed_headers(&body), &body).unwrap();

        assert_eq!(ack, Ack::Applied);
        assert_eq!(fx.store.get(id).unwrap().status, ReservationStatus::Cancelled);
        assert_eq!(fx.tracker.committed(event_id, CapacityWindow::Lifetime), 0);
    }

    #[tokio::test]
    async fn test_unknown_event_type_is_acked_and_ignored() {
        let fx = Fixture::new();
        let id = fx.pending_reservation().await;
        let intent = fx.broker.current_intent(id).unwrap();

        let body = fx.payload("payment_intent.created", &intent.id, id);
        let ack = fx.reconciler.handle(&fx.signed_headers(&body), &body).unwrap();
        assert_eq!(ack, Ack::Ignored);
        assert_eq!(fx.store.get(id).unwrap().status, ReservationStatus::Pending);
    }

    #[tokio::test]
    async fn test_stale_intent_is_acked_without_state_change() {
        let fx = Fixture::new();
        let id = fx.pending_reservation().await;
        let stale = fx.broker.current_intent(id).unwrap();

        // Supersede the intent
        fx.broker.expire(id);
        fx.broker.create_intent(id, Decimal::from(250), "inr").await.unwrap();

        let body = fx.payload(EVENT_SUCCEEDED, &stale.id, id);
        let ack = fx.reconciler.handle(&fx.signed_headers(&body), &body).unwrap();
        assert_eq!(ack, Ack::Ignored);
        assert_eq!(fx.store.get(id).unwrap().status, ReservationStatus::Pending);
    }

    #[tokio::test]
    async fn test_malformed_payload_after_valid_signature_is_bad_request() {
        let fx = Fixture::new();
        let body = r#"{"type":"payment_intent.succeeded","data":{}}"#;
        let err = fx.reconciler.handle(&fx.signed_headers(body), body).unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
    }

    #[tokio::test]
    async fn test_missing_signature_headers_rejected() {
        let fx = Fixture::new();
        let err = fx.reconciler.handle(&HeaderMap::new(), "{}").unwrap_err();
        assert!(matches!(err, Error::InvalidSignature));
    }

    #[tokio::test]
    async fn test_stale_timestamp_rejected() {
        let fx = Fixture::new();
        let id = fx.pending_reservation().await;
        let intent = fx.broker.current_intent(id).unwrap();
        let body = fx.payload(EVENT_SUCCEEDED, &intent.id, id);

        let msg_id = "msg_replay";
        let old = Utc::now().timestamp() - 3600;
        let signature = signing::sign_payload(msg_id, old, &body, &fx.secret).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("webhook-id", msg_id.parse().unwrap());
        headers.insert("webhook-timestamp", old.to_string().parse().unwrap());
        headers.insert("webhook-signature", signature.parse().unwrap());

        let err = fx.reconciler.handle(&headers, &body).unwrap_err();
        assert!(matches!(err, Error::InvalidSignature));
        assert_eq!(fx.store.get(id).unwrap().status, ReservationStatus::Pending);
    }
}

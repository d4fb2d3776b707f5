//! # alumctl - Alumni Mentorship & Events Control Layer
//!
//! A capacity-bounded allocation and payment-settlement service for a
//! college alumni program. Students are matched to alumni mentors with
//! bounded monthly capacity, participants register for events with bounded
//! seats, and both kinds of claim settle through an external payment gateway
//! whose outcomes arrive on a signed webhook.
//!
//! ## Architecture
//!
//! The service is a single Axum application built from a handful of core
//! components shared through [`AppState`]:
//!
//! - **[`capacity`]**: sharded per-resource slot counters; admission control
//! - **[`matching`]**: deterministic least-loaded mentor selection
//! - **[`store`]**: in-memory reservation records and uniqueness constraints
//! - **[`lifecycle`]**: the only writer of reservation status transitions
//! - **[`broker`]**: payment intent issuance against the configured gateway
//! - **[`webhooks`]**: signature verification and settlement reconciliation
//! - **[`sweep`]**: background expiry of abandoned pending reservations
//!
//! ## Quick Start
//!
//! ```no_run
//! use alumctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     alumctl::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config)?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod broker;
pub mod capacity;
pub mod config;
pub mod directory;
pub mod errors;
pub mod lifecycle;
pub mod matching;
pub mod payment_providers;
pub mod store;
pub mod sweep;
pub mod telemetry;
pub mod types;
pub mod webhooks;

#[cfg(test)]
pub mod test_utils;

use axum::{
    Router,
    routing::{get, post},
};
use bon::Builder;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info};

use crate::api::handlers;
use crate::broker::PaymentIntentBroker;
use crate::capacity::CapacityTracker;
pub use crate::config::Config;
use crate::directory::{Directory, EventSummary, InMemoryDirectory, Participant};
use crate::lifecycle::LifecycleStateMachine;
use crate::matching::MatchingEngine;
use crate::store::RecordStore;
use crate::sweep::ExpirySweeper;
use crate::webhooks::WebhookReconciler;

/// Application state shared across all request handlers.
///
/// Everything in here is cheap to clone; the components themselves live
/// behind `Arc`s and are shared between handlers, the webhook reconciler,
/// and the expiry sweeper.
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Arc<Config>,
    pub directory: Arc<dyn Directory>,
    pub store: Arc<RecordStore>,
    pub tracker: Arc<CapacityTracker>,
    pub matching: Arc<MatchingEngine>,
    pub lifecycle: Arc<LifecycleStateMachine>,
    pub broker: Arc<PaymentIntentBroker>,
    pub reconciler: Arc<WebhookReconciler>,
}

impl AppState {
    /// Wire the core components together from configuration and a directory.
    pub fn assemble(config: Config, directory: Arc<dyn Directory>) -> anyhow::Result<Self> {
        let gateway = payment_providers::create_gateway(&config.payment)?;
        let store = Arc::new(RecordStore::new());
        let tracker = Arc::new(CapacityTracker::new());
        let matching = Arc::new(MatchingEngine::new(directory.clone(), tracker.clone(), store.clone()));
        let lifecycle = Arc::new(LifecycleStateMachine::new(store.clone(), tracker.clone()));
        let broker = Arc::new(PaymentIntentBroker::new(gateway, config.reservations.gateway_timeout));
        let reconciler = Arc::new(WebhookReconciler::new(
            config.webhook.secret.clone(),
            config.webhook.timestamp_tolerance,
            broker.clone(),
            lifecycle.clone(),
        ));

        Ok(AppState::builder()
            .config(Arc::new(config))
            .directory(directory)
            .store(store)
            .tracker(tracker)
            .matching(matching)
            .lifecycle(lifecycle)
            .broker(broker)
            .reconciler(reconciler)
            .build())
    }
}

/// Seed an in-memory directory from configuration.
fn seed_directory(config: &Config) -> Arc<InMemoryDirectory> {
    let directory = Arc::new(InMemoryDirectory::new());
    for seed in &config.directory.participants {
        directory.insert_participant(Participant {
            id: seed.id,
            name: seed.name.clone(),
            role: seed.role,
            branch: seed.branch,
            is_mentor: seed.is_mentor,
            monthly_capacity: seed.monthly_capacity,
            monthly_rate: seed.monthly_rate,
        });
    }
    for seed in &config.directory.events {
        directory.insert_event(EventSummary {
            id: seed.id,
            title: seed.title.clone(),
            registration_fee: seed.registration_fee,
            max_participants: seed.max_participants,
            is_active: seed.is_active,
        });
    }
    info!(
        participants = config.directory.participants.len(),
        events = config.directory.events.len(),
        "seeded directory"
    );
    directory
}

/// Build the application router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/matches", post(handlers::matches::request_match))
        .route("/registrations", post(handlers::registrations::register_for_event))
        .route("/reservations/{id}", get(handlers::reservations::get_status))
        .route(
            "/reservations/{id}/payment-intent",
            post(handlers::reservations::retry_payment_intent),
        )
        .route("/reservations/{id}/complete", post(handlers::reservations::complete))
        .route("/reservations/{id}/cancel", post(handlers::reservations::cancel));

    Router::new()
        .nest("/api/v1", api)
        .route("/payment/webhook", post(handlers::webhook::receive))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// The assembled application: router, shared state, and background services.
///
/// # Lifecycle
///
/// 1. **Setup**: [`Application::new`] seeds the directory, wires the core
///    components, and spawns the expiry sweeper
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts
///    handling requests
/// 3. **Shutdown**: when the shutdown signal is received, the server drains
///    in-flight requests and the sweeper is stopped
pub struct Application {
    router: Router,
    config: Config,
    shutdown_token: tokio_util::sync::CancellationToken,
    sweeper: tokio::task::JoinHandle<()>,
}

impl Application {
    /// Create a new application instance with all resources initialized.
    ///
    /// Must be called from within a tokio runtime (the expiry sweeper is
    /// spawned here).
    pub fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting alumctl with configuration: {:#?}", config);

        let directory = seed_directory(&config);
        let state = AppState::assemble(config.clone(), directory)?;

        let shutdown_token = tokio_util::sync::CancellationToken::new();
        let sweeper = ExpirySweeper::new(
            state.store.clone(),
            state.lifecycle.clone(),
            state.broker.clone(),
            config.reservations.sweep_interval,
            config.reservations.pending_timeout,
        )
        .spawn(shutdown_token.clone());

        let router = build_router(state);

        Ok(Self {
            router,
            config,
            shutdown_token,
            sweeper,
        })
    }

    /// Start serving the application.
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("alumctl listening on http://{bind_addr}");

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        // Stop background services and wait for them to wind down
        self.shutdown_token.cancel();
        let _ = self.sweeper.await;

        info!("Shutdown complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::broker::IntentStatus;
    use crate::directory::Branch;
    use crate::store::ReservationStatus;
    use crate::test_utils::TestApp;
    use axum::http::StatusCode;
    use rust_decimal::Decimal;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use uuid::Uuid;

    #[test_log::test(tokio::test)]
    async fn test_health_endpoint() {
        let app = TestApp::spawn();
        let response = app.server.get("/health").await;
        response.assert_status_ok();
        response.assert_json(&json!({ "status": "ok" }));
    }

    /// Full mentorship flow: match, pay via signed webhook, complete.
    #[test_log::test(tokio::test)]
    async fn test_match_payment_completion_flow() {
        let app = TestApp::spawn();
        let mentor = app.add_mentor(Branch::Cse, 5, Decimal::from(100));
        let student = app.add_student(Branch::Cse);

        let response = app
            .server
            .post("/api/v1/matches")
            .json(&json!({
                "student_id": student.id,
                "branch": "CSE",
                "topic": "operating systems",
                "hours_per_month": 10
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["mentor_id"], json!(mentor.id));
        assert_eq!(body["status"], "pending");
        assert_eq!(body["amount"], json!("1000"));
        let reservation_id = body["reservation_id"].as_str().unwrap().to_string();
        let intent_id = body["payment_intent"]["intent_id"].as_str().unwrap().to_string();

        // Gateway reports the intent as succeeded
        let webhook = app.intent_event("payment_intent.succeeded", &intent_id, &reservation_id);
        let response = app.post_signed_webhook(&webhook).await;
        response.assert_status_ok();
        response.assert_json(&json!({ "received": true, "result": "applied" }));

        let response = app.server.get(&format!("/api/v1/reservations/{reservation_id}")).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "active");
        assert!(body["mentorship"]["start_date"].is_string());

        let response = app
            .server
            .post(&format!("/api/v1/reservations/{reservation_id}/complete"))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "completed");
    }

    #[test_log::test(tokio::test)]
    async fn test_failed_payment_cancels_and_frees_the_slot() {
        let app = TestApp::spawn();
        app.add_mentor(Branch::It, 1, Decimal::from(100));
        let student = app.add_student(Branch::It);
        let other = app.add_student(Branch::It);

        let body: Value = app
            .server
            .post("/api/v1/matches")
            .json(&json!({ "student_id": student.id, "branch": "IT", "topic": "databases" }))
            .await
            .json();
        let reservation_id = body["reservation_id"].as_str().unwrap().to_string();
        let intent_id = body["payment_intent"]["intent_id"].as_str().unwrap().to_string();

        // The sole slot is held, a second match is refused
        let response = app
            .server
            .post("/api/v1/matches")
            .json(&json!({ "student_id": other.id, "branch": "IT", "topic": "databases" }))
            .await;
        response.assert_status(StatusCode::CONFLICT);

        let webhook = app.intent_event("payment_intent.payment_failed", &intent_id, &reservation_id);
        app.post_signed_webhook(&webhook).await.assert_status_ok();
        assert_eq!(
            app.state.store.get(reservation_id.parse().unwrap()).unwrap().status,
            ReservationStatus::Cancelled
        );

        // Slot released; the other student can match now
        let response = app
            .server
            .post("/api/v1/matches")
            .json(&json!({ "student_id": other.id, "branch": "IT", "topic": "databases" }))
            .await;
        response.assert_status(StatusCode::CREATED);
    }

    #[test_log::test(tokio::test)]
    async fn test_forged_webhook_is_unauthorized() {
        let app = TestApp::spawn();
        app.add_mentor(Branch::Cse, 5, Decimal::from(100));
        let student = app.add_student(Branch::Cse);

        let body: Value = app
            .server
            .post("/api/v1/matches")
            .json(&json!({ "student_id": student.id, "branch": "CSE", "topic": "ml" }))
            .await
            .json();
        let reservation_id = body["reservation_id"].as_str().unwrap().to_string();
        let intent_id = body["payment_intent"]["intent_id"].as_str().unwrap().to_string();

        let webhook = app.intent_event("payment_intent.succeeded", &intent_id, &reservation_id);
        let response = app
            .post_webhook_signed_with(&webhook, &crate::webhooks::signing::generate_secret())
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(
            app.state.store.get(reservation_id.parse().unwrap()).unwrap().status,
            ReservationStatus::Pending
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_zero_fee_registration_activates_without_payment() {
        let app = TestApp::spawn();
        let participant = app.add_student(Branch::Ece);
        let event = app.add_event(Decimal::ZERO, 100, true);

        let response = app
            .server
            .post("/api/v1/registrations")
            .json(&json!({ "participant_id": participant.id, "event_id": event.id }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["status"], "active");
        assert!(body.get("payment_intent").is_none() || body["payment_intent"].is_null());
    }

    #[test_log::test(tokio::test)]
    async fn test_duplicate_registration_is_conflict() {
        let app = TestApp::spawn();
        let participant = app.add_student(Branch::Me);
        let event = app.add_event(Decimal::from(250), 100, true);
        let request = json!({ "participant_id": participant.id, "event_id": event.id });

        app.server
            .post("/api/v1/registrations")
            .json(&request)
            .await
            .assert_status(StatusCode::CREATED);
        let response = app.server.post("/api/v1/registrations").json(&request).await;
        response.assert_status(StatusCode::CONFLICT);
    }

    #[test_log::test(tokio::test)]
    async fn test_inactive_event_rejects_registration() {
        let app = TestApp::spawn();
        let participant = app.add_student(Branch::Ce);
        let event = app.add_event(Decimal::from(250), 100, false);

        let response = app
            .server
            .post("/api/v1/registrations")
            .json(&json!({ "participant_id": participant.id, "event_id": event.id }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    /// Scenario: an event with two seats and three concurrent registrations.
    /// Exactly two must be admitted.
    #[test_log::test(tokio::test)]
    async fn test_concurrent_registrations_respect_event_capacity() {
        let app = Arc::new(TestApp::spawn());
        let event = app.add_event(Decimal::from(250), 2, true);
        let participants: Vec<_> = (0..3).map(|_| app.add_student(Branch::Cse)).collect();

        let mut handles = Vec::new();
        for participant in &participants {
            let app = app.clone();
            let request = json!({ "participant_id": participant.id, "event_id": event.id });
            handles.push(tokio::spawn(async move {
                app.server.post("/api/v1/registrations").json(&request).await.status_code()
            }));
        }

        let mut statuses = Vec::new();
        for handle in handles {
            statuses.push(handle.await.unwrap());
        }
        let admitted = statuses.iter().filter(|s| **s == StatusCode::CREATED).count();
        let refused = statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count();
        assert_eq!(admitted, 2, "exactly two seats exist: {statuses:?}");
        assert_eq!(refused, 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_retry_payment_intent_returns_live_intent() {
        let app = TestApp::spawn();
        let participant = app.add_student(Branch::Eee);
        let event = app.add_event(Decimal::from(500), 10, true);

        let body: Value = app
            .server
            .post("/api/v1/registrations")
            .json(&json!({ "participant_id": participant.id, "event_id": event.id }))
            .await
            .json();
        let reservation_id = body["reservation_id"].as_str().unwrap().to_string();
        let original = body["payment_intent"]["intent_id"].as_str().unwrap().to_string();

        let response = app
            .server
            .post(&format!("/api/v1/reservations/{reservation_id}/payment-intent"))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["intent_id"], json!(original));
    }

    #[test_log::test(tokio::test)]
    async fn test_cancel_expires_intent_and_late_webhook_is_ignored() {
        let app = TestApp::spawn();
        let participant = app.add_student(Branch::Che);
        let event = app.add_event(Decimal::from(250), 10, true);

        let body: Value = app
            .server
            .post("/api/v1/registrations")
            .json(&json!({ "participant_id": participant.id, "event_id": event.id }))
            .await
            .json();
        let reservation_id = body["reservation_id"].as_str().unwrap().to_string();
        let intent_id = body["payment_intent"]["intent_id"].as_str().unwrap().to_string();

        let response = app
            .server
            .post(&format!("/api/v1/reservations/{reservation_id}/cancel"))
            .await;
        response.assert_status_ok();
        assert_eq!(
            app.state
                .broker
                .current_intent(reservation_id.parse().unwrap())
                .unwrap()
                .status,
            IntentStatus::Expired
        );

        // The gateway still delivers the (now stale) outcome; acked, ignored
        let webhook = app.intent_event("payment_intent.succeeded", &intent_id, &reservation_id);
        let response = app.post_signed_webhook(&webhook).await;
        response.assert_status_ok();
        response.assert_json(&json!({ "received": true, "result": "ignored" }));
        assert_eq!(
            app.state.store.get(reservation_id.parse().unwrap()).unwrap().status,
            ReservationStatus::Cancelled
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_unknown_reservation_is_not_found() {
        let app = TestApp::spawn();
        let response = app.server.get(&format!("/api/v1/reservations/{}", Uuid::new_v4())).await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[test_log::test(tokio::test)]
    async fn test_match_rejects_unknown_student_and_bad_hours() {
        let app = TestApp::spawn();
        app.add_mentor(Branch::Cse, 5, Decimal::from(100));

        let response = app
            .server
            .post("/api/v1/matches")
            .json(&json!({ "student_id": Uuid::new_v4(), "branch": "CSE", "topic": "x" }))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);

        let student = app.add_student(Branch::Cse);
        let response = app
            .server
            .post("/api/v1/matches")
            .json(&json!({ "student_id": student.id, "branch": "CSE", "topic": "x", "hours_per_month": 0 }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }
}

//! Shared fixtures for integration-style tests against the full router.

use axum_test::{TestResponse, TestServer};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::Config;
use crate::directory::{Branch, EventSummary, InMemoryDirectory, Participant, Role};
use crate::webhooks::signing;
use crate::{AppState, build_router};

/// Config suitable for tests: dummy gateway, fresh secret, fast timings.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.reservations.pending_timeout = Duration::from_secs(60);
    config.reservations.sweep_interval = Duration::from_millis(50);
    config.reservations.gateway_timeout = Duration::from_secs(1);
    config
}

/// A running test server plus handles for seeding and inspecting state.
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub directory: Arc<InMemoryDirectory>,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::spawn_with(test_config())
    }

    pub fn spawn_with(config: Config) -> Self {
        let directory = Arc::new(InMemoryDirectory::new());
        let state = AppState::assemble(config, directory.clone()).expect("test state should assemble");
        let server = TestServer::new(build_router(state.clone())).expect("test server should start");
        Self {
            server,
            state,
            directory,
        }
    }

    pub fn add_mentor(&self, branch: Branch, capacity: u32, rate: Decimal) -> Participant {
        let mentor = Participant {
            id: Uuid::new_v4(),
            name: "Asha Verma".to_string(),
            role: Role::Mentor,
            branch,
            is_mentor: true,
            monthly_capacity: capacity,
            monthly_rate: rate,
        };
        self.directory.insert_participant(mentor.clone());
        mentor
    }

    pub fn add_student(&self, branch: Branch) -> Participant {
        let student = Participant {
            id: Uuid::new_v4(),
            name: "Ravi Iyer".to_string(),
            role: Role::Student,
            branch,
            is_mentor: false,
            monthly_capacity: 0,
            monthly_rate: Decimal::ZERO,
        };
        self.directory.insert_participant(student.clone());
        student
    }

    pub fn add_event(&self, fee: Decimal, max_participants: u32, is_active: bool) -> EventSummary {
        let event = EventSummary {
            id: Uuid::new_v4(),
            title: "Alumni Meet".to_string(),
            registration_fee: fee,
            max_participants,
            is_active,
        };
        self.directory.insert_event(event.clone());
        event
    }

    /// Gateway event payload carrying an intent outcome for a reservation.
    pub fn intent_event(&self, event_type: &str, intent_id: &str, reservation_id: &str) -> String {
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

    pub async fn post_signed_webhook(&self, body: &str) -> TestResponse {
        let secret = self.state.config.webhook.secret.clone();
        self.post_webhook_signed_with(body, &secret).await
    }

    pub async fn post_webhook_signed_with(&self, body: &str, secret: &str) -> TestResponse {
        let msg_id = format!("msg_{}", Uuid::new_v4().simple());
        let timestamp = Utc::now().timestamp();
        let signature = signing::sign_payload(&msg_id, timestamp, body, secret).expect("secret should sign");

        self.server
            .post("/payment/webhook")
            .add_header("webhook-id", msg_id)
            .add_header("webhook-timestamp", timestamp.to_string())
            .add_header("webhook-signature", signature)
            .text(body.to_string())
            .await
    }
}

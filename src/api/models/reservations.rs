//! Shared reservation and payment intent views.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::broker::{IntentStatus, PaymentIntent};
use crate::store::{Reservation, ReservationKind, ReservationStatus};
use crate::types::{ParticipantId, ReservationId};

/// Client-facing view of a payment intent. The `client_secret` is what the
/// frontend hands to the gateway's payment element to collect the payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntentView {
    pub intent_id: String,
    pub client_secret: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: IntentStatus,
}

impl From<PaymentIntent> for PaymentIntentView {
    fn from(intent: PaymentIntent) -> Self {
        Self {
            intent_id: intent.id,
            client_secret: intent.client_secret,
            amount: intent.amount,
            currency: intent.currency,
            status: intent.status,
        }
    }
}

/// Mentorship fields exposed on a reservation view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentorshipView {
    pub topic: String,
    pub hours_per_month: u32,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Client-facing view of a reservation record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationView {
    pub reservation_id: ReservationId,
    pub subject_id: ParticipantId,
    pub resource_id: Uuid,
    pub status: ReservationStatus,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentorship: Option<MentorshipView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent: Option<PaymentIntentView>,
}

impl ReservationView {
    pub fn from_record(record: Reservation, intent: Option<PaymentIntent>) -> Self {
        let mentorship = match &record.kind {
            ReservationKind::Mentorship(details) => Some(MentorshipView {
                topic: details.topic.clone(),
                hours_per_month: details.hours_per_month,
                start_date: details.start_date,
                end_date: details.end_date,
            }),
            ReservationKind::Event(_) => None,
        };
        Self {
            reservation_id: record.id,
            subject_id: record.subject_id,
            resource_id: record.resource_id,
            status: record.status,
            amount: record.amount,
            created_at: record.created_at,
            mentorship,
            payment_intent: intent.map(PaymentIntentView::from),
        }
    }
}

//! Gateway webhook intake: signature verification and settlement
//! reconciliation.

pub mod reconciler;
pub mod signing;

pub use reconciler::{Ack, WebhookReconciler};

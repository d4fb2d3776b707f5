//! Background expiry sweep for abandoned checkouts.
//!
//! A `pending` reservation that never receives payment confirmation would
//! otherwise hold its capacity slot forever. The sweeper runs alongside the
//! HTTP server, periodically cancelling pending reservations older than the
//! configured window and expiring their intents, which releases the slots
//! back to the pool.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::broker::PaymentIntentBroker;
use crate::errors::Error;
use crate::lifecycle::{LifecycleStateMachine, Transition};
use crate::store::RecordStore;

#[derive(Clone)]
pub struct ExpirySweeper {
    store: Arc<RecordStore>,
    lifecycle: Arc<LifecycleStateMachine>,
    broker: Arc<PaymentIntentBroker>,
    interval: Duration,
    pending_timeout: Duration,
}

impl ExpirySweeper {
    pub fn new(
        store: Arc<RecordStore>,
        lifecycle: Arc<LifecycleStateMachine>,
        broker: Arc<PaymentIntentBroker>,
        interval: Duration,
        pending_timeout: Duration,
    ) -> Self {
        Self {
            store,
            lifecycle,
            broker,
            interval,
            pending_timeout,
        }
    }

    /// Spawn the sweep loop; it runs until the token is cancelled.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("expiry sweeper shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let expired = self.run_once();
                        if expired > 0 {
                            tracing::info!(expired, "expiry sweep released abandoned reservations");
                        }
                    }
                }
            }
        })
    }

    /// One sweep pass. Returns how many reservations were expired.
    pub fn run_once(&self) -> usize {
        let cutoff = chrono::Utc::now() - self.pending_timeout;
        let mut expired = 0;
        for reservation_id in self.store.pending_older_than(cutoff) {
            self.broker.expire(reservation_id);
            match self.lifecycle.expire(reservation_id) {
                Ok(Transition::Applied) => expired += 1,
                // Settled or already cancelled between scan and expiry
                Ok(Transition::AlreadySatisfied) | Err(Error::InvalidTransition { .. }) => {}
                Err(e) => {
                    tracing::error!(reservation = %reservation_id, "expiry sweep failed: {e:#}");
                }
            }
        }
        expired
    }
}

//! Periodic sweep for stale state.
//!
//! Each tick bulk-expires LIVE events whose end has passed, then re-runs
//! reconciliation for PENDING gateway payments older than the configured age.
//! This covers webhooks that never arrived; read paths still expire events
//! on their own, so the sweeper only narrows the window in which an ended
//! event looks LIVE.

use crate::aggregates::payment::{ReconcileError, ReconciliationEngine};
use crate::config::SweeperConfig;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use gatepass_core::environment::Clock;
use gatepass_core::error::StoreError;
use gatepass_core::state::PaymentStatus;
use gatepass_core::store::Store;
use gatepass_core::types::PaymentReference;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Stale payments reconciled at once within a sweep.
const SWEEP_CONCURRENCY: usize = 4;

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Events moved to ENDED
    pub expired: u64,
    /// Stale PENDING payments looked at
    pub examined: usize,
    /// Of those, now SUCCESS
    pub settled: usize,
    /// Of those, now FAILED
    pub failed: usize,
}

/// Background sweeper.
pub struct Sweeper {
    store: Arc<dyn Store>,
    engine: Arc<ReconciliationEngine>,
    clock: Arc<dyn Clock>,
    config: SweeperConfig,
}

impl Sweeper {
    /// Create a sweeper.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        engine: Arc<ReconciliationEngine>,
        clock: Arc<dyn Clock>,
        config: SweeperConfig,
    ) -> Self {
        Self {
            store,
            engine,
            clock,
            config,
        }
    }

    /// Run one sweep.
    ///
    /// Stale payments are reconciled a few at a time. One that stays PENDING
    /// (still open at the gateway, or the check failed) is marked swept so
    /// the next sweep starts with payments it has not looked at yet.
    ///
    /// # Errors
    ///
    /// Storage failures while listing events or payments.
    pub async fn sweep_once(&self) -> Result<SweepReport, StoreError> {
        let now = self.clock.now();
        let mut report = SweepReport {
            expired: self.store.expire_events(now).await?,
            ..SweepReport::default()
        };

        let cutoff = i64::try_from(self.config.pending_age_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|age| now.checked_sub_signed(age))
            .unwrap_or(now);
        let stale = self.store.stale_pending(cutoff, self.config.batch).await?;
        report.examined = stale.len();

        let mut outcomes = futures::stream::iter(stale)
            .map(|payment| async move {
                let result = self.engine.reconcile(&payment.reference).await;
                (payment.reference, result)
            })
            .buffer_unordered(SWEEP_CONCURRENCY);

        while let Some((reference, result)) = outcomes.next().await {
            match result {
                Ok(PaymentStatus::Success) => report.settled += 1,
                Ok(PaymentStatus::Failed) => report.failed += 1,
                Ok(PaymentStatus::Pending) => self.mark_swept(&reference, now).await,
                Err(ReconcileError::UnknownReference(_)) => {
                    warn!(%reference, "Stale payment vanished during sweep");
                }
                Err(e) => {
                    warn!(%reference, error = %e, "Sweep reconciliation failed");
                    self.mark_swept(&reference, now).await;
                }
            }
        }

        if report.expired > 0 || report.settled > 0 || report.failed > 0 {
            info!(
                expired = report.expired,
                examined = report.examined,
                settled = report.settled,
                failed = report.failed,
                "Sweep complete"
            );
        } else {
            debug!(examined = report.examined, "Sweep found nothing to do");
        }
        Ok(report)
    }

    async fn mark_swept(&self, reference: &PaymentReference, now: DateTime<Utc>) {
        if let Err(e) = self.store.mark_swept(reference, now).await {
            warn!(%reference, error = %e, "Failed to record sweep");
        }
    }

    /// Spawn the sweep loop. It stops when `shutdown` fires.
    #[must_use]
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run(shutdown).await;
        })
    }

    async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let period = Duration::from_secs(self.config.interval_secs.max(1));
        info!(interval_secs = period.as_secs(), "Sweeper started");
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Sweeper received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        warn!(error = %e, "Sweep failed, retrying next tick");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::aggregates::ticket::TicketMinter;
    use chrono::Duration as ChronoDuration;
    use gatepass_core::fees::FeePolicy;
    use gatepass_core::gateway::{PaymentGateway, Verification, VerificationOutcome};
    use gatepass_core::state::EventStatus;
    use gatepass_core::store::{EventRepository, PaymentRepository};
    use gatepass_testing::fixtures::{EventBuilder, new_payment};
    use gatepass_testing::{InMemoryStore, ScriptedGateway, StubQrRenderer, test_clock};

    #[tokio::test]
    async fn test_sweep_expires_and_reconciles() {
        let clock = test_clock();
        let store = InMemoryStore::new();
        let gateway = Arc::new(ScriptedGateway::succeeding());
        let engine = Arc::new(ReconciliationEngine::new(
            Arc::new(store.clone()),
            Arc::clone(&gateway) as Arc<dyn PaymentGateway>,
            TicketMinter::new(Arc::new(StubQrRenderer)),
            Arc::new(clock.clone()),
            FeePolicy::default(),
        ));
        let sweeper = Sweeper::new(
            Arc::new(store.clone()),
            engine,
            Arc::new(clock.clone()),
            SweeperConfig {
                interval_secs: 60,
                pending_age_secs: 300,
                batch: 10,
            },
        );

        let now = clock.now();
        let over = EventBuilder::live(now)
            .window(now - ChronoDuration::days(2), now - ChronoDuration::days(1))
            .ticket_type("Regular", 5000, 10)
            .build();
        let open = EventBuilder::live(now).ticket_type("Regular", 5000, 10).build();
        store.seed_event(over.clone()).await;
        store.seed_event(open.clone()).await;

        let settled = store
            .create_pending(new_payment(&open, "Regular", &FeePolicy::default()), now)
            .await
            .unwrap();
        let declined = store
            .create_pending(new_payment(&open, "Regular", &FeePolicy::default()), now)
            .await
            .unwrap();
        gateway.push(&declined.reference, Ok(Verification::outcome(VerificationOutcome::Failed)));

        // Too young to sweep
        let report = sweeper.sweep_once().await.unwrap();
        assert_eq!(report.expired, 1);
        assert_eq!(report.examined, 0);
        assert_eq!(store.find_event(over.id).await.unwrap().unwrap().status, EventStatus::Ended);

        clock.advance(ChronoDuration::minutes(10));
        let report = sweeper.sweep_once().await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                expired: 0,
                examined: 2,
                settled: 1,
                failed: 1
            }
        );
        let payment = store.find_payment(&settled.reference).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Success);
        assert_eq!(store.tickets().await.len(), 1);
    }

    #[tokio::test]
    async fn test_payments_still_open_at_gateway_do_not_starve_newer_ones() {
        let clock = test_clock();
        let store = InMemoryStore::new();
        let gateway = Arc::new(ScriptedGateway::pending());
        let engine = Arc::new(ReconciliationEngine::new(
            Arc::new(store.clone()),
            Arc::clone(&gateway) as Arc<dyn PaymentGateway>,
            TicketMinter::new(Arc::new(StubQrRenderer)),
            Arc::new(clock.clone()),
            FeePolicy::default(),
        ));
        let sweeper = Sweeper::new(
            Arc::new(store.clone()),
            engine,
            Arc::new(clock.clone()),
            SweeperConfig {
                interval_secs: 60,
                pending_age_secs: 300,
                batch: 2,
            },
        );

        let event = EventBuilder::live(clock.now()).ticket_type("Regular", 5000, 10).build();
        store.seed_event(event.clone()).await;

        // Two abandoned checkouts the gateway keeps reporting as open
        for _ in 0..2 {
            store
                .create_pending(new_payment(&event, "Regular", &FeePolicy::default()), clock.now())
                .await
                .unwrap();
        }
        clock.advance(ChronoDuration::minutes(5));
        let paid = store
            .create_pending(new_payment(&event, "Regular", &FeePolicy::default()), clock.now())
            .await
            .unwrap();
        gateway.push(&paid.reference, Ok(Verification::outcome(VerificationOutcome::Successful)));

        clock.advance(ChronoDuration::minutes(10));
        let report = sweeper.sweep_once().await.unwrap();
        assert_eq!(report.examined, 2);
        assert_eq!(report.settled, 0);

        clock.advance(ChronoDuration::minutes(10));
        let report = sweeper.sweep_once().await.unwrap();
        assert_eq!(report.settled, 1);
        let payment = store.find_payment(&paid.reference).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Success);
        assert_eq!(store.tickets().await.len(), 1);

        // The abandoned ones keep rotating through later sweeps
        clock.advance(ChronoDuration::minutes(10));
        let report = sweeper.sweep_once().await.unwrap();
        assert_eq!(report.examined, 2);
        assert_eq!(gateway.verify_calls(), 6);
    }

    #[tokio::test]
    async fn test_loop_stops_on_shutdown() {
        let store = InMemoryStore::new();
        let clock = test_clock();
        let engine = Arc::new(ReconciliationEngine::new(
            Arc::new(store.clone()),
            Arc::new(ScriptedGateway::pending()),
            TicketMinter::new(Arc::new(StubQrRenderer)),
            Arc::new(clock.clone()),
            FeePolicy::default(),
        ));
        let sweeper = Sweeper::new(
            Arc::new(store),
            engine,
            Arc::new(clock),
            SweeperConfig {
                interval_secs: 3600,
                pending_age_secs: 0,
                batch: 10,
            },
        );
        let (tx, rx) = broadcast::channel(1);
        let handle = sweeper.spawn(rx);
        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }
}

//! Background expiry of lapsed subscriptions.
//!
//! Each pass lists Active subscriptions whose end date is behind the clock
//! and moves them to Expired one by one with a conditional write, so a
//! cancellation or re-activation that lands mid-sweep is never overwritten.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::db::Store;
use crate::utils::Clock;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Lapsed subscriptions found by the scan.
    pub scanned: usize,
    pub expired: usize,
    /// Changed by someone else between the scan and the write.
    pub skipped: usize,
    pub failed: usize,
}

pub struct ExpirySweeper {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        ExpirySweeper {
            store,
            clock,
            interval,
        }
    }

    pub async fn run_once(&self) -> SweepReport {
        let now = self.clock.now_bson();
        let mut report = SweepReport::default();

        let lapsed = match self.store.list_lapsed_subscriptions(now).await {
            Ok(lapsed) => lapsed,
            Err(e) => {
                log::error!("Expiry sweep could not list lapsed subscriptions: {}", e);
                return report;
            }
        };
        report.scanned = lapsed.len();

        for sub in lapsed {
            let Some(id) = sub.id else {
                report.failed += 1;
                continue;
            };
            match self.store.expire_if_lapsed(id, now).await {
                Ok(true) => report.expired += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    log::error!("Failed to expire subscription {}: {}", id, e);
                    report.failed += 1;
                }
            }
        }

        if report.scanned > 0 {
            log::info!(
                "Expiry sweep: {} scanned, {} expired, {} skipped, {} failed",
                report.scanned,
                report.expired,
                report.skipped,
                report.failed
            );
        } else {
            log::debug!("Expiry sweep: nothing to expire");
        }
        report
    }

    /// Run a sweep immediately and then once per interval until stopped.
    pub fn start(self) -> SweeperHandle {
        let (shutdown, mut stopped) = watch::channel(false);
        log::info!("Expiry sweeper running every {:?}", self.interval);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.run_once().await;
                    }
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            break;
                        }
                    }
                }
            }
            log::info!("Expiry sweeper stopped");
        });

        SweeperHandle { shutdown, task }
    }
}

pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the loop and wait for the in-flight sweep, if any, to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            log::error!("Expiry sweeper task ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repo::SubscriptionRepository;
    use crate::models::SubscriptionStatus;
    use crate::models::{ActivateSubscriptionDto, PlanDuration};
    use crate::services::testing::{FaultyStore, Fixture};
    use crate::services::SubscriptionService;
    use chrono::Duration as ChronoDuration;

    fn sweeper(fx: &Fixture) -> ExpirySweeper {
        let store: Arc<dyn Store> = fx.store.clone();
        let clock: Arc<dyn Clock> = fx.clock.clone();
        ExpirySweeper::new(store, clock, Duration::from_millis(20))
    }

    #[tokio::test]
    async fn expires_only_lapsed_active_subscriptions() {
        let fx = Fixture::new().await;
        let (active, _) = fx.active_subscription().await;

        let daily = fx.plan_with(PlanDuration::Daily).await;
        let pending = SubscriptionService::subscribe(
            &*fx.store,
            &*fx.clock,
            &fx.user,
            daily,
            None,
        )
        .await
        .unwrap();

        // Nothing has lapsed yet.
        let report = sweeper(&fx).run_once().await;
        assert_eq!(report, SweepReport::default());

        fx.clock.advance(ChronoDuration::days(8));
        let report = sweeper(&fx).run_once().await;
        assert_eq!(report.scanned, 1);
        assert_eq!(report.expired, 1);

        let active = fx.store.find_subscription(active.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(active.status, SubscriptionStatus::Expired);
        let pending = fx.store.find_subscription(pending.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(pending.status, SubscriptionStatus::Pending);

        // A second pass finds nothing left to do.
        assert_eq!(sweeper(&fx).run_once().await, SweepReport::default());
    }

    #[tokio::test]
    async fn subscription_ending_exactly_now_is_not_lapsed() {
        let fx = Fixture::new().await;
        let (sub, _) = fx.active_subscription().await;

        fx.clock.advance(ChronoDuration::days(7));
        assert_eq!(sweeper(&fx).run_once().await.expired, 0);

        fx.clock.advance(ChronoDuration::seconds(1));
        assert_eq!(sweeper(&fx).run_once().await.expired, 1);
        let sub = fx.store.find_subscription(sub.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Expired);
    }

    #[tokio::test]
    async fn one_failed_write_does_not_stop_the_sweep() {
        let fx = Fixture::new().await;
        let (first, _) = fx.active_subscription().await;

        let second_plan = fx.plan_with(PlanDuration::Weekly).await;
        let second = SubscriptionService::subscribe(&*fx.store, &*fx.clock, &fx.user, second_plan, None)
            .await
            .unwrap();
        SubscriptionService::activate(
            &*fx.store,
            &*fx.clock,
            &fx.owner,
            second.id.unwrap(),
            ActivateSubscriptionDto { status: Some(SubscriptionStatus::Active), mess_id: None },
        )
        .await
        .unwrap();

        let faulty = Arc::new(FaultyStore::new(fx.store.clone()));
        faulty.fail_expiry_of(first.id.unwrap());
        let store: Arc<dyn Store> = faulty;
        let clock: Arc<dyn Clock> = fx.clock.clone();

        fx.clock.advance(ChronoDuration::days(8));
        let report = ExpirySweeper::new(store, clock, Duration::from_millis(20))
            .run_once()
            .await;
        assert_eq!(report.scanned, 2);
        assert_eq!(report.expired, 1);
        assert_eq!(report.failed, 1);

        let first = fx.store.find_subscription(first.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(first.status, SubscriptionStatus::Active);
        let second = fx.store.find_subscription(second.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(second.status, SubscriptionStatus::Expired);

        // The next pass picks the failed one up.
        assert_eq!(sweeper(&fx).run_once().await.expired, 1);
    }

    #[tokio::test]
    async fn background_loop_sweeps_and_stops() {
        let fx = Fixture::new().await;
        let (sub, _) = fx.active_subscription().await;
        fx.clock.advance(ChronoDuration::days(30));

        let handle = sweeper(&fx).start();
        let id = sub.id.unwrap();
        let mut expired = false;
        for _ in 0..50 {
            let status = fx.store.find_subscription(id).await.unwrap().unwrap().status;
            if status == SubscriptionStatus::Expired {
                expired = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.stop().await;
        assert!(expired);
    }
}

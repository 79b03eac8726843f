use std::sync::Arc;
use tokio::sync::watch;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};
use uptime_core::{
    Error, MonitorEngine, Result,
    buckets::{Bucket, CadenceBuckets},
    config::SchedulerConfig,
    store::MonitorStore,
};

use crate::pool::{CheckPool, Submission};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub due: usize,
    pub queued: usize,
    pub rejected: usize,
}

/// Runs one repeating job per cadence bucket. Each tick hands the bucket's
/// active monitors to the shared [`CheckPool`].
pub struct IntervalScheduler {
    buckets: CadenceBuckets,
    pool: CheckPool,
    scheduler: JobScheduler,
    shutdown: watch::Sender<bool>,
}

impl IntervalScheduler {
    pub async fn new(engine: Arc<MonitorEngine>, config: &SchedulerConfig) -> Result<Self> {
        let buckets = CadenceBuckets::new(&config.buckets)?;
        let (shutdown, shutdown_rx) = watch::channel(false);
        let pool = CheckPool::new(
            engine,
            config.max_concurrent_checks,
            config.queue_capacity,
            shutdown_rx,
        );
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| Error::scheduler(e.to_string()))?;

        Ok(Self {
            buckets,
            pool,
            scheduler,
            shutdown,
        })
    }

    pub fn pool(&self) -> &CheckPool {
        &self.pool
    }

    pub async fn start(&mut self) -> Result<()> {
        info!("Starting interval scheduler");

        for bucket in self.buckets.iter().copied() {
            let pool = self.pool.clone();
            let job = Job::new_repeated_async(bucket.period(), move |_uuid, _l| {
                let pool = pool.clone();
                Box::pin(async move {
                    run_tick(&pool, &bucket).await;
                })
            })
            .map_err(|e| Error::scheduler(e.to_string()))?;

            self.scheduler
                .add(job)
                .await
                .map_err(|e| Error::scheduler(e.to_string()))?;
            info!(
                period_secs = bucket.period_secs,
                lower_exclusive = bucket.lower_exclusive,
                upper_inclusive = ?bucket.upper_inclusive,
                "Scheduled cadence bucket"
            );
        }

        self.scheduler
            .start()
            .await
            .map_err(|e| Error::scheduler(e.to_string()))?;

        info!(buckets = self.buckets.len(), "Interval scheduler started");
        Ok(())
    }

    /// Stops issuing ticks and drops queued checks. Running checks finish.
    pub async fn stop(&mut self) -> Result<()> {
        info!("Stopping interval scheduler");
        self.shutdown.send_replace(true);
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| Error::scheduler(e.to_string()))?;
        info!("Interval scheduler stopped");
        Ok(())
    }
}

/// Fetches the monitors due in `bucket` and queues one check per monitor.
/// A failed fetch skips the tick.
pub async fn run_tick(pool: &CheckPool, bucket: &Bucket) -> TickSummary {
    let mut summary = TickSummary::default();
    if pool.is_shutting_down() {
        return summary;
    }

    let monitors = match pool.engine().store().monitors_due_for(bucket).await {
        Ok(monitors) => monitors,
        Err(e) => {
            error!(
                period_secs = bucket.period_secs,
                error = %e,
                "Failed to fetch monitors, skipping tick"
            );
            return summary;
        }
    };

    summary.due = monitors.len();
    for monitor in monitors {
        match pool.submit(monitor) {
            Submission::Queued => summary.queued += 1,
            Submission::Rejected => summary.rejected += 1,
            Submission::ShuttingDown => break,
        }
    }

    if summary.rejected > 0 {
        warn!(
            period_secs = bucket.period_secs,
            rejected = summary.rejected,
            "Tick could not queue every monitor"
        );
    }
    info!(
        period_secs = bucket.period_secs,
        due = summary.due,
        queued = summary.queued,
        "Bucket tick"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uptime_core::{
        models::{Monitor, MonitorStatus},
        store::InMemoryStore,
        testing::{RecordingNotifier, ScriptedProbe},
    };
    use uuid::Uuid;

    struct Fixture {
        store: Arc<InMemoryStore>,
        probe: Arc<ScriptedProbe>,
        notifier: Arc<RecordingNotifier>,
        engine: Arc<MonitorEngine>,
    }

    fn fixture(probe: ScriptedProbe) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let probe = Arc::new(probe);
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = Arc::new(MonitorEngine::new(
            probe.clone(),
            store.clone(),
            notifier.clone(),
        ));
        let user = Uuid::new_v4();
        for (id, interval) in [(1, 30), (2, 45), (3, 60), (4, 300)] {
            store
                .insert_monitor(Monitor::new(id, user, "https://example.com", interval))
                .unwrap();
        }
        let mut paused = Monitor::new(5, user, "https://paused.example.com", 60);
        paused.is_active = false;
        store.insert_monitor(paused).unwrap();
        store.add_contact(user, "ops", "ops@example.com").unwrap();

        Fixture {
            store,
            probe,
            notifier,
            engine,
        }
    }

    fn pool_for(f: &Fixture) -> (watch::Sender<bool>, CheckPool) {
        let (tx, rx) = watch::channel(false);
        (tx, CheckPool::new(f.engine.clone(), 4, 100, rx))
    }

    fn bucket(period: i64) -> Bucket {
        let buckets = CadenceBuckets::new(&[30, 60, 120]).unwrap();
        buckets
            .iter()
            .copied()
            .find(|b| b.period_secs == period)
            .unwrap()
    }

    #[tokio::test]
    async fn test_tick_checks_only_the_bucket_monitors() {
        let f = fixture(ScriptedProbe::new());
        let (_tx, pool) = pool_for(&f);

        let summary = run_tick(&pool, &bucket(60)).await;
        assert!(pool.wait_idle(Duration::from_secs(5)).await);

        assert_eq!(
            summary,
            TickSummary {
                due: 2,
                queued: 2,
                rejected: 0
            }
        );
        assert_eq!(f.store.logs_for(2).unwrap().len(), 1);
        assert_eq!(f.store.logs_for(3).unwrap().len(), 1);
        for id in [1, 4, 5] {
            assert!(f.store.logs_for(id).unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_largest_bucket_picks_up_longer_intervals() {
        let f = fixture(ScriptedProbe::new());
        let (_tx, pool) = pool_for(&f);

        let summary = run_tick(&pool, &bucket(120)).await;
        assert!(pool.wait_idle(Duration::from_secs(5)).await);

        assert_eq!(summary.due, 1);
        assert_eq!(f.store.logs_for(4).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_tick() {
        let f = fixture(ScriptedProbe::new());
        let (_tx, pool) = pool_for(&f);
        f.store.set_fail_reads(true);

        let summary = run_tick(&pool, &bucket(30)).await;
        assert_eq!(summary, TickSummary::default());
        assert_eq!(f.probe.calls(), 0);

        f.store.set_fail_reads(false);
        let summary = run_tick(&pool, &bucket(30)).await;
        assert!(pool.wait_idle(Duration::from_secs(5)).await);
        assert_eq!(summary.queued, 1);
        assert_eq!(f.store.logs_for(1).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_tick_after_shutdown_does_nothing() {
        let f = fixture(ScriptedProbe::new());
        let (tx, pool) = pool_for(&f);
        tx.send_replace(true);

        let summary = run_tick(&pool, &bucket(60)).await;
        assert_eq!(summary, TickSummary::default());
        assert_eq!(f.probe.calls(), 0);
    }

    #[tokio::test]
    async fn test_repeated_ticks_log_each_check_and_alert_on_change() {
        let f = fixture(ScriptedProbe::new());
        let (_tx, pool) = pool_for(&f);
        f.probe.push(1, &[MonitorStatus::Up, MonitorStatus::Up, MonitorStatus::Down]);

        for _ in 0..3 {
            run_tick(&pool, &bucket(30)).await;
            assert!(pool.wait_idle(Duration::from_secs(5)).await);
        }

        assert_eq!(f.store.logs_for(1).unwrap().len(), 3);
        assert_eq!(f.store.alerts_for(1).unwrap().len(), 1);
        assert_eq!(f.notifier.attempts(), 1);
        assert_eq!(f.store.current_status(1).await.unwrap(), MonitorStatus::Down);
    }

    #[tokio::test]
    async fn test_overlapping_ticks_skip_busy_monitor() {
        let f = fixture(ScriptedProbe::with_delay(Duration::from_millis(200)));
        let (_tx, pool) = pool_for(&f);

        run_tick(&pool, &bucket(30)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        run_tick(&pool, &bucket(30)).await;
        assert!(pool.wait_idle(Duration::from_secs(5)).await);

        assert_eq!(f.probe.calls(), 1);
        assert_eq!(f.store.logs_for(1).unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_scheduler_runs_buckets_until_stopped() {
        let f = fixture(ScriptedProbe::new());
        let config = SchedulerConfig {
            buckets: vec![1],
            max_concurrent_checks: 4,
            queue_capacity: 100,
        };
        let mut scheduler = IntervalScheduler::new(f.engine.clone(), &config)
            .await
            .unwrap();
        scheduler.start().await.unwrap();

        let mut waited = Duration::ZERO;
        while f.store.logs_for(1).unwrap().is_empty() && waited < Duration::from_secs(10) {
            tokio::time::sleep(Duration::from_millis(100)).await;
            waited += Duration::from_millis(100);
        }
        scheduler.stop().await.unwrap();
        assert!(scheduler.pool().wait_idle(Duration::from_secs(5)).await);

        assert!(!f.store.logs_for(1).unwrap().is_empty());
        assert!(scheduler.pool().is_shutting_down());
    }
}

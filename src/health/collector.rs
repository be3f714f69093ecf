//! Periodic CPU collection.
//!
//! # Responsibilities
//! - Sample every registered backend once per interval
//! - Publish CPU% and health into the routing state
//! - Keep running through per-backend and per-cycle failures

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use futures_util::FutureExt;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::MonitorConfig;
use crate::health::cpu::average_cpu_percent;
use crate::health::source::MetricsSource;
use crate::health::FetchError;
use crate::load_balancer::{RoutingState, SENTINEL_CPU_PERCENT};
use crate::observability::metrics;

/// Result of sampling one backend.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    Healthy { cpu_percent: f64 },
    Failed(FetchError),
}

/// Per-cycle tally, mostly for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub healthy: usize,
    pub unreachable: usize,
    pub malformed: usize,
}

/// Background task refreshing backend CPU and health.
pub struct HealthCollector<S> {
    state: Arc<RoutingState>,
    source: S,
    interval: Duration,
    fetch_timeout: Duration,
}

impl<S: MetricsSource> HealthCollector<S> {
    pub fn new(state: Arc<RoutingState>, source: S, config: &MonitorConfig) -> Self {
        Self::with_timing(
            state,
            source,
            Duration::from_secs(config.interval_secs),
            Duration::from_secs(config.fetch_timeout_secs),
        )
    }

    pub fn with_timing(
        state: Arc<RoutingState>,
        source: S,
        interval: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            state,
            source,
            interval,
            fetch_timeout,
        }
    }

    /// Run cycles until the shutdown signal fires.
    ///
    /// The first cycle starts immediately; later cycles start one interval
    /// after the previous start (later if a cycle overruns).
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs_f64(),
            fetch_timeout_secs = self.fetch_timeout.as_secs_f64(),
            targets = self.state.len(),
            "Health collector starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let cycle = async {
                ticker.tick().await;
                self.guarded_cycle().await;
            };

            tokio::select! {
                _ = cycle => {}
                _ = shutdown.recv() => {
                    tracing::info!("Health collector received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Run one cycle, logging rather than propagating a panic from the
    /// metrics source.
    async fn guarded_cycle(&self) {
        match AssertUnwindSafe(self.collect_once()).catch_unwind().await {
            Ok(report) => tracing::debug!(
                healthy = report.healthy,
                unreachable = report.unreachable,
                malformed = report.malformed,
                "Collection cycle complete"
            ),
            Err(_) => tracing::error!("Collection cycle aborted unexpectedly, continuing with next cycle"),
        }
    }

    /// Sample every backend once and publish the results.
    ///
    /// Backends registered after the snapshot is taken are picked up on the
    /// next cycle.
    pub async fn collect_once(&self) -> CycleReport {
        let targets = self.state.snapshot();
        let outcomes = join_all(targets.iter().map(|t| self.sample(&t.name))).await;

        let mut report = CycleReport::default();
        for (target, outcome) in targets.iter().zip(outcomes) {
            match outcome {
                SampleOutcome::Healthy { cpu_percent } => {
                    tracing::debug!(backend = %target.name, cpu_percent, "Backend sampled");
                    self.state.report_metric(&target.name, cpu_percent, true);
                    metrics::record_backend_sample(&target.name, cpu_percent, true);
                    report.healthy += 1;
                }
                SampleOutcome::Failed(err) => {
                    tracing::warn!(
                        backend = %target.name,
                        kind = err.kind(),
                        error = %err,
                        "Backend sample failed, marking unhealthy"
                    );
                    self.state.report_metric(&target.name, SENTINEL_CPU_PERCENT, false);
                    metrics::record_backend_sample(&target.name, SENTINEL_CPU_PERCENT, false);
                    metrics::record_fetch_failure(&target.name, err.kind());
                    match err {
                        FetchError::Unreachable(_) => report.unreachable += 1,
                        FetchError::Malformed(_) => report.malformed += 1,
                    }
                }
            }
        }
        report
    }

    async fn sample(&self, name: &str) -> SampleOutcome {
        let samples = match time::timeout(self.fetch_timeout, self.source.fetch(name)).await {
            Ok(Ok(samples)) => samples,
            Ok(Err(e)) => return SampleOutcome::Failed(e),
            Err(_) => {
                return SampleOutcome::Failed(FetchError::Unreachable(format!(
                    "no response within {:?}",
                    self.fetch_timeout
                )))
            }
        };

        match average_cpu_percent(&samples) {
            Some(cpu_percent) => SampleOutcome::Healthy { cpu_percent },
            None => SampleOutcome::Failed(FetchError::Malformed("no usage samples returned".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::cpu::CpuSample;
    use crate::load_balancer::Strategy;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fixed responses keyed by backend name; unknown names are unreachable.
    struct FixedSource {
        responses: HashMap<String, Result<Vec<CpuSample>, FetchError>>,
        calls: AtomicUsize,
    }

    impl FixedSource {
        fn new(entries: Vec<(&str, Result<Vec<CpuSample>, FetchError>)>) -> Self {
            Self {
                responses: entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl MetricsSource for FixedSource {
        async fn fetch(&self, name: &str) -> Result<Vec<CpuSample>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .get(name)
                .cloned()
                .unwrap_or_else(|| Err(FetchError::Unreachable(format!("no such container {name}"))))
        }
    }

    /// A source that never answers.
    struct StalledSource;

    impl MetricsSource for StalledSource {
        async fn fetch(&self, _name: &str) -> Result<Vec<CpuSample>, FetchError> {
            std::future::pending().await
        }
    }

    fn busy(percent: u64) -> CpuSample {
        CpuSample {
            target_usage: percent,
            prev_target_usage: 0,
            system_usage: 100,
            prev_system_usage: 0,
            online_cpus: Some(1),
        }
    }

    fn state(names: &[&str]) -> Arc<RoutingState> {
        let state = RoutingState::new(Strategy::LeastCpu);
        for (i, name) in names.iter().enumerate() {
            state.register(*name, "127.0.0.1", 7000 + i as u16).unwrap();
        }
        Arc::new(state)
    }

    fn collector<S: MetricsSource>(state: &Arc<RoutingState>, source: S) -> HealthCollector<S> {
        HealthCollector::with_timing(
            Arc::clone(state),
            source,
            Duration::from_millis(50),
            Duration::from_millis(200),
        )
    }

    #[tokio::test]
    async fn publishes_samples_and_failures() {
        let state = state(&["a", "b", "c", "d"]);
        let source = FixedSource::new(vec![
            ("a", Ok(vec![busy(5)])),
            ("b", Ok(vec![busy(40)])),
            ("d", Err(FetchError::Malformed("missing cpu_stats".into()))),
        ]);

        let report = collector(&state, source).collect_once().await;
        assert_eq!(report, CycleReport { healthy: 2, unreachable: 1, malformed: 1 });

        let snap = state.snapshot();
        assert!((snap[0].cpu_percent - 5.0).abs() < 1e-9);
        assert!(snap[0].healthy);
        assert!((snap[1].cpu_percent - 40.0).abs() < 1e-9);
        assert_eq!(snap[2].cpu_percent, SENTINEL_CPU_PERCENT);
        assert!(!snap[2].healthy);
        assert_eq!(snap[3].cpu_percent, SENTINEL_CPU_PERCENT);
        assert!(!snap[3].healthy);

        assert_eq!(state.select_backend().unwrap().name, "a");
    }

    #[tokio::test]
    async fn averages_multiple_documents() {
        let state = state(&["a"]);
        let source = FixedSource::new(vec![("a", Ok(vec![busy(10), busy(30)]))]);

        collector(&state, source).collect_once().await;
        assert!((state.snapshot()[0].cpu_percent - 20.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn empty_sample_list_is_malformed() {
        let state = state(&["a"]);
        let source = FixedSource::new(vec![("a", Ok(vec![]))]);

        let report = collector(&state, source).collect_once().await;
        assert_eq!(report.malformed, 1);
        assert!(!state.snapshot()[0].healthy);
    }

    #[tokio::test]
    async fn recovers_on_next_cycle() {
        let state = state(&["a"]);
        state.report_metric("a", SENTINEL_CPU_PERCENT, false);

        let source = FixedSource::new(vec![("a", Ok(vec![busy(7)]))]);
        collector(&state, source).collect_once().await;

        let snap = state.snapshot();
        assert!(snap[0].healthy);
        assert!((snap[0].cpu_percent - 7.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn stalled_fetch_times_out_as_unreachable() {
        let state = state(&["a", "b"]);
        let report = collector(&state, StalledSource).collect_once().await;

        assert_eq!(report.unreachable, 2);
        assert!(state.snapshot().iter().all(|t| !t.healthy));
    }

    #[tokio::test]
    async fn run_stops_promptly_on_shutdown() {
        let state = state(&["a"]);
        let source = FixedSource::new(vec![("a", Ok(vec![busy(1)]))]);
        let collector = HealthCollector::with_timing(
            Arc::clone(&state),
            source,
            Duration::from_secs(3600),
            Duration::from_millis(200),
        );

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(collector.run(rx));

        // Let the immediate first cycle run, then stop during the long sleep.
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(()).unwrap();

        time::timeout(Duration::from_millis(500), handle)
            .await
            .expect("collector did not stop")
            .unwrap();
        assert!((state.snapshot()[0].cpu_percent - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn run_repeats_cycles() {
        let state = state(&["a"]);
        let source = Arc::new(FixedSource::new(vec![("a", Ok(vec![busy(1)]))]));
        let collector = collector(&state, SharedSource(Arc::clone(&source)));

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(collector.run(rx));
        tokio::time::sleep(Duration::from_millis(180)).await;
        tx.send(()).unwrap();
        handle.await.unwrap();

        assert!(source.calls.load(Ordering::SeqCst) >= 3);
    }

    struct SharedSource(Arc<FixedSource>);

    impl MetricsSource for SharedSource {
        async fn fetch(&self, name: &str) -> Result<Vec<CpuSample>, FetchError> {
            self.0.fetch(name).await
        }
    }
}

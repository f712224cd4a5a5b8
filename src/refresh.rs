use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::future::{BoxFuture, FutureExt};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::cycle_stats::CycleStats;
use crate::config::{Config, PercentPolicy, CHANNEL_CAPACITY};
use crate::error::{AppError, Result};
use crate::fetcher::{fetch_all, AnalyticsSource, Endpoint};
use crate::kpi::Kpis;
use crate::processors::process_all;
use crate::types::{DashboardMetrics, DashboardSnapshot, RefreshState, Trigger};

// ---------------------------------------------------------------------------
// Auto-refresh timer
// ---------------------------------------------------------------------------

/// Periodic trigger source. The first tick arrives one full period after
/// `start`; a stopped timer never ticks.
pub struct AutoRefreshTimer {
    period: Duration,
    ticker: Option<Interval>,
}

impl AutoRefreshTimer {
    pub fn new(period: Duration) -> Self {
        Self { period, ticker: None }
    }

    /// No-op if already running.
    pub fn start(&mut self) {
        if self.ticker.is_some() {
            return;
        }
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
    }

    /// Safe to call any number of times.
    pub fn cancel(&mut self) {
        self.ticker = None;
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    pub async fn tick(&mut self) {
        match self.ticker.as_mut() {
            Some(ticker) => {
                ticker.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOutcome {
    /// A new cycle began.
    Started,
    /// A cycle was already in flight; the trigger was discarded.
    Dropped,
    /// The orchestrator has stopped.
    Closed,
}

enum Command {
    Refresh(oneshot::Sender<TriggerOutcome>),
    SetAutoRefresh(bool, oneshot::Sender<RefreshState>),
    Shutdown,
}

/// Cloneable front door to a running [`RefreshOrchestrator`].
#[derive(Clone)]
pub struct OrchestratorHandle {
    cmd_tx: mpsc::Sender<Command>,
    snapshot_rx: watch::Receiver<Arc<DashboardSnapshot>>,
}

impl OrchestratorHandle {
    pub async fn refresh_now(&self) -> TriggerOutcome {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Refresh(tx)).await.is_err() {
            return TriggerOutcome::Closed;
        }
        rx.await.unwrap_or(TriggerOutcome::Closed)
    }

    /// Returns the refresh state after the toggle took effect.
    pub async fn set_auto_refresh(&self, enabled: bool) -> Result<RefreshState> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::SetAutoRefresh(enabled, tx))
            .await
            .map_err(|_| AppError::Orchestrator("refresh loop stopped".to_string()))?;
        rx.await
            .map_err(|_| AppError::Orchestrator("refresh loop stopped".to_string()))
    }

    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(Command::Shutdown).await;
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<DashboardSnapshot>> {
        self.snapshot_rx.clone()
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<DashboardSnapshot> {
        Arc::clone(&self.snapshot_rx.borrow())
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

struct CycleReport {
    trigger: Trigger,
    metrics: DashboardMetrics,
    kpis: Kpis,
    endpoints_ok: usize,
    elapsed: Duration,
}

enum Phase {
    Idle,
    Refreshing(BoxFuture<'static, CycleReport>),
}

/// Owns the refresh state machine. At most one cycle is in flight; triggers
/// that arrive while `Refreshing` are dropped, never queued.
pub struct RefreshOrchestrator<S: AnalyticsSource> {
    source: Arc<S>,
    policy: PercentPolicy,
    refresh_view_on_load: bool,
    phase: Phase,
    timer: AutoRefreshTimer,
    current: DashboardSnapshot,
    cmd_rx: mpsc::Receiver<Command>,
    snapshot_tx: watch::Sender<Arc<DashboardSnapshot>>,
    stats: Arc<CycleStats>,
}

impl<S: AnalyticsSource> RefreshOrchestrator<S> {
    pub fn new(source: Arc<S>, cfg: &Config, stats: Arc<CycleStats>) -> (Self, OrchestratorHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let current = DashboardSnapshot {
            refresh: RefreshState {
                auto_refresh_enabled: cfg.auto_refresh,
                ..RefreshState::default()
            },
            ..DashboardSnapshot::default()
        };
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(current.clone()));

        let orchestrator = Self {
            source,
            policy: cfg.percent_policy,
            refresh_view_on_load: cfg.refresh_view_on_load,
            phase: Phase::Idle,
            timer: AutoRefreshTimer::new(cfg.refresh_interval),
            current,
            cmd_rx,
            snapshot_tx,
            stats,
        };
        (orchestrator, OrchestratorHandle { cmd_tx, snapshot_rx })
    }

    pub async fn run(mut self) {
        if self.current.refresh.auto_refresh_enabled {
            self.timer.start();
        }
        self.trigger(Trigger::Mount);

        loop {
            tokio::select! {
                report = in_flight(&mut self.phase) => self.complete(report),
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Refresh(reply)) => {
                        let outcome = self.trigger(Trigger::Manual);
                        let _ = reply.send(outcome);
                    }
                    Some(Command::SetAutoRefresh(enabled, reply)) => {
                        self.set_auto_refresh(enabled);
                        let _ = reply.send(self.current.refresh.clone());
                    }
                    Some(Command::Shutdown) | None => break,
                },
                _ = self.timer.tick() => {
                    self.trigger(Trigger::Timer);
                }
            }
        }

        self.timer.cancel();
        info!(
            cycles = self.current.refresh.cycles_completed,
            "Refresh orchestrator stopped"
        );
    }

    fn trigger(&mut self, trigger: Trigger) -> TriggerOutcome {
        if matches!(self.phase, Phase::Refreshing(_)) {
            debug!(trigger = %trigger, "cycle in flight, trigger dropped");
            return TriggerOutcome::Dropped;
        }

        let refresh_view = trigger != Trigger::Mount || self.refresh_view_on_load;
        let cycle = run_cycle(Arc::clone(&self.source), trigger, refresh_view, self.policy);
        self.phase = Phase::Refreshing(cycle.boxed());

        self.current.refresh.in_flight = true;
        self.current.refresh.last_trigger = Some(trigger);
        self.publish();
        TriggerOutcome::Started
    }

    fn complete(&mut self, report: CycleReport) {
        self.phase = Phase::Idle;
        self.stats.record(report.elapsed);

        self.current.metrics = report.metrics;
        self.current.kpis = report.kpis;
        let refresh = &mut self.current.refresh;
        refresh.in_flight = false;
        refresh.cycles_completed += 1;
        refresh.last_updated_ns = Some(now_ns());

        info!(
            trigger = %report.trigger,
            duration_ms = report.elapsed.as_millis() as u64,
            endpoints_ok = report.endpoints_ok,
            endpoints = Endpoint::ALL.len(),
            cycle = refresh.cycles_completed,
            "Refresh cycle complete: {}/{} endpoints returned data",
            report.endpoints_ok,
            Endpoint::ALL.len(),
        );
        self.publish();
    }

    fn set_auto_refresh(&mut self, enabled: bool) {
        if enabled {
            self.timer.start();
        } else {
            self.timer.cancel();
        }
        self.current.refresh.auto_refresh_enabled = enabled;
        info!(enabled, running = self.timer.is_running(), "Auto-refresh toggled");
        self.publish();
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(Arc::new(self.current.clone()));
    }
}

/// Resolves with the in-flight cycle's report; pending forever while idle.
async fn in_flight(phase: &mut Phase) -> CycleReport {
    match phase {
        Phase::Refreshing(cycle) => cycle.await,
        Phase::Idle => std::future::pending().await,
    }
}

/// One full cycle: optional materialized-view refresh, concurrent fan-out,
/// processing, KPI derivation.
async fn run_cycle<S: AnalyticsSource>(
    source: Arc<S>,
    trigger: Trigger,
    refresh_view: bool,
    policy: PercentPolicy,
) -> CycleReport {
    let started = Instant::now();

    if refresh_view && !source.refresh_view().await {
        warn!(trigger = %trigger, "Materialized view refresh failed; loading current data");
    }

    let raw = fetch_all(source.as_ref()).await;
    let metrics = process_all(&raw, policy);
    let kpis = Kpis::derive(&metrics);

    CycleReport {
        trigger,
        metrics,
        kpis,
        endpoints_ok: raw.present(),
        elapsed: started.elapsed(),
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::fake::FakeSource;
    use serde_json::json;

    fn config(auto_refresh: bool) -> Config {
        Config {
            auto_refresh,
            refresh_interval: Duration::from_secs(60),
            ..Config::default()
        }
    }

    fn spawn(source: FakeSource, cfg: &Config) -> (Arc<FakeSource>, OrchestratorHandle, Arc<CycleStats>) {
        let source = Arc::new(source);
        let stats = Arc::new(CycleStats::new().unwrap());
        let (orchestrator, handle) = RefreshOrchestrator::new(Arc::clone(&source), cfg, Arc::clone(&stats));
        tokio::spawn(orchestrator.run());
        (source, handle, stats)
    }

    async fn wait_for_cycles(handle: &OrchestratorHandle, n: u64) -> Arc<DashboardSnapshot> {
        let mut rx = handle.subscribe();
        let snap = rx
            .wait_for(|s| s.refresh.cycles_completed >= n && !s.refresh.in_flight)
            .await
            .unwrap();
        Arc::clone(&snap)
    }

    #[tokio::test]
    async fn mount_cycle_publishes_metrics_and_kpis() {
        let source = FakeSource::default().with(
            Endpoint::RiskSummary,
            json!({"data": [{"risk_level": "HIGH", "count": 30}, {"risk_level": "LOW", "count": 70}]}),
        );
        let (source, handle, stats) = spawn(source, &config(false));

        let snap = wait_for_cycles(&handle, 1).await;
        assert_eq!(snap.kpis.high_risk_rate, "30.0%");
        assert_eq!(snap.kpis.refund_rate, "-");
        assert_eq!(snap.metrics.risk.len(), 2);
        assert_eq!(snap.refresh.last_trigger, Some(Trigger::Mount));
        assert!(snap.refresh.last_updated_ns.is_some());
        assert!(!snap.refresh.auto_refresh_enabled);

        // initial load skips the materialized-view call by default
        assert_eq!(source.views(), 0);
        assert_eq!(source.fetches(), Endpoint::ALL.len() as u64);
        assert_eq!(stats.len(), 1);
    }

    #[tokio::test]
    async fn refresh_view_on_load_is_configurable() {
        let cfg = Config {
            refresh_view_on_load: true,
            ..config(false)
        };
        let (source, handle, _) = spawn(FakeSource::default(), &cfg);
        wait_for_cycles(&handle, 1).await;
        assert_eq!(source.views(), 1);
    }

    #[tokio::test]
    async fn triggers_during_a_cycle_are_dropped() {
        let (source, gate) = FakeSource::default().gated();
        let (source, handle, _) = spawn(source, &config(false));

        // mount cycle is parked on the gate
        let (a, b) = tokio::join!(handle.refresh_now(), handle.refresh_now());
        assert_eq!((a, b), (TriggerOutcome::Dropped, TriggerOutcome::Dropped));
        assert!(handle.snapshot().refresh.in_flight);

        gate.send_replace(true);
        wait_for_cycles(&handle, 1).await;

        gate.send_replace(false);
        let (first, second, third) =
            tokio::join!(handle.refresh_now(), handle.refresh_now(), handle.refresh_now());
        assert_eq!(first, TriggerOutcome::Started);
        assert_eq!(second, TriggerOutcome::Dropped);
        assert_eq!(third, TriggerOutcome::Dropped);

        gate.send_replace(true);
        let snap = wait_for_cycles(&handle, 2).await;
        assert_eq!(snap.refresh.cycles_completed, 2);
        assert_eq!(snap.refresh.last_trigger, Some(Trigger::Manual));
        assert_eq!(source.fetches(), 2 * Endpoint::ALL.len() as u64);
        assert_eq!(source.views(), 1);
    }

    #[tokio::test]
    async fn failed_view_refresh_still_reloads() {
        let source = FakeSource::default()
            .failing_view()
            .with(Endpoint::TimingTotalStats, json!({"mean": 4.2, "low": 1, "high": 9}));
        let (source, handle, _) = spawn(source, &config(false));
        wait_for_cycles(&handle, 1).await;

        assert_eq!(handle.refresh_now().await, TriggerOutcome::Started);
        let snap = wait_for_cycles(&handle, 2).await;
        assert_eq!(source.views(), 1);
        assert_eq!(snap.kpis.scoring_time, "4.20 ms");
        assert_eq!(snap.kpis.evaluate_time, "-");
    }

    #[tokio::test]
    async fn outage_keeps_every_kpi_as_placeholder() {
        let (_, handle, _) = spawn(FakeSource::default(), &config(false));
        let snap = wait_for_cycles(&handle, 1).await;
        assert_eq!(snap.kpis, Kpis::default());
        assert_eq!(snap.metrics, DashboardMetrics::default());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_ticks_and_can_be_toggled() {
        let (_, handle, _) = spawn(FakeSource::default(), &config(true));
        wait_for_cycles(&handle, 1).await;

        let before = Instant::now();
        let snap = wait_for_cycles(&handle, 2).await;
        assert_eq!(snap.refresh.last_trigger, Some(Trigger::Timer));
        assert!(before.elapsed() >= Duration::from_secs(59));

        let state = handle.set_auto_refresh(false).await.unwrap();
        assert!(!state.auto_refresh_enabled);
        assert!(!handle.snapshot().refresh.auto_refresh_enabled);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(handle.snapshot().refresh.cycles_completed, 2);

        // off twice is harmless
        handle.set_auto_refresh(false).await.unwrap();

        let toggled_at = Instant::now();
        handle.set_auto_refresh(true).await.unwrap();
        let snap = wait_for_cycles(&handle, 3).await;
        assert_eq!(snap.refresh.last_trigger, Some(Trigger::Timer));
        assert!(toggled_at.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test]
    async fn shutdown_closes_the_handle() {
        let (_, handle, _) = spawn(FakeSource::default(), &config(false));
        wait_for_cycles(&handle, 1).await;

        handle.shutdown().await;
        assert_eq!(handle.refresh_now().await, TriggerOutcome::Closed);
        assert!(handle.set_auto_refresh(true).await.is_err());
        // last snapshot stays readable
        assert_eq!(handle.snapshot().refresh.cycles_completed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_timer_never_ticks() {
        let mut timer = AutoRefreshTimer::new(Duration::from_secs(10));
        assert!(!timer.is_running());
        assert!(tokio::time::timeout(Duration::from_secs(60), timer.tick()).await.is_err());

        let started = Instant::now();
        timer.start();
        timer.tick().await;
        assert_eq!(started.elapsed(), Duration::from_secs(10));

        timer.cancel();
        timer.cancel();
        assert!(!timer.is_running());
    }
}

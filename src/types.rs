use std::collections::BTreeMap;

use serde::Serialize;

use crate::kpi::Kpis;

// ---------------------------------------------------------------------------
// Normalized input
// ---------------------------------------------------------------------------

/// One backend-reported category after shape normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRow {
    pub level: Option<String>,
    /// Always finite and >= 0.
    pub count: f64,
    /// Backend percent if it sent one; never defaulted to 0 here.
    pub percent: Option<f64>,
}

// ---------------------------------------------------------------------------
// Chart-ready output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    pub name: String,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
}

impl MetricRecord {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self { name: name.into(), value, percent: None }
    }

    pub fn with_percent(mut self, percent: Option<f64>) -> Self {
        self.percent = percent;
        self
    }
}

/// Scoring-latency summary in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TimingStats {
    pub mean: f64,
    pub low: f64,
    pub high: f64,
}

/// Scoring → deposit latency summary in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencyStats {
    pub average: f64,
    pub minimum: f64,
    pub maximum: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyPoint {
    pub index: usize,
    /// Last 8 characters of the order key.
    pub order_key: String,
    pub value_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencySummary {
    /// None when the backend returned no rows.
    pub stats: Option<LatencyStats>,
    pub chart_data: Vec<LatencyPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VampPeriod {
    /// `YYYY-MM`, or `N/A` when the period label could not be parsed.
    pub month: String,
    pub denom_txn_count: f64,
    pub refund_count: f64,
    /// Refund ratio as a percentage, when the backend reported one.
    pub refund_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VampSummary {
    /// First row of the payload.
    pub current: VampPeriod,
    pub chart_data: Vec<MetricRecord>,
    /// All rows in backend order, current period included.
    pub history: Vec<VampPeriod>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct OrderTotals {
    pub deposited: f64,
    pub refunded: f64,
    pub withdrawn: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct OrderCounts {
    pub orders: u64,
    pub deposits: u64,
    pub refunds: u64,
    pub withdrawals: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentOrder {
    pub order_key: String,
    pub scoring: f64,
    pub deposited: f64,
    pub refunded: f64,
    pub withdrawn: f64,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrdersSummary {
    pub currency: String,
    pub totals: OrderTotals,
    pub counts: OrderCounts,
    pub chart_data: Vec<MetricRecord>,
    /// At most `RECENT_ORDERS_LIMIT`, in backend order.
    pub recent_orders: Vec<RecentOrder>,
}

/// Everything one refresh cycle produces. Rebuilt from scratch every cycle.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DashboardMetrics {
    pub risk: Vec<MetricRecord>,
    pub three_ds: Vec<MetricRecord>,
    pub three_ds_outcomes: Vec<MetricRecord>,
    pub bin_distribution: Vec<MetricRecord>,
    pub rule_frequency: Vec<MetricRecord>,
    pub timing_total: Option<TimingStats>,
    pub timing_evaluate: Option<TimingStats>,
    pub latency: Option<LatencySummary>,
    pub vamp: Option<VampSummary>,
    /// Keyed by currency code.
    pub orders: BTreeMap<String, OrdersSummary>,
}

// ---------------------------------------------------------------------------
// Refresh state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Initial load when the orchestrator starts.
    Mount,
    /// Auto-refresh timer tick.
    Timer,
    /// Explicit refresh request.
    Manual,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Trigger::Mount => "mount",
            Trigger::Timer => "timer",
            Trigger::Manual => "manual",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RefreshState {
    /// Nanosecond UTC epoch of the last completed cycle.
    pub last_updated_ns: Option<u64>,
    pub auto_refresh_enabled: bool,
    pub in_flight: bool,
    pub cycles_completed: u64,
    pub last_trigger: Option<Trigger>,
}

/// Published to the renderer after every cycle and every auto-refresh toggle.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DashboardSnapshot {
    pub metrics: DashboardMetrics,
    pub kpis: Kpis,
    pub refresh: RefreshState,
}

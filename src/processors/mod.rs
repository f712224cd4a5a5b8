//! Domain metric processors. Each one is pure: raw JSON (or normalized rows) in,
//! chart-ready records out. Null or mismatched input always yields an empty or
//! neutral result.

pub mod distribution;
pub mod latency;
pub mod orders;
pub mod risk;
pub mod three_ds;
pub mod timing;
pub mod vamp;

use tracing::debug;

use crate::config::PercentPolicy;
use crate::fetcher::RawBundle;
use crate::normalize::coerce::round2;
use crate::types::{DashboardMetrics, MetricRecord, NormalizedRow};

/// Run every processor over one cycle's raw payloads.
pub fn process_all(raw: &RawBundle, policy: PercentPolicy) -> DashboardMetrics {
    let three_ds = three_ds::process_three_ds(raw.three_ds.as_ref(), policy);

    let metrics = DashboardMetrics {
        risk: risk::process_risk_summary(raw.risk_summary.as_ref(), policy),
        three_ds: three_ds.policy,
        three_ds_outcomes: three_ds.outcomes,
        bin_distribution: distribution::process_bin_distribution(raw.bin_distribution.as_ref()),
        rule_frequency: distribution::process_rule_frequency(raw.rule_frequency.as_ref()),
        timing_total: timing::process_timing_stats(raw.timing_total.as_ref()),
        timing_evaluate: timing::process_timing_stats(raw.timing_evaluate.as_ref()),
        latency: latency::process_latency(raw.latency.as_ref()),
        vamp: vamp::process_vamp(raw.vamp.as_ref()),
        orders: orders::process_orders(raw.orders.as_ref()),
    };

    debug!(
        risk = metrics.risk.len(),
        three_ds = metrics.three_ds.len(),
        bins = metrics.bin_distribution.len(),
        rules = metrics.rule_frequency.len(),
        currencies = metrics.orders.len(),
        "processed cycle payloads"
    );
    metrics
}

// ---------------------------------------------------------------------------
// Bucket tally shared by the risk and 3DS processors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct Bucket {
    rows: usize,
    value: f64,
    backend_percent: Option<f64>,
}

/// Accumulates normalized rows into a fixed, ordered set of canonical buckets.
/// Every row lands in exactly one bucket, so the sum of bucket values always
/// equals the sum of input counts.
pub(crate) struct BucketTally {
    names: &'static [&'static str],
    buckets: Vec<Bucket>,
}

impl BucketTally {
    pub(crate) fn new(names: &'static [&'static str]) -> Self {
        Self { names, buckets: vec![Bucket::default(); names.len()] }
    }

    pub(crate) fn add(&mut self, bucket: usize, row: &NormalizedRow) {
        let b = &mut self.buckets[bucket];
        b.rows += 1;
        b.value += row.count;
        if let Some(p) = row.percent {
            b.backend_percent = Some(b.backend_percent.unwrap_or(0.0) + p);
        }
    }

    /// `omit_zero` drops buckets whose accumulated value is 0; otherwise only
    /// buckets that never received a row are dropped.
    pub(crate) fn into_records(self, policy: PercentPolicy, omit_zero: bool) -> Vec<MetricRecord> {
        let total: f64 = self.buckets.iter().map(|b| b.value).sum();

        self.names
            .iter()
            .zip(self.buckets)
            .filter(|(_, b)| if omit_zero { b.value > 0.0 } else { b.rows > 0 })
            .map(|(name, b)| {
                let percent = match policy {
                    PercentPolicy::Recompute if total > 0.0 => Some(round2(b.value / total * 100.0)),
                    PercentPolicy::Recompute => None,
                    PercentPolicy::Backend => b.backend_percent,
                };
                MetricRecord::new(*name, b.value).with_percent(percent)
            })
            .collect()
    }
}

/// Upper-cased, trimmed token with `-` and spaces folded to `_`.
pub(crate) fn canonical_token(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

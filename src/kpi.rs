//! Headline KPIs derived from processor output. Every ratio renders the
//! placeholder instead of NaN or infinity when its denominator is zero or absent.

use serde::Serialize;

use crate::config::PLACEHOLDER;
use crate::processors::latency::minutes_to_ms;
use crate::processors::risk::RiskLevel;
use crate::processors::three_ds::{CHALLENGED, FAILED, FORCE_3DS, FRICTIONLESS};
use crate::types::{DashboardMetrics, MetricRecord, OrdersSummary, TimingStats, VampSummary};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Kpis {
    pub high_risk_rate: String,
    pub refund_rate: String,
    pub force_3ds_rate: String,
    pub challenge_rate: String,
    pub avg_latency: String,
    pub scoring_time: String,
    pub evaluate_time: String,
    pub total_deposited: String,
}

impl Default for Kpis {
    fn default() -> Self {
        Self {
            high_risk_rate: PLACEHOLDER.to_string(),
            refund_rate: PLACEHOLDER.to_string(),
            force_3ds_rate: PLACEHOLDER.to_string(),
            challenge_rate: PLACEHOLDER.to_string(),
            avg_latency: PLACEHOLDER.to_string(),
            scoring_time: PLACEHOLDER.to_string(),
            evaluate_time: PLACEHOLDER.to_string(),
            total_deposited: PLACEHOLDER.to_string(),
        }
    }
}

impl Kpis {
    pub fn derive(m: &DashboardMetrics) -> Self {
        Self {
            high_risk_rate: share_of(&m.risk, &[RiskLevel::High.as_str()]),
            refund_rate: refund_rate(m.vamp.as_ref()),
            force_3ds_rate: share_of(&m.three_ds, &[FORCE_3DS]),
            challenge_rate: challenge_rate(&m.three_ds_outcomes),
            avg_latency: m
                .latency
                .as_ref()
                .and_then(|l| l.stats)
                .map_or_else(|| PLACEHOLDER.to_string(), |s| format_latency_minutes(s.average)),
            scoring_time: timing_mean(m.timing_total),
            evaluate_time: timing_mean(m.timing_evaluate),
            total_deposited: total_deposited(m.orders.values()),
        }
    }
}

// ---------------------------------------------------------------------------
// Ratios
// ---------------------------------------------------------------------------

/// `numerator / denominator` as a one-decimal percentage, or the placeholder.
pub fn ratio_percent(numerator: f64, denominator: f64) -> String {
    if !numerator.is_finite() || !denominator.is_finite() || denominator <= 0.0 {
        return PLACEHOLDER.to_string();
    }
    format!("{:.1}%", numerator / denominator * 100.0)
}

fn value_of(records: &[MetricRecord], name: &str) -> f64 {
    records
        .iter()
        .filter(|r| r.name == name)
        .map(|r| r.value)
        .sum()
}

/// Share of the named buckets in the total of all buckets.
fn share_of(records: &[MetricRecord], names: &[&str]) -> String {
    let total: f64 = records.iter().map(|r| r.value).sum();
    let part: f64 = names.iter().map(|n| value_of(records, n)).sum();
    ratio_percent(part, total)
}

/// CHALLENGED / (FRICTIONLESS + CHALLENGED + FAILED).
fn challenge_rate(outcomes: &[MetricRecord]) -> String {
    let challenged = value_of(outcomes, CHALLENGED);
    let attempted = value_of(outcomes, FRICTIONLESS) + challenged + value_of(outcomes, FAILED);
    ratio_percent(challenged, attempted)
}

/// Backend ratio when reported, otherwise refunds / transactions.
fn refund_rate(vamp: Option<&VampSummary>) -> String {
    let Some(vamp) = vamp else {
        return PLACEHOLDER.to_string();
    };
    let period = &vamp.current;
    if period.denom_txn_count <= 0.0 {
        return PLACEHOLDER.to_string();
    }
    match period.refund_rate {
        Some(rate) if rate.is_finite() => format!("{rate:.1}%"),
        _ => ratio_percent(period.refund_count, period.denom_txn_count),
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Unit-stepped latency: ms below one second, seconds below one minute,
/// minutes otherwise.
pub fn format_latency_ms(ms: f64) -> String {
    if !ms.is_finite() {
        return PLACEHOLDER.to_string();
    }
    if ms < 1000.0 {
        return format!("{ms:.0} ms");
    }
    let sec = ms / 1000.0;
    if sec < 60.0 {
        return format!("{sec:.2} sec");
    }
    format!("{:.2} min", sec / 60.0)
}

pub fn format_latency_minutes(minutes: f64) -> String {
    format_latency_ms(minutes_to_ms(minutes))
}

fn timing_mean(stats: Option<TimingStats>) -> String {
    match stats {
        Some(t) if t.mean.is_finite() => format!("{:.2} ms", t.mean),
        _ => PLACEHOLDER.to_string(),
    }
}

fn total_deposited<'a>(orders: impl Iterator<Item = &'a OrdersSummary>) -> String {
    let parts: Vec<String> = orders
        .map(|o| format!("{} {:.2}", o.currency, o.totals.deposited))
        .collect();
    if parts.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        parts.join(" · ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PercentPolicy;
    use crate::processors::{latency, orders, risk, three_ds, vamp};
    use crate::types::{LatencyStats, LatencySummary};
    use serde_json::json;

    #[test]
    fn ratio_placeholder_on_zero_total() {
        assert_eq!(ratio_percent(0.0, 0.0), "-");
        assert_eq!(ratio_percent(5.0, 0.0), "-");
        assert_eq!(ratio_percent(1.0, f64::NAN), "-");
        assert_eq!(ratio_percent(0.0, 10.0), "0.0%");
        assert_eq!(ratio_percent(10.0, 10.0), "100.0%");
    }

    #[test]
    fn high_risk_rate_scenario() {
        let payload = json!({
            "data": [
                {"risk_level": "HIGH", "count": 30},
                {"risk_level": "LOW", "count": 70}
            ]
        });
        let metrics = DashboardMetrics {
            risk: risk::process_risk_summary(Some(&payload), PercentPolicy::Recompute),
            ..DashboardMetrics::default()
        };
        assert_eq!(Kpis::derive(&metrics).high_risk_rate, "30.0%");
    }

    #[test]
    fn force_3ds_rate_scenario() {
        let payload = json!({
            "columns": ["level", "count"],
            "data": [["FORCE_ON", 10], ["ATTEMPT", 5], ["BYPASS", 2]]
        });
        let breakdown = three_ds::process_three_ds(Some(&payload), PercentPolicy::Recompute);
        let metrics = DashboardMetrics {
            three_ds: breakdown.policy,
            three_ds_outcomes: breakdown.outcomes,
            ..DashboardMetrics::default()
        };
        let kpis = Kpis::derive(&metrics);
        assert_eq!(kpis.force_3ds_rate, "58.8%");
        // no frictionless/challenged/failed rows at all
        assert_eq!(kpis.challenge_rate, "-");
    }

    #[test]
    fn challenge_rate_uses_attempted_outcomes_only() {
        let payload = json!({
            "data": [
                {"level": "frictionless", "count": 6},
                {"level": "challenged", "count": 3},
                {"level": "failed", "count": 1},
                {"level": "bypass", "count": 90}
            ]
        });
        let breakdown = three_ds::process_three_ds(Some(&payload), PercentPolicy::Recompute);
        assert_eq!(challenge_rate(&breakdown.outcomes), "30.0%");
    }

    #[test]
    fn latency_scenario() {
        let payload = json!({
            "data": {"data": [
                [0, "a", null, null, 1],
                [0, "b", null, null, 2],
                [0, "c", null, null, 3]
            ]}
        });
        let metrics = DashboardMetrics {
            latency: latency::process_latency(Some(&payload)),
            ..DashboardMetrics::default()
        };
        assert_eq!(Kpis::derive(&metrics).avg_latency, "2.00 min");
    }

    #[test]
    fn latency_formatter_steps_units() {
        assert_eq!(format_latency_ms(999.0), "999 ms");
        assert_eq!(format_latency_ms(1000.0), "1.00 sec");
        assert_eq!(format_latency_ms(59_990.0), "59.99 sec");
        assert_eq!(format_latency_ms(60_000.0), "1.00 min");
        assert_eq!(format_latency_minutes(0.01), "600 ms");
        assert_eq!(format_latency_ms(f64::NAN), "-");
    }

    #[test]
    fn empty_latency_stats_render_placeholder() {
        let metrics = DashboardMetrics {
            latency: Some(LatencySummary { stats: None, chart_data: Vec::new() }),
            ..DashboardMetrics::default()
        };
        assert_eq!(Kpis::derive(&metrics).avg_latency, "-");

        let metrics = DashboardMetrics {
            latency: Some(LatencySummary {
                stats: Some(LatencyStats { average: 0.5, minimum: 0.5, maximum: 0.5 }),
                chart_data: Vec::new(),
            }),
            ..DashboardMetrics::default()
        };
        assert_eq!(Kpis::derive(&metrics).avg_latency, "30.00 sec");
    }

    #[test]
    fn refund_rate_prefers_backend_ratio() {
        let with_rate = json!({"data": {"data": [[1, "Sat, 2025-03-01", 1000, 20, 0.015]]}});
        let without_rate = json!({"data": {"data": [[1, "Sat, 2025-03-01", 1000, 20]]}});
        let zero_txn = json!({"data": {"data": [[1, "Sat, 2025-03-01", 0, 20, 0.5]]}});

        assert_eq!(refund_rate(vamp::process_vamp(Some(&with_rate)).as_ref()), "1.5%");
        assert_eq!(refund_rate(vamp::process_vamp(Some(&without_rate)).as_ref()), "2.0%");
        assert_eq!(refund_rate(vamp::process_vamp(Some(&zero_txn)).as_ref()), "-");
        assert_eq!(refund_rate(None), "-");
    }

    #[test]
    fn total_deposited_lists_currencies() {
        let payload = json!({"data": {"data": [
            ["USD", "a", 0, 100.5, 0, 0],
            ["EUR", "b", 0, 20, 0, 0]
        ]}});
        let metrics = DashboardMetrics {
            orders: orders::process_orders(Some(&payload)),
            ..DashboardMetrics::default()
        };
        assert_eq!(Kpis::derive(&metrics).total_deposited, "EUR 20.00 · USD 100.50");
    }

    #[test]
    fn outage_renders_every_kpi_as_placeholder() {
        let kpis = Kpis::derive(&DashboardMetrics::default());
        assert_eq!(kpis, Kpis::default());
        assert_eq!(kpis.high_risk_rate, "-");
        assert_eq!(kpis.scoring_time, "-");
    }

    #[test]
    fn timing_mean_two_decimals() {
        let stats = TimingStats { mean: 12.345, low: 1.0, high: 50.0 };
        assert_eq!(timing_mean(Some(stats)), "12.35 ms");
    }
}

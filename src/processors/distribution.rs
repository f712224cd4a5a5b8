use serde_json::Value;

use crate::config::RULE_FREQUENCY_TOP_N;
use crate::normalize::{normalize_level_counts, FieldCandidates};
use crate::types::MetricRecord;

pub const BIN_FIELDS: FieldCandidates<'static> = FieldCandidates {
    level: &["bin"],
    count: &["count"],
    percent: &["percent"],
};

pub const RULE_FIELDS: FieldCandidates<'static> = FieldCandidates {
    level: &["rule", "rule_name"],
    count: &["count", "hits"],
    percent: &["percent"],
};

const UNNAMED: &str = "UNKNOWN";

fn records(payload: Option<&Value>, fields: &FieldCandidates<'_>) -> Vec<MetricRecord> {
    normalize_level_counts(payload, fields)
        .into_iter()
        .map(|row| {
            MetricRecord::new(row.level.unwrap_or_else(|| UNNAMED.to_string()), row.count)
                .with_percent(row.percent)
        })
        .collect()
}

/// `/bin-distribution` → one record per BIN, backend order.
pub fn process_bin_distribution(payload: Option<&Value>) -> Vec<MetricRecord> {
    records(payload, &BIN_FIELDS)
}

/// `/rule-frequency` → the most frequently hit rules, highest count first.
/// Ties keep backend order.
pub fn process_rule_frequency(payload: Option<&Value>) -> Vec<MetricRecord> {
    let mut rules = records(payload, &RULE_FIELDS);
    rules.sort_by(|a, b| b.value.total_cmp(&a.value));
    rules.truncate(RULE_FREQUENCY_TOP_N);
    rules
}

use serde_json::Value;

use super::{canonical_token, BucketTally};
use crate::config::PercentPolicy;
use crate::normalize::{normalize_level_counts, FieldCandidates};
use crate::types::{MetricRecord, NormalizedRow};

pub const RISK_FIELDS: FieldCandidates<'static> = FieldCandidates {
    level: &["risk_level", "label", "level"],
    count: &["count"],
    percent: &["percent"],
};

/// Output order of the risk buckets.
const RISK_BUCKETS: &[&str] = &["HIGH", "MEDIUM", "LOW", "UNKNOWN"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    High,
    Medium,
    Low,
    Unknown,
}

impl RiskLevel {
    pub fn classify(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return RiskLevel::Unknown;
        };
        match canonical_token(raw).as_str() {
            "HIGH" | "HIGH_RISK" => RiskLevel::High,
            "MEDIUM" | "MED" | "MEDIUM_RISK" => RiskLevel::Medium,
            "LOW" | "LOW_RISK" => RiskLevel::Low,
            _ => RiskLevel::Unknown,
        }
    }

    fn bucket(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        RISK_BUCKETS[self.bucket()]
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub fn summarize_risk(rows: &[NormalizedRow], policy: PercentPolicy) -> Vec<MetricRecord> {
    let mut tally = BucketTally::new(RISK_BUCKETS);
    for row in rows {
        tally.add(RiskLevel::classify(row.level.as_deref()).bucket(), row);
    }
    tally.into_records(policy, false)
}

/// `/case-risk-summary` → one record per risk bucket that received rows.
pub fn process_risk_summary(payload: Option<&Value>, policy: PercentPolicy) -> Vec<MetricRecord> {
    summarize_risk(&normalize_level_counts(payload, &RISK_FIELDS), policy)
}

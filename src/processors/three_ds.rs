use serde_json::Value;

use super::{canonical_token, BucketTally};
use crate::config::PercentPolicy;
use crate::normalize::{normalize_level_counts, FieldCandidates};
use crate::types::{MetricRecord, NormalizedRow};

pub const THREE_DS_FIELDS: FieldCandidates<'static> = FieldCandidates {
    level: &["level", "three_ds"],
    count: &["count"],
    percent: &["percent"],
};

pub const FORCE_3DS: &str = "Force 3DS";
pub const PREFER_3DS: &str = "Prefer 3DS";
pub const BYPASS_3DS: &str = "Bypass 3DS";
pub const OTHER_3DS: &str = "Other 3DS";

const POLICY_BUCKETS: &[&str] = &[FORCE_3DS, PREFER_3DS, BYPASS_3DS, OTHER_3DS];

pub const FRICTIONLESS: &str = "FRICTIONLESS";
pub const CHALLENGED: &str = "CHALLENGED";
pub const FAILED: &str = "FAILED";
pub const NOT_ATTEMPTED: &str = "NOT_ATTEMPTED";
pub const OTHER_OUTCOME: &str = "OTHER";

const OUTCOME_BUCKETS: &[&str] = &[FRICTIONLESS, CHALLENGED, FAILED, NOT_ATTEMPTED, OTHER_OUTCOME];

// ---------------------------------------------------------------------------
// Policy buckets (the recommended 3DS action)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreeDsPolicy {
    Force,
    Prefer,
    Bypass,
    Other,
}

impl ThreeDsPolicy {
    pub fn classify(raw: Option<&str>) -> Self {
        match raw.map(canonical_token).as_deref() {
            Some("FORCE" | "FORCE_ON") => ThreeDsPolicy::Force,
            Some("PREFER_ON" | "ATTEMPT") => ThreeDsPolicy::Prefer,
            Some("BYPASS" | "BYPASS_ON") => ThreeDsPolicy::Bypass,
            _ => ThreeDsPolicy::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        POLICY_BUCKETS[self as usize]
    }
}

// ---------------------------------------------------------------------------
// Outcome buckets (what the gateway reported)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreeDsOutcome {
    Frictionless,
    Challenged,
    Failed,
    NotAttempted,
    Other,
}

impl ThreeDsOutcome {
    pub fn classify(raw: Option<&str>) -> Self {
        let value = raw.map(str::trim).unwrap_or_default();
        if value.is_empty() || value == "N/A" || value.eq_ignore_ascii_case("none") {
            return ThreeDsOutcome::NotAttempted;
        }

        let lower = value.to_ascii_lowercase();
        if lower.contains("friction") {
            ThreeDsOutcome::Frictionless
        } else if lower.contains("chall") {
            ThreeDsOutcome::Challenged
        } else if ["fail", "denied", "declin"].iter().any(|t| lower.contains(t)) {
            ThreeDsOutcome::Failed
        } else if ["no_3ds", "no-3ds", "bypass"].iter().any(|t| lower.contains(t))
            || lower == "a"
            || lower.contains("attempt")
        {
            ThreeDsOutcome::NotAttempted
        } else {
            ThreeDsOutcome::Other
        }
    }

    pub fn as_str(self) -> &'static str {
        OUTCOME_BUCKETS[self as usize]
    }
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ThreeDsBreakdown {
    pub policy: Vec<MetricRecord>,
    pub outcomes: Vec<MetricRecord>,
}

/// Policy buckets with a zero total are omitted.
pub fn summarize_policy(rows: &[NormalizedRow], policy: PercentPolicy) -> Vec<MetricRecord> {
    let mut tally = BucketTally::new(POLICY_BUCKETS);
    for row in rows {
        tally.add(ThreeDsPolicy::classify(row.level.as_deref()) as usize, row);
    }
    tally.into_records(policy, true)
}

pub fn summarize_outcomes(rows: &[NormalizedRow], policy: PercentPolicy) -> Vec<MetricRecord> {
    let mut tally = BucketTally::new(OUTCOME_BUCKETS);
    for row in rows {
        tally.add(ThreeDsOutcome::classify(row.level.as_deref()) as usize, row);
    }
    tally.into_records(policy, true)
}

/// `/3ds-summary` → policy buckets plus gateway outcome buckets over the same rows.
pub fn process_three_ds(payload: Option<&Value>, policy: PercentPolicy) -> ThreeDsBreakdown {
    let rows = normalize_level_counts(payload, &THREE_DS_FIELDS);
    if rows.is_empty() {
        return ThreeDsBreakdown::default();
    }
    ThreeDsBreakdown {
        policy: summarize_policy(&rows, policy),
        outcomes: summarize_outcomes(&rows, policy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn value_of(records: &[MetricRecord], name: &str) -> Option<f64> {
        records.iter().find(|r| r.name == name).map(|r| r.value)
    }

    #[test]
    fn policy_tokens() {
        assert_eq!(ThreeDsPolicy::classify(Some("force_on")), ThreeDsPolicy::Force);
        assert_eq!(ThreeDsPolicy::classify(Some("FORCE")), ThreeDsPolicy::Force);
        assert_eq!(ThreeDsPolicy::classify(Some("ATTEMPT")), ThreeDsPolicy::Prefer);
        assert_eq!(ThreeDsPolicy::classify(Some("prefer_on")), ThreeDsPolicy::Prefer);
        assert_eq!(ThreeDsPolicy::classify(Some("bypass_on")), ThreeDsPolicy::Bypass);
        assert_eq!(ThreeDsPolicy::classify(Some("Y")), ThreeDsPolicy::Other);
        assert_eq!(ThreeDsPolicy::classify(None), ThreeDsPolicy::Other);
    }

    #[test]
    fn outcome_tokens() {
        assert_eq!(ThreeDsOutcome::classify(Some("frictionless")), ThreeDsOutcome::Frictionless);
        assert_eq!(ThreeDsOutcome::classify(Some("CHALLENGE_REQUIRED")), ThreeDsOutcome::Challenged);
        assert_eq!(ThreeDsOutcome::classify(Some("auth_failed")), ThreeDsOutcome::Failed);
        assert_eq!(ThreeDsOutcome::classify(Some("Declined")), ThreeDsOutcome::Failed);
        assert_eq!(ThreeDsOutcome::classify(Some("BYPASS")), ThreeDsOutcome::NotAttempted);
        assert_eq!(ThreeDsOutcome::classify(Some("A")), ThreeDsOutcome::NotAttempted);
        assert_eq!(ThreeDsOutcome::classify(Some("N/A")), ThreeDsOutcome::NotAttempted);
        assert_eq!(ThreeDsOutcome::classify(None), ThreeDsOutcome::NotAttempted);
        assert_eq!(ThreeDsOutcome::classify(Some("FORCE_ON")), ThreeDsOutcome::Other);
    }

    #[test]
    fn tabular_scenario() {
        let payload = json!({
            "columns": ["level", "count"],
            "data": [["FORCE_ON", 10], ["ATTEMPT", 5], ["BYPASS", 2]]
        });
        let breakdown = process_three_ds(Some(&payload), PercentPolicy::Recompute);
        assert_eq!(
            breakdown.policy.iter().map(|r| (r.name.as_str(), r.value)).collect::<Vec<_>>(),
            vec![(FORCE_3DS, 10.0), (PREFER_3DS, 5.0), (BYPASS_3DS, 2.0)]
        );
        assert_eq!(value_of(&breakdown.policy, OTHER_3DS), None);
        assert_eq!(breakdown.policy[0].percent, Some(58.82));
    }

    #[test]
    fn bucket_sum_matches_input_sum() {
        let payload = json!({
            "data": [
                {"three_ds": "FORCE", "count": 4, "percent": 40.0},
                {"three_ds": "FORCE_ON", "count": 1, "percent": 10.0},
                {"three_ds": "frictionless", "count": 3, "percent": 30.0},
                {"three_ds": "challenged", "count": 2, "percent": 20.0}
            ]
        });
        let breakdown = process_three_ds(Some(&payload), PercentPolicy::Backend);
        let policy_total: f64 = breakdown.policy.iter().map(|r| r.value).sum();
        let outcome_total: f64 = breakdown.outcomes.iter().map(|r| r.value).sum();
        assert_eq!(policy_total, 10.0);
        assert_eq!(outcome_total, 10.0);
        assert_eq!(value_of(&breakdown.policy, FORCE_3DS), Some(5.0));
        assert_eq!(breakdown.policy[0].percent, Some(50.0));
        assert_eq!(value_of(&breakdown.outcomes, CHALLENGED), Some(2.0));
    }

    #[test]
    fn empty_input_is_empty() {
        assert_eq!(process_three_ds(None, PercentPolicy::Recompute), ThreeDsBreakdown::default());
        let zero = json!({"data": [{"level": "FORCE", "count": 0}]});
        let breakdown = process_three_ds(Some(&zero), PercentPolicy::Recompute);
        assert!(breakdown.policy.is_empty());
    }
}

use serde_json::Value;

use crate::normalize::coerce::number_or_zero;
use crate::types::TimingStats;

/// `/timing-total-stats` and `/timing-evaluate-stats` → `{mean, low, high}` in ms.
/// Missing or non-numeric fields become 0; a null or non-object payload is no data.
pub fn process_timing_stats(payload: Option<&Value>) -> Option<TimingStats> {
    let payload = payload?;
    let obj = match payload.get("data") {
        Some(inner) if inner.is_object() => inner,
        _ if payload.is_object() => payload,
        _ => return None,
    };

    Some(TimingStats {
        mean: number_or_zero(obj.get("mean")),
        low: number_or_zero(obj.get("low")),
        high: number_or_zero(obj.get("high")),
    })
}

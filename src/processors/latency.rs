use serde_json::Value;

use crate::config::LATENCY_PREVIEW_ROWS;
use crate::normalize::coerce::{label, number_or_zero};
use crate::normalize::RowSet;
use crate::types::{LatencyPoint, LatencyStats, LatencySummary};

/// Positional layout of a `/latency` row when no column names are sent.
const ORDER_KEY_IDX: usize = 1;
const MINUTES_IDX: usize = 4;

const ORDER_KEY_SUFFIX_CHARS: usize = 8;

pub fn minutes_to_ms(minutes: f64) -> f64 {
    minutes * 60_000.0
}

/// Mean / min / max of the elapsed minutes. None for an empty slice.
pub fn latency_stats(minutes: &[f64]) -> Option<LatencyStats> {
    if minutes.is_empty() {
        return None;
    }
    let sum: f64 = minutes.iter().sum();
    Some(LatencyStats {
        average: sum / minutes.len() as f64,
        minimum: minutes.iter().copied().fold(f64::INFINITY, f64::min),
        maximum: minutes.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    })
}

fn key_suffix(key: &str) -> String {
    match key.char_indices().rev().nth(ORDER_KEY_SUFFIX_CHARS - 1) {
        Some((i, _)) => key[i..].to_string(),
        None => key.to_string(),
    }
}

/// `/latency` → scoring→deposit stats over every row plus a millisecond preview
/// series of the first rows.
pub fn process_latency(payload: Option<&Value>) -> Option<LatencySummary> {
    let set = RowSet::locate(payload)?;
    let key_idx = set.index(&["order_key"], ORDER_KEY_IDX);
    // elapsed minutes sit at a fixed position even in named layouts
    let minutes_idx = set
        .index(&["latency_minutes", "minutes"], MINUTES_IDX)
        .unwrap_or(MINUTES_IDX);

    let minutes: Vec<f64> = set
        .rows
        .iter()
        .map(|row| number_or_zero(row.get(minutes_idx)))
        .collect();

    let chart_data = set
        .rows
        .iter()
        .zip(&minutes)
        .take(LATENCY_PREVIEW_ROWS)
        .enumerate()
        .map(|(index, (row, &m))| LatencyPoint {
            index,
            order_key: RowSet::cell(row, key_idx)
                .and_then(label)
                .map(|k| key_suffix(&k))
                .unwrap_or_default(),
            value_ms: minutes_to_ms(m),
        })
        .collect();

    Some(LatencySummary {
        stats: latency_stats(&minutes),
        chart_data,
    })
}

use serde_json::Value;

use crate::normalize::coerce::{label, number, number_or_zero};
use crate::normalize::RowSet;
use crate::types::{MetricRecord, VampPeriod, VampSummary};

const UNKNOWN_MONTH: &str = "N/A";

/// `"Mon, 2025-03-01 00:00:00"` → `"2025-03"`.
fn month_of(period: Option<String>) -> String {
    period
        .as_deref()
        .and_then(|p| p.split(',').nth(1))
        .map(|date| date.trim().chars().take(7).collect::<String>())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| UNKNOWN_MONTH.to_string())
}

struct Columns {
    period: Option<usize>,
    transactions: Option<usize>,
    refunds: Option<usize>,
    refund_rate: Option<usize>,
}

fn period_of(row: &[Value], cols: &Columns) -> VampPeriod {
    VampPeriod {
        month: month_of(RowSet::cell(row, cols.period).and_then(label)),
        denom_txn_count: number_or_zero(RowSet::cell(row, cols.transactions)),
        refund_count: number_or_zero(RowSet::cell(row, cols.refunds)),
        refund_rate: RowSet::cell(row, cols.refund_rate).and_then(number).map(|r| r * 100.0),
    }
}

/// `/vamp` → the current period (first row) with its transaction/refund chart,
/// plus every row as history.
pub fn process_vamp(payload: Option<&Value>) -> Option<VampSummary> {
    let set = RowSet::locate(payload)?;
    let cols = Columns {
        period: set.index(&["period", "month"], 1),
        transactions: set.index(&["denom_txn_count", "transactions"], 2),
        refunds: set.index(&["refund_count", "refunds"], 3),
        refund_rate: set.index(&["refund_rate"], 4),
    };

    let history: Vec<VampPeriod> = set.rows.iter().map(|row| period_of(row, &cols)).collect();
    let current = history.first()?.clone();

    Some(VampSummary {
        chart_data: vec![
            MetricRecord::new("Transactions", current.denom_txn_count),
            MetricRecord::new("Refunds", current.refund_count),
        ],
        current,
        history,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_row_is_current() {
        let payload = json!({
            "data": {"data": [
                [1, "Sat, 2025-03-01 00:00:00", 1200, 18, "0.015"],
                [1, "Sat, 2025-02-01 00:00:00", 1000, 5, 0.005]
            ]}
        });
        let vamp = process_vamp(Some(&payload)).unwrap();
        assert_eq!(vamp.current.month, "2025-03");
        assert_eq!(vamp.current.denom_txn_count, 1200.0);
        assert_eq!(vamp.current.refund_count, 18.0);
        assert!((vamp.current.refund_rate.unwrap() - 1.5).abs() < 1e-9);
        assert_eq!(vamp.chart_data[1], MetricRecord::new("Refunds", 18.0));
        assert_eq!(vamp.history.len(), 2);
        assert_eq!(vamp.history[1].month, "2025-02");
    }

    #[test]
    fn missing_fields_degrade() {
        let payload = json!({"data": {"data": [[1, "no comma"]]}});
        let vamp = process_vamp(Some(&payload)).unwrap();
        assert_eq!(vamp.current.month, "N/A");
        assert_eq!(vamp.current.denom_txn_count, 0.0);
        assert!(vamp.current.refund_rate.is_none());
    }

    #[test]
    fn named_layout_without_refund_rate_has_none() {
        let payload = json!({
            "data": {
                "columns": ["subscriber_id", "period", "denom_txn_count", "refund_count", "notes"],
                "data": [[1, "Sat, 2025-03-01", 500, 10, 0.9]]
            }
        });
        let vamp = process_vamp(Some(&payload)).unwrap();
        assert_eq!(vamp.current.denom_txn_count, 500.0);
        assert!(vamp.current.refund_rate.is_none());
    }

    #[test]
    fn no_rows_is_no_data() {
        assert!(process_vamp(None).is_none());
        assert!(process_vamp(Some(&json!({"data": {"data": []}}))).is_none());
    }
}

use serde_json::Value;

use super::shape::Table;

/// Positional rows of a tabular domain payload (orders, VAMP, latency), plus the
/// column names when the backend sent them.
#[derive(Debug, Clone)]
pub struct RowSet<'a> {
    pub columns: Vec<String>,
    pub rows: Vec<&'a [Value]>,
}

impl<'a> RowSet<'a> {
    /// Locates rows in `{data:{data:[[..]]}}`, `{data:{columns,data}}`,
    /// `{columns,data:[[..]]}` or `{data:[[..]]}`. Non-array rows are skipped.
    pub fn locate(payload: Option<&'a Value>) -> Option<Self> {
        let payload = payload?;
        let data = payload.get("data")?;

        let (columns, rows) = if let Some(inner) = data.get("data").and_then(Value::as_array) {
            let columns = Table::from_value(data).map(|t| t.columns).unwrap_or_default();
            (columns, inner)
        } else if let Some(rows) = data.as_array() {
            let columns = Table::from_value(payload).map(|t| t.columns).unwrap_or_default();
            (columns, rows)
        } else {
            return None;
        };

        Some(Self {
            columns,
            rows: rows.iter().filter_map(Value::as_array).map(Vec::as_slice).collect(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Positional default when the payload carried no column names. Otherwise the
    /// first matching candidate, and `None` when the field is not among the columns.
    pub fn index(&self, candidates: &[&str], default: usize) -> Option<usize> {
        if self.columns.is_empty() {
            return Some(default);
        }
        candidates
            .iter()
            .find_map(|c| self.columns.iter().position(|col| col.eq_ignore_ascii_case(c)))
    }

    /// Cell of `row` at a resolved column.
    pub fn cell<'r>(row: &'r [Value], index: Option<usize>) -> Option<&'r Value> {
        index.and_then(|i| row.get(i))
    }
}

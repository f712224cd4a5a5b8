use serde_json::Value;
use tracing::debug;

use super::coerce;
use crate::types::NormalizedRow;

/// Field names a caller accepts for each logical column, highest priority first.
#[derive(Debug, Clone, Copy)]
pub struct FieldCandidates<'a> {
    pub level: &'a [&'a str],
    pub count: &'a [&'a str],
    pub percent: &'a [&'a str],
}

/// Fallback percent field used when none of the caller's candidates is present.
const PERCENT_FIELD: &str = "percent";

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// A `{ columns: [...], data: [[...], ...] }` block.
#[derive(Debug, Clone)]
pub struct Table<'a> {
    pub columns: Vec<String>,
    pub rows: &'a [Value],
}

impl<'a> Table<'a> {
    /// Requires both `columns` and `data` to be arrays.
    pub fn from_value(v: &'a Value) -> Option<Self> {
        let columns = v.get("columns")?.as_array()?;
        let rows = v.get("data")?.as_array()?;
        Some(Self {
            columns: columns.iter().map(column_name).collect(),
            rows,
        })
    }

    /// Index of the first candidate that names a column (ASCII case-insensitive).
    pub fn column(&self, candidates: &[&str]) -> Option<usize> {
        candidates.iter().find_map(|c| {
            self.columns
                .iter()
                .position(|col| col.eq_ignore_ascii_case(c))
        })
    }

    fn normalize(&self, fields: &FieldCandidates<'_>) -> Vec<NormalizedRow> {
        let (Some(level_idx), Some(count_idx)) =
            (self.column(fields.level), self.column(fields.count))
        else {
            debug!(
                columns = ?self.columns,
                "tabular payload has no level/count column among the candidates"
            );
            return Vec::new();
        };
        let percent_idx = self
            .column(fields.percent)
            .or_else(|| self.column(&[PERCENT_FIELD]));

        self.rows
            .iter()
            .filter_map(Value::as_array)
            .map(|row| NormalizedRow {
                level: row.get(level_idx).and_then(coerce::label),
                count: coerce::count(row.get(count_idx)),
                percent: percent_idx.and_then(|i| coerce::percent(row.get(i))),
            })
            .collect()
    }
}

/// Columns are either plain names or Grafana-style `{ "text": .. }` / `{ "name": .. }`.
fn column_name(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Object(o) => o
            .get("name")
            .or_else(|| o.get("text"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

// ---------------------------------------------------------------------------
// WireShape
// ---------------------------------------------------------------------------

/// The three response layouts the analytics backend uses for level/count data.
#[derive(Debug, Clone)]
pub enum WireShape<'a> {
    /// `{ data: [ { level: .., count: .., percent?: .. }, ... ] }`
    ObjectList(&'a [Value]),
    /// `{ columns: [...], data: [[...], ...] }`
    Tabular(Table<'a>),
    /// `{ data: { columns: [...], data: [[...], ...] } }`
    NestedTabular(Table<'a>),
}

impl<'a> WireShape<'a> {
    /// Ordered structural checks; the first match wins.
    pub fn detect(payload: &'a Value) -> Option<Self> {
        let data = payload.get("data")?;

        if let Some(items) = data.as_array() {
            // stray non-object rows are skipped during extraction
            if items.is_empty() || items.iter().any(Value::is_object) {
                return Some(WireShape::ObjectList(items));
            }
        }
        if let Some(table) = Table::from_value(payload) {
            return Some(WireShape::Tabular(table));
        }
        if data.is_object() {
            if let Some(table) = Table::from_value(data) {
                return Some(WireShape::NestedTabular(table));
            }
        }
        None
    }

    pub fn name(&self) -> &'static str {
        match self {
            WireShape::ObjectList(_) => "object_list",
            WireShape::Tabular(_) => "tabular",
            WireShape::NestedTabular(_) => "nested_tabular",
        }
    }

    pub fn rows(&self, fields: &FieldCandidates<'_>) -> Vec<NormalizedRow> {
        match self {
            WireShape::ObjectList(items) => items
                .iter()
                .filter_map(Value::as_object)
                .map(|obj| NormalizedRow {
                    level: first_present(obj, fields.level).and_then(coerce::label),
                    count: coerce::count(first_present(obj, fields.count)),
                    percent: coerce::percent(
                        first_present(obj, fields.percent)
                            .or_else(|| first_present(obj, &[PERCENT_FIELD])),
                    ),
                })
                .collect(),
            WireShape::Tabular(table) | WireShape::NestedTabular(table) => table.normalize(fields),
        }
    }
}

/// First candidate key carrying a non-null value.
fn first_present<'v>(
    obj: &'v serde_json::Map<String, Value>,
    candidates: &[&str],
) -> Option<&'v Value> {
    candidates
        .iter()
        .filter_map(|c| obj.get(*c))
        .find(|v| !v.is_null())
}

/// Extract `(level, count, percent)` rows from any supported shape.
/// A null payload or an unrecognized layout yields no rows.
pub fn normalize_level_counts(
    payload: Option<&Value>,
    fields: &FieldCandidates<'_>,
) -> Vec<NormalizedRow> {
    let Some(payload) = payload else {
        return Vec::new();
    };
    match WireShape::detect(payload) {
        Some(shape) => {
            let rows = shape.rows(fields);
            debug!(shape = shape.name(), rows = rows.len(), "normalized level/count payload");
            rows
        }
        None => {
            debug!("payload matched no supported level/count shape");
            Vec::new()
        }
    }
}

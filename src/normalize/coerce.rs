//! Value coercion shared by the normalizer and every processor.
//! The backend mixes JSON numbers and numeric strings freely.

use serde_json::Value;

/// Finite number from a JSON number or a numeric string.
pub fn number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Finite number or 0.
pub fn number_or_zero(v: Option<&Value>) -> f64 {
    v.and_then(number).unwrap_or(0.0)
}

/// Counts are never negative, never NaN and default to 0.
pub fn count(v: Option<&Value>) -> f64 {
    match v.and_then(number) {
        Some(n) if n > 0.0 => n,
        _ => 0.0,
    }
}

/// Percent is either a finite number or absent.
pub fn percent(v: Option<&Value>) -> Option<f64> {
    v.and_then(number)
}

/// Display label for a level / name cell. Null and structured values have none.
pub fn label(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

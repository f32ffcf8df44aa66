//! How template data behaves in conditions and in text: the
//! JavaScript rules, applied to `serde_json::Value`s.

use std::cmp::Ordering;

use serde_json::{Number, Value};

/// `None` is a missing value (`undefined`).
pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn number_string(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        i.to_string()
    } else if let Some(u) = n.as_u64() {
        u.to_string()
    } else {
        // f64's Display prints integral values without a fraction,
        // like JavaScript
        n.as_f64().map(|f| f.to_string()).unwrap_or_default()
    }
}

/// Conversion to a string the way JavaScript's `String(value)` does
/// it.
pub fn js_string(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_string(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(|item| match item {
                Value::Null => String::new(),
                item => js_string(item),
            }).collect();
            parts.join(",")
        }
        Value::Object(_) => "[object Object]".into(),
    }
}

/// The text an interpolated value contributes to the output; `null`
/// contributes nothing, like a missing value.
pub fn output_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        value => js_string(value),
    }
}

/// Ordering of JavaScript's `<` and `>` for the common cases: numbers
/// numerically, strings by UTF-16 code units, everything else equal.
pub fn js_compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) =>
            x.as_f64().partial_cmp(&y.as_f64()).unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) =>
            x.encode_utf16().cmp(y.encode_utf16()),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

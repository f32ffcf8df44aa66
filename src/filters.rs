//! The standard filters, callable as `filters.isEmpty(x)` and
//! `filters.sort(x, reverse, orderBy)`.

use serde_json::{Map, Value};

use crate::runtime::Library;
use crate::value::{js_compare, js_string, truthy};

fn arg(args: &[Value], i: usize) -> &Value {
    args.get(i).unwrap_or(&Value::Null)
}

/// True for falsy values, empty arrays, empty objects, and anything
/// else without own properties (numbers and booleans).
pub fn is_empty(args: &[Value]) -> Value {
    let value = arg(args, 0);
    let empty = !truthy(Some(value)) || match value {
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::String(s) => s.is_empty(),
        Value::Number(_) | Value::Bool(_) | Value::Null => true,
    };
    Value::Bool(empty)
}

/// Sorted copy of an array (by string form, or by the `orderBy`
/// property of its items) or of an object (by key). If the second
/// argument is not a boolean it is taken as `orderBy`.
pub fn sort(args: &[Value]) -> Value {
    let value = arg(args, 0);
    let (reverse, order_by) = match arg(args, 1) {
        Value::Bool(b) => (*b, arg(args, 2)),
        other => (false, other),
    };
    match value {
        Value::Array(items) if items.len() > 1 => {
            let mut items = items.clone();
            if truthy(Some(order_by)) {
                let key = js_string(order_by);
                items.sort_by(|a, b| js_compare(a.get(&key), b.get(&key)));
            } else {
                items.sort_by(|a, b| js_string(a).encode_utf16().cmp(js_string(b).encode_utf16()));
            }
            if reverse {
                items.reverse();
            }
            Value::Array(items)
        }
        Value::Object(map) if map.len() > 1 => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| a.encode_utf16().cmp(b.encode_utf16()));
            if reverse {
                keys.reverse();
            }
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), map[key.as_str()].clone());
            }
            Value::Object(sorted)
        }
        value => value.clone()
    }
}

pub fn install(library: &mut Library) {
    library.add_filter("isEmpty", is_empty);
    library.add_filter("sort", sort);
}

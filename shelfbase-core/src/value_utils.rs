//! JSON value helpers shared by both matchers and the sorter

use serde_json::Value;
use std::cmp::Ordering;

/// Get a field from a document, with dot notation support
///
/// - Simple fields: "name"
/// - Nested objects: "address.city"
/// - Array indexing: "tags.0"
///
/// A key that itself contains a dot is found by the fast path first.
///
/// ```
/// use serde_json::json;
/// use shelfbase_core::value_utils::get_nested_value;
///
/// let doc = json!({"address": {"city": "Lyon"}});
/// assert_eq!(get_nested_value(&doc, "address.city"), Some(&json!("Lyon")));
/// ```
pub fn get_nested_value<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(direct) = doc.get(path) {
        return Some(direct);
    }
    if !path.contains('.') {
        return None;
    }

    let mut value = doc;
    for part in path.split('.') {
        match value {
            Value::Object(map) => value = map.get(part)?,
            Value::Array(arr) => value = arr.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        }
    }
    Some(value)
}

/// Strict equality between two JSON values.
///
/// Numbers compare by numeric value (`1` equals `1.0`), everything else
/// must match in type and content. Objects and arrays compare deeply.
pub fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n1), Value::Number(n2)) => {
            if n1 == n2 {
                return true;
            }
            match (n1.as_f64(), n2.as_f64()) {
                (Some(f1), Some(f2)) => f1 == f2,
                _ => false,
            }
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| strict_equals(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).map(|other| strict_equals(v, other)).unwrap_or(false))
        }
        _ => a == b,
    }
}

/// Compare two JSON values
///
/// `Some(Ordering)` for numbers, strings and booleans of the same kind,
/// `None` for anything else. `$gt`/`$lt` treat `None` as "no match".
///
/// ```
/// use serde_json::json;
/// use std::cmp::Ordering;
/// use shelfbase_core::value_utils::compare_values;
///
/// assert_eq!(compare_values(&json!(10), &json!(5)), Some(Ordering::Greater));
/// assert_eq!(compare_values(&json!("a"), &json!(1)), None);
/// ```
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(n1), Value::Number(n2)) => {
            let f1 = n1.as_f64()?;
            let f2 = n2.as_f64()?;
            f1.partial_cmp(&f2)
        }
        (Value::String(s1), Value::String(s2)) => Some(s1.cmp(s2)),
        (Value::Bool(b1), Value::Bool(b2)) => Some(b1.cmp(b2)),
        _ => None,
    }
}

/// Total order used by `orderBy`.
///
/// Missing < null < number < string < bool < object < array; values of the
/// same comparable kind use [`compare_values`], the rest tie so the stable
/// sort keeps insertion order.
pub fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(av), Some(bv)) => {
            let by_type = type_priority(av).cmp(&type_priority(bv));
            if by_type != Ordering::Equal {
                return by_type;
            }
            compare_values(av, bv).unwrap_or(Ordering::Equal)
        }
    }
}

fn type_priority(val: &Value) -> u8 {
    match val {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Bool(_) => 3,
        Value::Object(_) => 4,
        Value::Array(_) => 5,
    }
}

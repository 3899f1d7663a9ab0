// shelfbase-core/src/find_options.rs
// read_many options: where, orderBy, limit, skip

use std::cmp::Ordering;
use std::convert::TryFrom;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ShelfError;
use crate::query::Where;
use crate::value_utils::{get_nested_value, sort_order};

/// Options for `read_many`.
///
/// Deserializes from the wire form
/// `{"where": ..., "orderBy": {"posted": "desc"}, "limit": 2, "skip": 1}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadManyOptions {
    #[serde(rename = "where", default, skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<Where>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<usize>,
}

impl ReadManyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_where(mut self, where_clause: impl Into<Where>) -> Self {
        self.where_clause = Some(where_clause.into());
        self
    }

    /// Append a sort key; earlier keys take priority
    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by
            .get_or_insert_with(OrderBy::default)
            .push(field, direction);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    /// Accepts "asc"/"desc" (any case, long forms too) and 1/-1
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => match s.to_lowercase().as_str() {
                "asc" | "ascending" => Some(SortDirection::Asc),
                "desc" | "descending" => Some(SortDirection::Desc),
                _ => None,
            },
            Value::Number(n) => match n.as_i64() {
                Some(1) => Some(SortDirection::Asc),
                Some(-1) => Some(SortDirection::Desc),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Ordered sort keys. Key order is the caller's order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct OrderBy {
    keys: Vec<(String, SortDirection)>,
}

impl OrderBy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, direction: SortDirection) {
        self.keys.push((field.into(), direction));
    }

    pub fn keys(&self) -> &[(String, SortDirection)] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl TryFrom<Map<String, Value>> for OrderBy {
    type Error = ShelfError;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut order_by = OrderBy::new();
        for (field, raw) in map {
            let direction = SortDirection::from_value(&raw).ok_or_else(|| {
                ShelfError::InvalidQuery(format!(
                    "Sort direction for '{}' must be \"asc\" or \"desc\", got {}",
                    field, raw
                ))
            })?;
            order_by.push(field, direction);
        }
        Ok(order_by)
    }
}

impl From<OrderBy> for Map<String, Value> {
    fn from(order_by: OrderBy) -> Self {
        order_by
            .keys
            .into_iter()
            .map(|(field, direction)| (field, Value::String(direction.as_str().to_string())))
            .collect()
    }
}

/// Stable multi-key sort; comparison stops at the first differing key.
/// Supports dot notation for nested fields.
pub fn apply_sort(docs: &mut [Value], order_by: &OrderBy) {
    if order_by.is_empty() {
        return;
    }

    docs.sort_by(|a, b| {
        for (field, direction) in order_by.keys() {
            let cmp = sort_order(get_nested_value(a, field), get_nested_value(b, field));
            if cmp != Ordering::Equal {
                return match direction {
                    SortDirection::Asc => cmp,
                    SortDirection::Desc => cmp.reverse(),
                };
            }
        }
        Ordering::Equal
    });
}

/// Drop `skip` documents from the front, keep at most `limit` of the rest
pub fn apply_skip_limit(docs: Vec<Value>, skip: usize, limit: usize) -> Vec<Value> {
    docs.into_iter().skip(skip).take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_wire_options() {
        let options: ReadManyOptions = serde_json::from_value(json!({
            "where": {"role": "admin"},
            "orderBy": {"posted": "desc", "name": "asc"},
            "limit": 2,
            "skip": 1
        }))
        .unwrap();

        assert!(matches!(options.where_clause, Some(Where::One(_))));
        let keys = options.order_by.as_ref().unwrap().keys();
        assert_eq!(keys[0], ("posted".to_string(), SortDirection::Desc));
        assert_eq!(keys[1], ("name".to_string(), SortDirection::Asc));
        assert_eq!(options.limit, Some(2));
        assert_eq!(options.skip, Some(1));
    }

    #[test]
    fn test_parse_rejects_bad_direction() {
        let parsed: Result<ReadManyOptions, _> =
            serde_json::from_value(json!({"orderBy": {"posted": "sideways"}}));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_numeric_directions() {
        assert_eq!(SortDirection::from_value(&json!(1)), Some(SortDirection::Asc));
        assert_eq!(SortDirection::from_value(&json!(-1)), Some(SortDirection::Desc));
        assert_eq!(SortDirection::from_value(&json!(0)), None);
    }

    #[test]
    fn test_order_by_serializes_back() {
        let options = ReadManyOptions::new()
            .order_by("b", SortDirection::Desc)
            .order_by("a", SortDirection::Asc);
        let value = serde_json::to_value(&options).unwrap();
        assert_eq!(value, json!({"orderBy": {"b": "desc", "a": "asc"}}));
    }

    #[test]
    fn test_sort_descending() {
        let mut docs = vec![json!({"posted": 1}), json!({"posted": 3}), json!({"posted": 2})];
        let order = ReadManyOptions::new().order_by("posted", SortDirection::Desc);
        apply_sort(&mut docs, order.order_by.as_ref().unwrap());
        let posted: Vec<i64> = docs.iter().map(|d| d["posted"].as_i64().unwrap()).collect();
        assert_eq!(posted, vec![3, 2, 1]);
    }

    #[test]
    fn test_sort_multi_key_priority() {
        let mut docs = vec![
            json!({"age": 30, "name": "Bob"}),
            json!({"age": 25, "name": "Alice"}),
            json!({"age": 30, "name": "Carol"}),
        ];
        let mut order = OrderBy::new();
        order.push("age", SortDirection::Asc);
        order.push("name", SortDirection::Desc);
        apply_sort(&mut docs, &order);

        assert_eq!(docs[0]["name"], "Alice");
        assert_eq!(docs[1]["name"], "Carol");
        assert_eq!(docs[2]["name"], "Bob");
    }

    #[test]
    fn test_sort_is_stable() {
        let mut docs = vec![
            json!({"group": 1, "seq": "a"}),
            json!({"group": 0, "seq": "b"}),
            json!({"group": 1, "seq": "c"}),
            json!({"group": 0, "seq": "d"}),
        ];
        let mut order = OrderBy::new();
        order.push("group", SortDirection::Asc);
        apply_sort(&mut docs, &order);
        let seq: Vec<&str> = docs.iter().map(|d| d["seq"].as_str().unwrap()).collect();
        assert_eq!(seq, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_sort_missing_field_first() {
        let mut docs = vec![
            json!({"name": "Alice", "address": {"zip": 10000}}),
            json!({"name": "Bob"}),
        ];
        let mut order = OrderBy::new();
        order.push("address.zip", SortDirection::Asc);
        apply_sort(&mut docs, &order);
        assert_eq!(docs[0]["name"], "Bob");
    }

    #[test]
    fn test_skip_limit() {
        let docs: Vec<Value> = (1..=5).map(|n| json!({"n": n})).collect();
        let page = apply_skip_limit(docs.clone(), 1, 2);
        assert_eq!(page, vec![json!({"n": 2}), json!({"n": 3})]);

        assert!(apply_skip_limit(docs.clone(), 10, 2).is_empty());
        assert_eq!(apply_skip_limit(docs, 3, 10).len(), 2);
    }
}

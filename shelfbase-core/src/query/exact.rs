// src/query/exact.rs
use serde_json::{Map, Value};

use crate::value_utils::strict_equals;

/// Flat strict-equality match used by `read`, `update` and `remove`.
///
/// Every key of `query` must be a top-level field of `document` whose value is
/// strictly equal to the query value. No operators, no dot notation: `$gt` is
/// just a field name here. An empty query matches every document.
pub fn matches_exact(document: &Value, query: &Map<String, Value>) -> bool {
    query.iter().all(|(field, expected)| {
        document
            .get(field)
            .map(|actual| strict_equals(actual, expected))
            .unwrap_or(false)
    })
}

/// Index of the first document matching `query`
pub fn position_exact(documents: &[Value], query: &Map<String, Value>) -> Option<usize> {
    documents.iter().position(|doc| matches_exact(doc, query))
}

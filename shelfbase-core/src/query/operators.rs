// src/query/operators.rs
//! Condition tree used by `read_many`
//!
//! A condition is a JSON object. Each entry is either
//!
//! - a field rule: `{"role": "admin"}` (strict equality) or
//!   `{"posted": {"$gt": 1, "$lt": 5}}` (every operator must hold), or
//! - a logical rule over a list of nested conditions:
//!   `{"$or": [{...}, {...}]}`, `{"$and": [...]}`, `{"$not": [...]}`.
//!
//! Entries are evaluated in order and evaluation stops at the first one that
//! fails. A `where` clause is one condition or an array of them, and a
//! document is selected when it satisfies any of them.
//!
//! ```text
//! FieldOperator trait           LogicalOperator
//!   $eq $ne $gt $gte              $and  all nested conditions hold
//!   $lt $lte $in $not             $or   at least one holds
//!                                 $not  none of them holds
//! ```

use std::collections::HashMap;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, ShelfError};
use crate::value_utils::{compare_values, get_nested_value, strict_equals};

// ============================================================================
// WHERE CLAUSE
// ============================================================================

/// One condition or a set of them; the set is OR-ed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Where {
    Many(Vec<Value>),
    One(Value),
}

impl Where {
    pub fn conditions(&self) -> &[Value] {
        match self {
            Where::Many(conditions) => conditions,
            Where::One(condition) => std::slice::from_ref(condition),
        }
    }

    /// Walk every condition once so malformed input is reported even when no
    /// document would reach the broken branch.
    pub fn check(&self) -> Result<()> {
        self.conditions().iter().try_for_each(check_condition)
    }
}

impl From<Value> for Where {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(conditions) => Where::Many(conditions),
            other => Where::One(other),
        }
    }
}

// ============================================================================
// FIELD OPERATORS
// ============================================================================

/// Operator applied to a single field value, e.g. `{"age": {"$gt": 18}}`
pub trait FieldOperator: Send + Sync {
    fn name(&self) -> &'static str;

    /// `doc_value` is `None` when the field is missing from the document
    fn matches(&self, doc_value: Option<&Value>, operand: &Value) -> Result<bool>;
}

pub struct EqOperator;

impl FieldOperator for EqOperator {
    fn name(&self) -> &'static str {
        "$eq"
    }

    fn matches(&self, doc_value: Option<&Value>, operand: &Value) -> Result<bool> {
        Ok(doc_value.map(|v| strict_equals(v, operand)).unwrap_or(false))
    }
}

/// `$ne` also matches documents that lack the field
pub struct NeOperator;

impl FieldOperator for NeOperator {
    fn name(&self) -> &'static str {
        "$ne"
    }

    fn matches(&self, doc_value: Option<&Value>, operand: &Value) -> Result<bool> {
        Ok(!EqOperator.matches(doc_value, operand)?)
    }
}

pub struct GtOperator;

impl FieldOperator for GtOperator {
    fn name(&self) -> &'static str {
        "$gt"
    }

    fn matches(&self, doc_value: Option<&Value>, operand: &Value) -> Result<bool> {
        Ok(compare_with(doc_value, operand, |ord| ord.is_gt()))
    }
}

pub struct GteOperator;

impl FieldOperator for GteOperator {
    fn name(&self) -> &'static str {
        "$gte"
    }

    fn matches(&self, doc_value: Option<&Value>, operand: &Value) -> Result<bool> {
        Ok(compare_with(doc_value, operand, |ord| ord.is_ge()))
    }
}

pub struct LtOperator;

impl FieldOperator for LtOperator {
    fn name(&self) -> &'static str {
        "$lt"
    }

    fn matches(&self, doc_value: Option<&Value>, operand: &Value) -> Result<bool> {
        Ok(compare_with(doc_value, operand, |ord| ord.is_lt()))
    }
}

pub struct LteOperator;

impl FieldOperator for LteOperator {
    fn name(&self) -> &'static str {
        "$lte"
    }

    fn matches(&self, doc_value: Option<&Value>, operand: &Value) -> Result<bool> {
        Ok(compare_with(doc_value, operand, |ord| ord.is_le()))
    }
}

pub struct InOperator;

impl FieldOperator for InOperator {
    fn name(&self) -> &'static str {
        "$in"
    }

    fn matches(&self, doc_value: Option<&Value>, operand: &Value) -> Result<bool> {
        let candidates = operand.as_array().ok_or_else(|| {
            ShelfError::InvalidQuery("$in operator requires an array".to_string())
        })?;
        Ok(doc_value
            .map(|v| candidates.iter().any(|c| strict_equals(v, c)))
            .unwrap_or(false))
    }
}

/// Field-level negation: `{"age": {"$not": {"$gt": 65}}}` or `{"role": {"$not": "guest"}}`
pub struct NotOperator;

impl FieldOperator for NotOperator {
    fn name(&self) -> &'static str {
        "$not"
    }

    fn matches(&self, doc_value: Option<&Value>, operand: &Value) -> Result<bool> {
        Ok(!matches_field(doc_value, operand)?)
    }
}

lazy_static! {
    /// Field operators by name, built once
    pub static ref FIELD_OPERATORS: HashMap<&'static str, Box<dyn FieldOperator>> = {
        let mut registry: HashMap<&'static str, Box<dyn FieldOperator>> = HashMap::new();
        let operators: Vec<Box<dyn FieldOperator>> = vec![
            Box::new(EqOperator),
            Box::new(NeOperator),
            Box::new(GtOperator),
            Box::new(GteOperator),
            Box::new(LtOperator),
            Box::new(LteOperator),
            Box::new(InOperator),
            Box::new(NotOperator),
        ];
        for operator in operators {
            registry.insert(operator.name(), operator);
        }
        registry
    };
}

fn field_operator(name: &str) -> Result<&'static dyn FieldOperator> {
    FIELD_OPERATORS
        .get(name)
        .map(|op| op.as_ref())
        .ok_or_else(|| ShelfError::InvalidQuery(format!("Unknown operator: {}", name)))
}

/// Ordering comparison; missing fields and incomparable types never match
fn compare_with<F>(doc_value: Option<&Value>, operand: &Value, predicate: F) -> bool
where
    F: Fn(std::cmp::Ordering) -> bool,
{
    doc_value
        .and_then(|v| compare_values(v, operand))
        .map(predicate)
        .unwrap_or(false)
}

// ============================================================================
// LOGICAL OPERATORS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
    Not,
}

impl LogicalOperator {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "$and" => Ok(LogicalOperator::And),
            "$or" => Ok(LogicalOperator::Or),
            "$not" => Ok(LogicalOperator::Not),
            other => Err(ShelfError::InvalidQuery(format!(
                "Unknown logical operator: {}",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOperator::And => "$and",
            LogicalOperator::Or => "$or",
            LogicalOperator::Not => "$not",
        }
    }

    fn evaluate(&self, document: &Value, operand: &Value) -> Result<bool> {
        let nested = self.nested_conditions(operand)?;
        match self {
            LogicalOperator::And => {
                for condition in nested {
                    if !matches_condition(document, condition)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            LogicalOperator::Or => {
                for condition in nested {
                    if matches_condition(document, condition)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            LogicalOperator::Not => {
                for condition in nested {
                    if matches_condition(document, condition)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }

    /// A list of conditions; a lone object is accepted as a one-element list
    fn nested_conditions<'a>(&self, operand: &'a Value) -> Result<&'a [Value]> {
        match operand {
            Value::Array(conditions) => Ok(conditions),
            Value::Object(_) => Ok(std::slice::from_ref(operand)),
            _ => Err(ShelfError::InvalidQuery(format!(
                "{} requires an array of conditions",
                self.as_str()
            ))),
        }
    }
}

// ============================================================================
// ENTRY POINTS
// ============================================================================

/// True when `value` is an operator object such as `{"$gt": 1}`.
///
/// Plain objects (no `$` keys) are compared literally.
fn is_operator_object(value: &Value) -> Option<&Map<String, Value>> {
    match value {
        Value::Object(map) if map.keys().any(|k| k.starts_with('$')) => Some(map),
        _ => None,
    }
}

/// Evaluate one field rule against the field's value
fn matches_field(doc_value: Option<&Value>, rule: &Value) -> Result<bool> {
    match is_operator_object(rule) {
        Some(operators) => {
            for (name, operand) in operators {
                if !name.starts_with('$') {
                    return Err(ShelfError::InvalidQuery(format!(
                        "Cannot mix field '{}' with operators",
                        name
                    )));
                }
                if !field_operator(name)?.matches(doc_value, operand)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        None => EqOperator.matches(doc_value, rule),
    }
}

/// Evaluate a single condition object against a document
pub fn matches_condition(document: &Value, condition: &Value) -> Result<bool> {
    let entries = condition
        .as_object()
        .ok_or_else(|| ShelfError::InvalidQuery("Condition must be an object".to_string()))?;

    for (key, rule) in entries {
        let holds = if key.starts_with('$') {
            LogicalOperator::parse(key)?.evaluate(document, rule)?
        } else {
            matches_field(get_nested_value(document, key), rule)?
        };
        if !holds {
            return Ok(false);
        }
    }
    Ok(true)
}

/// A document matches a where clause when any of its conditions holds
pub fn matches_where(document: &Value, where_clause: &Where) -> Result<bool> {
    for condition in where_clause.conditions() {
        if matches_condition(document, condition)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn check_condition(condition: &Value) -> Result<()> {
    let entries = condition
        .as_object()
        .ok_or_else(|| ShelfError::InvalidQuery("Condition must be an object".to_string()))?;

    for (key, rule) in entries {
        if key.starts_with('$') {
            let logical = LogicalOperator::parse(key)?;
            logical
                .nested_conditions(rule)?
                .iter()
                .try_for_each(check_condition)?;
        } else {
            check_field_rule(rule)?;
        }
    }
    Ok(())
}

fn check_field_rule(rule: &Value) -> Result<()> {
    if let Some(operators) = is_operator_object(rule) {
        for (name, operand) in operators {
            if !name.starts_with('$') {
                return Err(ShelfError::InvalidQuery(format!(
                    "Cannot mix field '{}' with operators",
                    name
                )));
            }
            field_operator(name)?;
            match name.as_str() {
                "$in" if !operand.is_array() => {
                    return Err(ShelfError::InvalidQuery(
                        "$in operator requires an array".to_string(),
                    ))
                }
                "$not" => check_field_rule(operand)?,
                _ => {}
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_comparison_operators() {
        assert!(GtOperator.matches(Some(&json!(10)), &json!(5)).unwrap());
        assert!(!GtOperator.matches(Some(&json!(5)), &json!(5)).unwrap());
        assert!(GteOperator.matches(Some(&json!(5)), &json!(5)).unwrap());
        assert!(LtOperator.matches(Some(&json!("a")), &json!("b")).unwrap());
        assert!(LteOperator.matches(Some(&json!(5.0)), &json!(5)).unwrap());
        assert!(!LtOperator.matches(None, &json!(5)).unwrap());
        // incomparable types
        assert!(!GtOperator.matches(Some(&json!("10")), &json!(5)).unwrap());
    }

    #[test]
    fn test_eq_ne_missing_field() {
        assert!(!EqOperator.matches(None, &json!(null)).unwrap());
        assert!(NeOperator.matches(None, &json!("x")).unwrap());
        assert!(!NeOperator.matches(Some(&json!("x")), &json!("x")).unwrap());
    }

    #[test]
    fn test_in_requires_array() {
        assert!(InOperator.matches(Some(&json!(2)), &json!([1, 2, 3])).unwrap());
        assert!(!InOperator.matches(Some(&json!(4)), &json!([1, 2, 3])).unwrap());
        assert!(InOperator.matches(Some(&json!(1)), &json!(1)).is_err());
    }

    #[test]
    fn test_direct_equality_condition() {
        let doc = json!({"role": "admin", "age": 40});
        assert!(matches_condition(&doc, &json!({"role": "admin"})).unwrap());
        assert!(!matches_condition(&doc, &json!({"role": "user"})).unwrap());
        assert!(matches_condition(&doc, &json!({})).unwrap());
    }

    #[test]
    fn test_operator_condition_all_must_hold() {
        let doc = json!({"posted": 3});
        assert!(matches_condition(&doc, &json!({"posted": {"$gt": 1, "$lt": 5}})).unwrap());
        assert!(!matches_condition(&doc, &json!({"posted": {"$gt": 1, "$lt": 3}})).unwrap());
        assert!(matches_condition(&doc, &json!({"posted": {"$eq": 3}})).unwrap());
    }

    #[test]
    fn test_plain_object_compared_literally() {
        let doc = json!({"meta": {"kind": "note"}});
        assert!(matches_condition(&doc, &json!({"meta": {"kind": "note"}})).unwrap());
        assert!(matches_condition(&doc, &json!({"meta.kind": "note"})).unwrap());
    }

    #[test]
    fn test_logical_or_and_not() {
        let admin = json!({"role": "admin", "active": true});
        let guest = json!({"role": "guest", "active": false});

        let or = json!({"$or": [{"role": "admin"}, {"role": "user"}]});
        assert!(matches_condition(&admin, &or).unwrap());
        assert!(!matches_condition(&guest, &or).unwrap());

        let and = json!({"$and": [{"role": "admin"}, {"active": true}]});
        assert!(matches_condition(&admin, &and).unwrap());
        assert!(!matches_condition(&guest, &and).unwrap());

        let not = json!({"$not": [{"role": "admin"}, {"active": true}]});
        assert!(!matches_condition(&admin, &not).unwrap());
        assert!(matches_condition(&guest, &not).unwrap());

        let not_single = json!({"$not": {"role": "guest"}});
        assert!(matches_condition(&admin, &not_single).unwrap());
    }

    #[test]
    fn test_field_level_not() {
        let doc = json!({"age": 70});
        assert!(!matches_condition(&doc, &json!({"age": {"$not": {"$gt": 65}}})).unwrap());
        assert!(matches_condition(&doc, &json!({"age": {"$not": 20}})).unwrap());
    }

    #[test]
    fn test_nested_logic() {
        let doc = json!({"role": "user", "posts": 12});
        let condition = json!({
            "$or": [
                {"role": "admin"},
                {"$and": [{"role": "user"}, {"posts": {"$gt": 10}}]}
            ]
        });
        assert!(matches_condition(&doc, &condition).unwrap());
    }

    #[test]
    fn test_where_is_or_across_set() {
        let doc = json!({"role": "user"});
        let clause = Where::from(json!([{"role": "admin"}, {"role": "user"}]));
        assert!(matches_where(&doc, &clause).unwrap());

        let single = Where::from(json!({"role": "admin"}));
        assert!(!matches_where(&doc, &single).unwrap());

        let empty = Where::Many(vec![]);
        assert!(!matches_where(&doc, &empty).unwrap());
    }

    #[test]
    fn test_where_deserializes_both_shapes() {
        let many: Where = serde_json::from_value(json!([{"a": 1}])).unwrap();
        assert!(matches!(many, Where::Many(ref v) if v.len() == 1));
        let one: Where = serde_json::from_value(json!({"a": 1})).unwrap();
        assert!(matches!(one, Where::One(_)));
    }

    #[test]
    fn test_malformed_conditions() {
        let doc = json!({"a": 1});
        assert!(matches_condition(&doc, &json!({"a": {"$regex": "x"}})).is_err());
        assert!(matches_condition(&doc, &json!({"$xor": []})).is_err());
        assert!(matches_condition(&doc, &json!({"$or": 5})).is_err());
        assert!(matches_condition(&doc, &json!("a")).is_err());
        assert!(matches_condition(&doc, &json!({"a": {"$gt": 0, "b": 1}})).is_err());
    }

    #[test]
    fn test_check_finds_errors_in_unreached_branches() {
        let clause = Where::from(json!([{}, {"$or": [{"x": {"$bogus": 1}}]}]));
        assert!(clause.check().is_err());

        let bad_in = Where::from(json!({"x": {"$not": {"$in": 3}}}));
        assert!(bad_in.check().is_err());

        let ok = Where::from(json!({"$and": [{"x": {"$in": [1]}}, {"y": {"$not": {"$lt": 2}}}]}));
        assert!(ok.check().is_ok());
    }
}

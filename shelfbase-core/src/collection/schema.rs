use std::collections::HashMap;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{Result, ShelfError};

/// Compiled property schema
#[derive(Clone, Debug)]
pub struct PropertySchema {
    pub schema_type: Option<SchemaType>,
    pub enum_values: Option<Vec<Value>>,
    pub pattern: Option<Regex>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
}

impl PropertySchema {
    pub fn new(schema_type: Option<SchemaType>) -> Self {
        Self {
            schema_type,
            enum_values: None,
            pattern: None,
            min_length: None,
            max_length: None,
            minimum: None,
            maximum: None,
            min_items: None,
            max_items: None,
        }
    }
}

/// Document schema in a JSON Schema subset.
///
/// Compiled once when the collection is built; `validate` reports every
/// issue it finds instead of stopping at the first.
#[derive(Clone, Debug)]
pub struct Schema {
    raw: Value,
    required: Vec<String>,
    properties: HashMap<String, PropertySchema>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Null,
}

impl SchemaType {
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            "null" => Some(Self::Null),
            _ => None,
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            SchemaType::String => value.is_string(),
            SchemaType::Number => value.is_number(),
            SchemaType::Integer => match value {
                Value::Number(n) => {
                    n.is_i64() || n.is_u64() || n.as_f64().map_or(false, |f| f.fract() == 0.0)
                }
                _ => false,
            },
            SchemaType::Boolean => value.is_boolean(),
            SchemaType::Object => value.is_object(),
            SchemaType::Array => value.is_array(),
            SchemaType::Null => value.is_null(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::String => "string",
            SchemaType::Number => "number",
            SchemaType::Integer => "integer",
            SchemaType::Boolean => "boolean",
            SchemaType::Object => "object",
            SchemaType::Array => "array",
            SchemaType::Null => "null",
        }
    }
}

fn schema_error(msg: impl Into<String>) -> ShelfError {
    ShelfError::InvalidSchema(msg.into())
}

fn read_count(definition: &Value, keyword: &str, field: &str) -> Result<Option<usize>> {
    match definition.get(keyword) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| {
                schema_error(format!(
                    "Property '{}' {} must be a non-negative integer",
                    field, keyword
                ))
            }),
    }
}

fn read_bound(definition: &Value, keyword: &str, field: &str) -> Result<Option<f64>> {
    match definition.get(keyword) {
        None => Ok(None),
        Some(value) => value.as_f64().map(Some).ok_or_else(|| {
            schema_error(format!("Property '{}' {} must be a number", field, keyword))
        }),
    }
}

impl Schema {
    pub fn from_value(schema: &Value) -> Result<Self> {
        let obj = schema
            .as_object()
            .ok_or_else(|| schema_error("Schema must be a JSON object"))?;

        if let Some(schema_type) = obj.get("type") {
            let type_str = schema_type
                .as_str()
                .ok_or_else(|| schema_error("Schema type must be a string"))?;
            if type_str != "object" {
                return Err(schema_error("Only object schemas are supported"));
            }
        }

        let mut required = Vec::new();
        if let Some(required_value) = obj.get("required") {
            let arr = required_value
                .as_array()
                .ok_or_else(|| schema_error("required must be an array of field names"))?;
            for entry in arr {
                let field = entry
                    .as_str()
                    .ok_or_else(|| schema_error("required entries must be strings"))?;
                required.push(field.to_string());
            }
        }

        let mut properties = HashMap::new();
        if let Some(props) = obj.get("properties") {
            let props_obj = props
                .as_object()
                .ok_or_else(|| schema_error("properties must be an object"))?;
            for (field, definition) in props_obj {
                if !definition.is_object() {
                    return Err(schema_error(format!(
                        "Property '{}' schema must be an object",
                        field
                    )));
                }

                let schema_type = match definition.get("type") {
                    None => None,
                    Some(type_value) => {
                        let type_str = type_value.as_str().ok_or_else(|| {
                            schema_error(format!("Property '{}' type must be a string", field))
                        })?;
                        Some(SchemaType::from_str(type_str).ok_or_else(|| {
                            schema_error(format!(
                                "Unsupported type '{}' for field '{}'",
                                type_str, field
                            ))
                        })?)
                    }
                };

                let mut prop = PropertySchema::new(schema_type);

                if let Some(enum_value) = definition.get("enum") {
                    let enum_arr = enum_value.as_array().ok_or_else(|| {
                        schema_error(format!("Property '{}' enum must be an array", field))
                    })?;
                    prop.enum_values = Some(enum_arr.clone());
                }

                if let Some(pattern_value) = definition.get("pattern") {
                    let pattern_str = pattern_value.as_str().ok_or_else(|| {
                        schema_error(format!("Property '{}' pattern must be a string", field))
                    })?;
                    let regex = Regex::new(pattern_str).map_err(|e| {
                        schema_error(format!(
                            "Property '{}' has invalid regex pattern: {}",
                            field, e
                        ))
                    })?;
                    prop.pattern = Some(regex);
                }

                prop.min_length = read_count(definition, "minLength", field)?;
                prop.max_length = read_count(definition, "maxLength", field)?;
                prop.minimum = read_bound(definition, "minimum", field)?;
                prop.maximum = read_bound(definition, "maximum", field)?;
                prop.min_items = read_count(definition, "minItems", field)?;
                prop.max_items = read_count(definition, "maxItems", field)?;

                properties.insert(field.clone(), prop);
            }
        }

        Ok(Schema {
            raw: schema.clone(),
            required,
            properties,
        })
    }

    /// The definition this schema was compiled from
    pub fn as_value(&self) -> &Value {
        &self.raw
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Every issue found in `document`; empty when it conforms
    pub fn validate(&self, document: &Value) -> Vec<String> {
        match document.as_object() {
            Some(obj) => self.validate_object(obj),
            None => vec!["Document must be a JSON object".to_string()],
        }
    }

    pub fn validate_object(&self, obj: &Map<String, Value>) -> Vec<String> {
        let mut issues = Vec::new();

        for field in &self.required {
            if !obj.contains_key(field) {
                issues.push(format!("Missing required field '{}'", field));
            }
        }

        // Sorted so the joined message is stable
        let mut fields: Vec<&String> = self.properties.keys().collect();
        fields.sort();

        for field in fields {
            let prop = &self.properties[field];
            if let Some(value) = obj.get(field) {
                check_property(field, prop, value, &mut issues);
            }
        }

        issues
    }

    /// `Ok(())` or a validation error carrying all issues
    pub fn check(&self, document: &Value) -> Result<()> {
        let issues = self.validate(document);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ShelfError::validation(&issues))
        }
    }
}

fn check_property(field: &str, prop: &PropertySchema, value: &Value, issues: &mut Vec<String>) {
    if let Some(schema_type) = prop.schema_type {
        if !schema_type.matches(value) {
            issues.push(format!(
                "Field '{}' expected type {}",
                field,
                schema_type.as_str()
            ));
            return;
        }
    }

    if let Some(ref allowed) = prop.enum_values {
        if !allowed.contains(value) {
            issues.push(format!(
                "Field '{}' value {} is not one of the allowed values",
                field, value
            ));
        }
    }

    if let Value::String(s) = value {
        if let Some(ref regex) = prop.pattern {
            if !regex.is_match(s) {
                issues.push(format!(
                    "Field '{}' value '{}' does not match pattern '{}'",
                    field,
                    s,
                    regex.as_str()
                ));
            }
        }

        let len = s.chars().count();
        if let Some(min) = prop.min_length {
            if len < min {
                issues.push(format!(
                    "Field '{}' is shorter than {} characters",
                    field, min
                ));
            }
        }
        if let Some(max) = prop.max_length {
            if len > max {
                issues.push(format!("Field '{}' is longer than {} characters", field, max));
            }
        }
    }

    if let Some(n) = value.as_f64() {
        if let Some(min) = prop.minimum {
            if n < min {
                issues.push(format!("Field '{}' must be at least {}", field, min));
            }
        }
        if let Some(max) = prop.maximum {
            if n > max {
                issues.push(format!("Field '{}' must be at most {}", field, max));
            }
        }
    }

    if let Value::Array(arr) = value {
        if let Some(min) = prop.min_items {
            if arr.len() < min {
                issues.push(format!(
                    "Field '{}' array has {} items, minimum is {}",
                    field,
                    arr.len(),
                    min
                ));
            }
        }
        if let Some(max) = prop.max_items {
            if arr.len() > max {
                issues.push(format!(
                    "Field '{}' array has {} items, maximum is {}",
                    field,
                    arr.len(),
                    max
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_schema() -> Schema {
        Schema::from_value(&json!({
            "type": "object",
            "required": ["name", "email"],
            "properties": {
                "name": {"type": "string", "minLength": 2},
                "email": {"type": "string", "pattern": "^[^@]+@[^@]+$"},
                "age": {"type": "integer", "minimum": 0, "maximum": 150},
                "role": {"enum": ["admin", "member"]},
                "tags": {"type": "array", "maxItems": 2}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_schema_type_from_str() {
        assert_eq!(SchemaType::from_str("integer"), Some(SchemaType::Integer));
        assert_eq!(SchemaType::from_str("null"), Some(SchemaType::Null));
        assert!(SchemaType::from_str("int").is_none());
        assert!(SchemaType::from_str("").is_none());
    }

    #[test]
    fn test_integer_matches_whole_numbers_only() {
        assert!(SchemaType::Integer.matches(&json!(3)));
        assert!(SchemaType::Integer.matches(&json!(3.0)));
        assert!(!SchemaType::Integer.matches(&json!(3.5)));
        assert!(SchemaType::Number.matches(&json!(3.5)));
    }

    #[test]
    fn test_invalid_definitions_rejected() {
        let cases = vec![
            json!("not an object"),
            json!({"type": "array"}),
            json!({"required": "name"}),
            json!({"required": [1]}),
            json!({"properties": []}),
            json!({"properties": {"a": {"type": "int"}}}),
            json!({"properties": {"a": {"type": 1}}}),
            json!({"properties": {"a": {"enum": "x"}}}),
            json!({"properties": {"a": {"pattern": "[unclosed"}}}),
            json!({"properties": {"a": {"minLength": -1}}}),
            json!({"properties": {"a": {"maximum": "ten"}}}),
        ];
        for case in cases {
            assert!(
                matches!(Schema::from_value(&case), Err(ShelfError::InvalidSchema(_))),
                "expected {} to be rejected",
                case
            );
        }
    }

    #[test]
    fn test_conforming_document() {
        let schema = user_schema();
        let doc = json!({
            "name": "Alice",
            "email": "alice@example.com",
            "age": 30,
            "role": "admin",
            "extra": {"anything": true}
        });
        assert!(schema.validate(&doc).is_empty());
        assert!(schema.check(&doc).is_ok());
    }

    #[test]
    fn test_all_issues_reported() {
        let schema = user_schema();
        let doc = json!({
            "name": "A",
            "age": 200,
            "role": "owner",
            "tags": ["a", "b", "c"]
        });
        let issues = schema.validate(&doc);
        assert_eq!(
            issues,
            vec![
                "Missing required field 'email'".to_string(),
                "Field 'age' must be at most 150".to_string(),
                "Field 'name' is shorter than 2 characters".to_string(),
                "Field 'role' value \"owner\" is not one of the allowed values".to_string(),
                "Field 'tags' array has 3 items, maximum is 2".to_string(),
            ]
        );
    }

    #[test]
    fn test_type_mismatch_skips_other_checks() {
        let schema = user_schema();
        let issues = schema.validate(&json!({"name": 5, "email": "a@b"}));
        assert_eq!(issues, vec!["Field 'name' expected type string".to_string()]);
    }

    #[test]
    fn test_pattern_mismatch() {
        let schema = user_schema();
        let err = schema
            .check(&json!({"name": "Bob", "email": "not-an-email"}))
            .unwrap_err();
        assert!(err.to_string().contains("does not match pattern"));
    }

    #[test]
    fn test_non_object_document() {
        let schema = user_schema();
        assert_eq!(
            schema.validate(&json!([1, 2])),
            vec!["Document must be a JSON object".to_string()]
        );
    }

    #[test]
    fn test_raw_definition_kept() {
        let raw = json!({"required": ["title"]});
        let schema = Schema::from_value(&raw).unwrap();
        assert_eq!(schema.as_value(), &raw);
        assert_eq!(schema.required(), &["title".to_string()]);
    }
}

//! Schema descriptors and lax coercion of decoded values.
//!
//! A [`SchemaDescriptor`] wraps a JSON Schema. Validation runs in two passes:
//!
//! 1. A coercion walk that follows `type`, `properties`, `required`, `items`,
//!    `$ref` and `anyOf`/`oneOf`, converting lax scalars (`"42"` to `42`,
//!    `"false"` to `false`) and collecting per-field errors.
//! 2. A full [`jsonschema`] validation of the coerced value for every remaining
//!    keyword (`enum`, `minimum`, `pattern`, ...).

use jsonschema::Validator;
use schemars::JsonSchema;
use serde_json::{Map, Number, Value, json};

use super::decode::kind_of;
use super::error::{FieldError, SchemaError};

const MAX_REF_HOPS: usize = 32;

/// Declarative description of the expected structured output.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDescriptor {
    schema: Value,
}

impl SchemaDescriptor {
    /// Creates a descriptor from a JSON Schema document.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] if the schema does not compile.
    pub fn from_json_schema(schema: Value) -> Result<Self, SchemaError> {
        Validator::new(&schema).map_err(|e| SchemaError(e.to_string()))?;
        Ok(Self { schema })
    }

    /// Derives the descriptor from a Rust type through `schemars`.
    #[must_use]
    pub fn for_type<T: JsonSchema>() -> Self {
        let schema = serde_json::to_value(schemars::schema_for!(T)).unwrap_or_else(|_| json!({}));
        Self { schema }
    }

    /// The underlying JSON Schema.
    #[must_use]
    pub const fn as_json(&self) -> &Value {
        &self.schema
    }

    /// Coerces and validates `value`.
    ///
    /// A top-level sequence is wrapped as `{field: sequence}` when the schema is an
    /// object with exactly one property and that property is array-typed.
    ///
    /// # Errors
    ///
    /// Returns every field-level problem found, together with the rejected value.
    pub fn validate(&self, value: Value) -> Result<Value, (Vec<FieldError>, Value)> {
        let value = self.wrap_sequence(value);

        let mut coercer = Coercer {
            root: &self.schema,
            errors: Vec::new(),
        };
        let coerced = coercer.coerce(&self.schema, value, "");
        if !coercer.errors.is_empty() {
            return Err((coercer.errors, coerced));
        }

        let errors = collect_validation_errors(&self.schema, &coerced);
        if errors.is_empty() {
            Ok(coerced)
        } else {
            Err((errors, coerced))
        }
    }

    fn wrap_sequence(&self, value: Value) -> Value {
        let Value::Array(_) = value else {
            return value;
        };
        let root = resolve(&self.schema, &self.schema);
        let Some(properties) = root.get("properties").and_then(Value::as_object) else {
            return value;
        };
        if properties.len() != 1 {
            return value;
        }
        match properties.iter().next() {
            Some((field, property))
                if declared_types(resolve(&self.schema, property)).contains(&"array") =>
            {
                let mut wrapped = Map::new();
                wrapped.insert(field.clone(), value);
                Value::Object(wrapped)
            }
            _ => value,
        }
    }
}

/// Runs full JSON Schema validation and formats every error with its instance path.
#[must_use]
pub fn collect_validation_errors(schema: &Value, instance: &Value) -> Vec<FieldError> {
    match Validator::new(schema) {
        Ok(validator) => validator
            .iter_errors(instance)
            .map(|error| FieldError::new(error.instance_path.to_string(), error.to_string()))
            .collect(),
        Err(e) => vec![FieldError::new("", format!("Schema compilation error: {e}"))],
    }
}

/// Follows local `$ref` pointers until a concrete schema is reached.
fn resolve<'s>(root: &'s Value, mut schema: &'s Value) -> &'s Value {
    for _ in 0..MAX_REF_HOPS {
        let Some(target) = schema
            .get("$ref")
            .and_then(Value::as_str)
            .and_then(|reference| reference.strip_prefix('#'))
            .and_then(|pointer| root.pointer(pointer))
        else {
            break;
        };
        schema = target;
    }
    schema
}

fn declared_types(schema: &Value) -> Vec<&str> {
    match schema.get("type") {
        Some(Value::String(ty)) => vec![ty.as_str()],
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).collect(),
        _ if schema.get("properties").is_some() || schema.get("required").is_some() => {
            vec!["object"]
        }
        _ if schema.get("items").is_some() => vec!["array"],
        _ => Vec::new(),
    }
}

fn is_instance(ty: &str, value: &Value) -> bool {
    match ty {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        _ => false,
    }
}

/// Lax scalar conversion in the spirit of "numbers as strings are still numbers".
fn convert(ty: &str, value: &Value) -> Option<Value> {
    match (ty, value) {
        ("integer", Value::String(s)) => parse_integer(s.trim()),
        ("integer", Value::Number(n)) => n.as_f64().and_then(integral),
        ("number", Value::String(s)) => {
            let s = s.trim();
            parse_integer(s).or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .and_then(Number::from_f64)
                    .map(Value::Number)
            })
        }
        ("boolean", Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" | "t" | "y" => Some(Value::Bool(true)),
            "false" | "no" | "off" | "0" | "f" | "n" => Some(Value::Bool(false)),
            _ => None,
        },
        ("boolean", Value::Number(n)) => match n.as_i64() {
            Some(1) => Some(Value::Bool(true)),
            Some(0) => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

fn parse_integer(s: &str) -> Option<Value> {
    s.parse::<i64>()
        .map(Value::from)
        .or_else(|_| s.parse::<u64>().map(Value::from))
        .ok()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn integral(f: f64) -> Option<Value> {
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64).then(|| Value::from(f as i64))
}

fn child_path(path: &str, segment: &str) -> String {
    let escaped = segment.replace('~', "~0").replace('/', "~1");
    format!("{path}/{escaped}")
}

struct Coercer<'s> {
    root: &'s Value,
    errors: Vec<FieldError>,
}

impl<'s> Coercer<'s> {
    fn coerce(&mut self, schema: &'s Value, value: Value, path: &str) -> Value {
        let schema = resolve(self.root, schema);
        if !schema.is_object() {
            return value;
        }

        if let Some(variants) = schema
            .get("anyOf")
            .or_else(|| schema.get("oneOf"))
            .and_then(Value::as_array)
        {
            return self.coerce_variants(variants, value, path);
        }

        let types = declared_types(schema);
        if types.is_empty() {
            return value;
        }
        if let Some(ty) = types.iter().find(|ty| is_instance(ty, &value)) {
            return self.descend(schema, ty, value, path);
        }
        for ty in &types {
            if let Some(converted) = convert(ty, &value) {
                return self.descend(schema, ty, converted, path);
            }
        }

        self.errors.push(FieldError::new(
            path,
            format!("expected {}, got {}", types.join(" or "), kind_of(&value)),
        ));
        value
    }

    fn coerce_variants(&mut self, variants: &'s [Value], value: Value, path: &str) -> Value {
        for variant in variants {
            let mut trial = Coercer {
                root: self.root,
                errors: Vec::new(),
            };
            let coerced = trial.coerce(variant, value.clone(), path);
            if trial.errors.is_empty() {
                return coerced;
            }
        }
        self.errors.push(FieldError::new(
            path,
            format!("{} does not match any allowed variant", kind_of(&value)),
        ));
        value
    }

    fn descend(&mut self, schema: &'s Value, ty: &str, value: Value, path: &str) -> Value {
        match (ty, value) {
            ("object", Value::Object(map)) => self.coerce_object(schema, map, path),
            ("array", Value::Array(items)) => {
                let Some(item_schema) = schema.get("items").filter(|s| s.is_object()) else {
                    return Value::Array(items);
                };
                Value::Array(
                    items
                        .into_iter()
                        .enumerate()
                        .map(|(i, item)| self.coerce(item_schema, item, &child_path(path, &i.to_string())))
                        .collect(),
                )
            }
            (_, value) => value,
        }
    }

    fn coerce_object(&mut self, schema: &'s Value, map: Map<String, Value>, path: &str) -> Value {
        let properties = schema.get("properties").and_then(Value::as_object);
        let additional = schema.get("additionalProperties").filter(|s| s.is_object());

        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for name in required.iter().filter_map(Value::as_str) {
                if !map.contains_key(name) {
                    self.errors
                        .push(FieldError::new(child_path(path, name), "missing required field"));
                }
            }
        }

        let coerced = map
            .into_iter()
            .map(|(key, value)| {
                let field_schema = properties.and_then(|p| p.get(&key)).or(additional);
                let value = match field_schema {
                    Some(field_schema) => self.coerce(field_schema, value, &child_path(path, &key)),
                    None => value,
                };
                (key, value)
            })
            .collect();
        Value::Object(coerced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn person_schema() -> SchemaDescriptor {
        SchemaDescriptor::from_json_schema(json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "integer", "minimum": 0},
                "member": {"type": "boolean"},
                "score": {"type": "number"}
            },
            "required": ["name", "age"]
        }))
        .unwrap()
    }

    #[test]
    fn test_coerces_lax_scalars() {
        let value = person_schema()
            .validate(json!({"name": "Ada", "age": "36", "member": "yes", "score": "9.5"}))
            .unwrap();
        assert_eq!(value, json!({"name": "Ada", "age": 36, "member": true, "score": 9.5}));
    }

    #[test]
    fn test_integral_float_becomes_integer() {
        let value = person_schema().validate(json!({"name": "Ada", "age": 36.0})).unwrap();
        assert_eq!(value["age"], json!(36));
    }

    #[test]
    fn test_missing_required_field() {
        let (errors, _) = person_schema().validate(json!({"name": "Ada"})).unwrap_err();
        assert_eq!(errors, vec![FieldError::new("/age", "missing required field")]);
    }

    #[test]
    fn test_type_mismatch_reports_path() {
        let (errors, _) = person_schema()
            .validate(json!({"name": ["not", "a", "name"], "age": "old"}))
            .unwrap_err();
        let paths: Vec<_> = errors.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"/name"));
        assert!(paths.contains(&"/age"));
    }

    #[test]
    fn test_keyword_constraints_checked_after_coercion() {
        let (errors, value) = person_schema()
            .validate(json!({"name": "Ada", "age": "-3"}))
            .unwrap_err();
        assert_eq!(value["age"], json!(-3));
        assert!(errors.iter().any(|e| e.path == "/age"));
    }

    #[test]
    fn test_sequence_wrapped_for_single_array_field() {
        let schema = SchemaDescriptor::from_json_schema(json!({
            "type": "object",
            "properties": {"items": {"type": "array", "items": {"type": "string"}}},
            "required": ["items"]
        }))
        .unwrap();
        let value = schema.validate(json!(["a", "b", "c"])).unwrap();
        assert_eq!(value, json!({"items": ["a", "b", "c"]}));
    }

    #[test]
    fn test_sequence_rejected_for_mapping_schema() {
        let (errors, _) = person_schema().validate(json!(["Ada", 36])).unwrap_err();
        assert_eq!(errors[0].path, "");
        assert!(errors[0].message.contains("expected object"));
    }

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct Address {
        city: String,
        zip: Option<u32>,
    }

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct Customer {
        name: String,
        vip: bool,
        address: Address,
        previous: Option<Address>,
    }

    #[test]
    fn test_schemars_refs_and_options() {
        let schema = SchemaDescriptor::for_type::<Customer>();
        let value = schema
            .validate(json!({
                "name": "Ada",
                "vip": "false",
                "address": {"city": "Paris", "zip": "75001"},
                "previous": null
            }))
            .unwrap();
        assert_eq!(value["vip"], json!(false));
        assert_eq!(value["address"]["zip"], json!(75001));
        assert!(value["previous"].is_null());

        let (errors, _) = schema
            .validate(json!({"name": "Ada", "vip": true, "address": {"zip": 1}}))
            .unwrap_err();
        assert!(errors.iter().any(|e| e.path == "/address/city"));
    }

    #[test]
    fn test_invalid_schema_rejected() {
        assert!(SchemaDescriptor::from_json_schema(json!({"type": 12})).is_err());
    }
}

//! Tool argument validation against each tool's declared JSON Schema.
//!
//! Arguments are normalised before validation: `null` values count as absent,
//! and quoted integers (`"12,000"`) are unquoted where the property is declared
//! as an integer.

use jsonschema::{JSONSchema, ValidationError};
use serde_json::{Map, Value};

/// Compiled input schema of one tool.
pub struct ArgumentSchema {
    validator: JSONSchema,
    integer_keys: Vec<String>,
}

impl ArgumentSchema {
    pub fn compile(schema: &Value) -> Result<Self, String> {
        let validator = JSONSchema::options()
            .compile(schema)
            .map_err(|e| e.to_string())?;
        let integer_keys = schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .filter(|(_, p)| p.get("type").and_then(Value::as_str) == Some("integer"))
                    .map(|(key, _)| key.clone())
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self {
            validator,
            integer_keys,
        })
    }

    /// Normalise `params` and validate it, returning the arguments the tool should see.
    pub fn check(&self, params: Value) -> Result<Value, String> {
        let params = self.normalise(params)?;
        if let Err(errors) = self.validator.validate(&params) {
            let message = errors.map(|e| describe(&e)).collect::<Vec<_>>().join("; ");
            return Err(message);
        }
        Ok(params)
    }

    fn normalise(&self, params: Value) -> Result<Value, String> {
        let fields = match params {
            Value::Null => Map::new(),
            Value::Object(fields) => fields,
            _ => return Err("parameters must be a JSON object".to_string()),
        };
        Ok(Value::Object(
            fields
                .into_iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(key, value)| {
                    let value = match value {
                        Value::String(s) if self.integer_keys.contains(&key) => unquote_integer(s),
                        other => other,
                    };
                    (key, value)
                })
                .collect(),
        ))
    }
}

fn unquote_integer(s: String) -> Value {
    match s.trim().replace(',', "").parse::<i64>() {
        Ok(n) => Value::from(n),
        Err(_) => Value::String(s),
    }
}

fn describe(error: &ValidationError<'_>) -> String {
    let path = error.instance_path.to_string();
    match path.trim_start_matches('/') {
        "" => error.to_string(),
        key => format!("parameter '{}': {}", key, error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> ArgumentSchema {
        ArgumentSchema::compile(&json!({
            "type": "object",
            "properties": {
                "rank": {"type": "integer", "minimum": 1},
                "round": {"type": "integer", "enum": [1, 2, 3]},
                "branches": {"type": "array", "items": {"type": "string"}},
                "email": {"type": "string"}
            },
            "required": ["rank"]
        }))
        .unwrap()
    }

    #[test]
    fn accepts_valid_input() {
        let schema = schema();
        assert_eq!(
            schema.check(json!({"rank": 5000, "round": 2})).unwrap(),
            json!({"rank": 5000, "round": 2})
        );
        assert!(schema.check(json!({"rank": 5000, "extra": true})).is_ok());
        assert_eq!(
            schema.check(json!({"rank": 1, "email": null})).unwrap(),
            json!({"rank": 1})
        );
        assert_eq!(schema.check(json!({"rank": "12,000"})).unwrap(), json!({"rank": 12000}));
    }

    #[test]
    fn rejects_missing_required() {
        let schema = schema();
        let err = schema.check(json!({"round": 1})).unwrap_err();
        assert!(err.contains("rank"), "{err}");
        assert!(schema.check(json!({"rank": null})).is_err());
        assert!(schema.check(Value::Null).is_err());
    }

    #[test]
    fn rejects_wrong_types_and_ranges() {
        let schema = schema();
        let err = schema.check(json!({"rank": "ten"})).unwrap_err();
        assert!(err.starts_with("parameter 'rank'"), "{err}");
        assert!(schema.check(json!({"rank": 10.5})).is_err());
        assert!(schema.check(json!({"rank": 0})).is_err());
        assert!(schema.check(json!({"rank": 1, "round": 4})).is_err());
        assert!(schema.check(json!({"rank": 1, "branches": ["a", 2]})).is_err());
        assert!(schema.check(json!([1, 2])).is_err());
    }

    #[test]
    fn invalid_schemas_do_not_compile() {
        assert!(ArgumentSchema::compile(&json!({"type": "no-such-type"})).is_err());
    }
}

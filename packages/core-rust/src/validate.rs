//! Parameter validation capability.
//!
//! Actions may attach a validator that inspects the merged request
//! parameters before the handler runs. The capability is deliberately
//! narrow: implementors receive the parameter object and answer with a
//! structured error or nothing. [`ObjectSchema`] is the bundled
//! implementation; anything else satisfying [`Validator`] plugs in the same
//! way.

use serde_json::{json, Value};

use crate::error::{codes, ApplicationError};

// ---------------------------------------------------------------------------
// Validator capability
// ---------------------------------------------------------------------------

/// Validates a parameter object against some set of rules.
pub trait Validator: Send + Sync {
    /// Checks `params` and returns a structured error describing every
    /// violation, or `Ok(())` when the parameters conform.
    ///
    /// `strict` additionally rejects properties the rules do not mention.
    ///
    /// # Errors
    ///
    /// Returns an [`ApplicationError`] with code `VALIDATION_FAILED` and a
    /// `details.errors` list naming each violation.
    fn validate(&self, correlation_id: &str, params: &Value, strict: bool)
        -> Result<(), ApplicationError>;
}

/// Result of checking a value against a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// The value conforms to the schema.
    Valid,
    /// The value violates one or more constraints.
    Invalid {
        /// Human-readable descriptions of each violation.
        errors: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Field types
// ---------------------------------------------------------------------------

/// Expected JSON type of a schema property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Any JSON value is accepted.
    Any,
    String,
    Integer,
    Float,
    Boolean,
    Object,
    Array,
}

impl FieldType {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

// ---------------------------------------------------------------------------
// ObjectSchema
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Rule {
    Type(FieldType),
    Nested(ObjectSchema),
}

#[derive(Clone)]
struct Property {
    name: String,
    required: bool,
    rule: Rule,
}

/// Declarative schema over a JSON object.
///
/// Properties are either typed leaves or nested object schemas. A missing
/// object (e.g. an absent request body) is treated as an empty object, so
/// required properties are reported as missing rather than producing a type
/// error about the container.
#[derive(Clone, Default)]
pub struct ObjectSchema {
    properties: Vec<Property>,
}

impl ObjectSchema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a property that must be present with the given type.
    #[must_use]
    pub fn with_required_property(mut self, name: &str, kind: FieldType) -> Self {
        self.properties.push(Property {
            name: name.to_string(),
            required: true,
            rule: Rule::Type(kind),
        });
        self
    }

    /// Adds a property that, when present, must have the given type.
    #[must_use]
    pub fn with_optional_property(mut self, name: &str, kind: FieldType) -> Self {
        self.properties.push(Property {
            name: name.to_string(),
            required: false,
            rule: Rule::Type(kind),
        });
        self
    }

    /// Adds a required property validated by a nested schema.
    #[must_use]
    pub fn with_required_schema(mut self, name: &str, schema: ObjectSchema) -> Self {
        self.properties.push(Property {
            name: name.to_string(),
            required: true,
            rule: Rule::Nested(schema),
        });
        self
    }

    /// Adds an optional property validated by a nested schema.
    #[must_use]
    pub fn with_optional_schema(mut self, name: &str, schema: ObjectSchema) -> Self {
        self.properties.push(Property {
            name: name.to_string(),
            required: false,
            rule: Rule::Nested(schema),
        });
        self
    }

    /// Checks a value and reports every violation, prefixing property paths
    /// with `path` (empty at the root).
    #[must_use]
    pub fn check(&self, value: &Value, strict: bool) -> ValidationResult {
        let mut errors = Vec::new();
        self.check_at("", value, strict, &mut errors);
        if errors.is_empty() {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid { errors }
        }
    }

    fn check_at(&self, path: &str, value: &Value, strict: bool, errors: &mut Vec<String>) {
        let map = match value {
            Value::Object(map) => map,
            // An absent value is checked as an empty object: required
            // properties are missing, nothing else to look at.
            Value::Null => {
                for prop in &self.properties {
                    if prop.required {
                        errors.push(format!("{} is required", display_path(path, &prop.name)));
                    }
                }
                return;
            }
            other => {
                errors.push(format!(
                    "{} must be an object, got {}",
                    display_path(path, ""),
                    json_type_name(other)
                ));
                return;
            }
        };

        for prop in &self.properties {
            let full = display_path(path, &prop.name);
            match map.get(&prop.name) {
                None | Some(Value::Null) => {
                    if prop.required {
                        errors.push(format!("{full} is required"));
                    }
                }
                Some(found) => match &prop.rule {
                    Rule::Type(kind) => {
                        if !kind.matches(found) {
                            errors.push(format!(
                                "{full} must be a {}, got {}",
                                kind.name(),
                                json_type_name(found)
                            ));
                        }
                    }
                    Rule::Nested(schema) => schema.check_at(&full, found, strict, errors),
                },
            }
        }

        if strict {
            for key in map.keys() {
                if !self.properties.iter().any(|p| p.name == *key) {
                    errors.push(format!("{} is not expected", display_path(path, key)));
                }
            }
        }
    }
}

impl Validator for ObjectSchema {
    fn validate(
        &self,
        correlation_id: &str,
        params: &Value,
        strict: bool,
    ) -> Result<(), ApplicationError> {
        match self.check(params, strict) {
            ValidationResult::Valid => Ok(()),
            ValidationResult::Invalid { errors } => Err(ApplicationError::bad_request(
                correlation_id,
                codes::VALIDATION_FAILED,
                "Parameters failed validation",
            )
            .with_details(json!({ "errors": errors }))),
        }
    }
}

fn display_path(path: &str, name: &str) -> String {
    match (path.is_empty(), name.is_empty()) {
        (true, true) => "value".to_string(),
        (true, false) => name.to_string(),
        (false, true) => path.to_string(),
        (false, false) => format!("{path}.{name}"),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Attribute catalog definitions.
//!
//! Definitions are consulted only when attributes are written, never during
//! evaluation.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Attribute domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeCategory {
    Subject,
    Resource,
    Environment,
    Action,
}

/// Declared value type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeValueType {
    String,
    Number,
    Boolean,
    Array,
    Object,
    /// RFC 3339 timestamp string.
    Date,
}

impl AttributeValueType {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Date => value
                .as_str()
                .is_some_and(|s| OffsetDateTime::parse(s, &Rfc3339).is_ok()),
        }
    }
}

impl std::fmt::Display for AttributeValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Date => "date",
        };
        f.write_str(name)
    }
}

/// Validation rules attached to a definition.
///
/// `min`/`max` bound numbers by value and strings/arrays by length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttributeRules {
    pub required: bool,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// A catalog entry describing one attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDefinition {
    pub key: String,
    pub category: AttributeCategory,
    pub value_type: AttributeValueType,
    #[serde(default)]
    pub validation: AttributeRules,
    /// Owning organization. `None` applies to every organization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
}

impl AttributeDefinition {
    /// Check a value (or its absence) against this definition.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn validate_value(&self, value: Option<&Value>) -> Result<(), AttributeValidationError> {
        let value = match value {
            None | Some(Value::Null) => {
                if self.validation.required {
                    return Err(AttributeValidationError::Required(self.key.clone()));
                }
                return Ok(());
            }
            Some(v) => v,
        };

        if !self.value_type.accepts(value) {
            return Err(AttributeValidationError::TypeMismatch {
                key: self.key.clone(),
                expected: self.value_type,
            });
        }

        let rules = &self.validation;
        if let Some(allowed) = &rules.allowed_values
            && !allowed.contains(value)
        {
            return Err(AttributeValidationError::NotInEnum(self.key.clone()));
        }

        let magnitude = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => Some(s.chars().count() as f64),
            Value::Array(items) => Some(items.len() as f64),
            _ => None,
        };
        if let Some(m) = magnitude {
            if let Some(min) = rules.min
                && m < min
            {
                return Err(AttributeValidationError::BelowMinimum {
                    key: self.key.clone(),
                    min,
                });
            }
            if let Some(max) = rules.max
                && m > max
            {
                return Err(AttributeValidationError::AboveMaximum {
                    key: self.key.clone(),
                    max,
                });
            }
        }

        if let (Some(pattern), Value::String(s)) = (&rules.pattern, value) {
            let matched = Regex::new(pattern).is_ok_and(|re| re.is_match(s));
            if !matched {
                return Err(AttributeValidationError::PatternMismatch(self.key.clone()));
            }
        }

        Ok(())
    }
}

/// Attribute value validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AttributeValidationError {
    #[error("Attribute '{0}' is required")]
    Required(String),

    #[error("Attribute '{key}' must be of type {expected}")]
    TypeMismatch {
        key: String,
        expected: AttributeValueType,
    },

    #[error("Attribute '{0}' is not one of the allowed values")]
    NotInEnum(String),

    #[error("Attribute '{key}' is below the minimum of {min}")]
    BelowMinimum { key: String, min: f64 },

    #[error("Attribute '{key}' is above the maximum of {max}")]
    AboveMaximum { key: String, max: f64 },

    #[error("Attribute '{0}' does not match the required pattern")]
    PatternMismatch(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition(value_type: AttributeValueType, rules: AttributeRules) -> AttributeDefinition {
        AttributeDefinition {
            key: "level".to_string(),
            category: AttributeCategory::Subject,
            value_type,
            validation: rules,
            organization_id: None,
        }
    }

    #[test]
    fn test_required() {
        let def = definition(
            AttributeValueType::Number,
            AttributeRules {
                required: true,
                ..Default::default()
            },
        );
        assert_eq!(
            def.validate_value(None),
            Err(AttributeValidationError::Required("level".to_string()))
        );
        assert!(def.validate_value(Some(&json!(3))).is_ok());

        let optional = definition(AttributeValueType::Number, AttributeRules::default());
        assert!(optional.validate_value(None).is_ok());
    }

    #[test]
    fn test_type_and_bounds() {
        let def = definition(
            AttributeValueType::Number,
            AttributeRules {
                min: Some(1.0),
                max: Some(5.0),
                ..Default::default()
            },
        );
        assert!(matches!(
            def.validate_value(Some(&json!("3"))),
            Err(AttributeValidationError::TypeMismatch { .. })
        ));
        assert!(matches!(
            def.validate_value(Some(&json!(0))),
            Err(AttributeValidationError::BelowMinimum { .. })
        ));
        assert!(matches!(
            def.validate_value(Some(&json!(6))),
            Err(AttributeValidationError::AboveMaximum { .. })
        ));
        assert!(def.validate_value(Some(&json!(5))).is_ok());
    }

    #[test]
    fn test_enum_and_pattern() {
        let def = definition(
            AttributeValueType::String,
            AttributeRules {
                allowed_values: Some(vec![json!("sales"), json!("support")]),
                pattern: Some("^s".to_string()),
                ..Default::default()
            },
        );
        assert!(def.validate_value(Some(&json!("sales"))).is_ok());
        assert_eq!(
            def.validate_value(Some(&json!("finance"))),
            Err(AttributeValidationError::NotInEnum("level".to_string()))
        );

        let def = definition(
            AttributeValueType::String,
            AttributeRules {
                pattern: Some("^[A-Z]{3}-\\d+$".to_string()),
                ..Default::default()
            },
        );
        assert!(def.validate_value(Some(&json!("SKU-12"))).is_ok());
        assert!(matches!(
            def.validate_value(Some(&json!("sku-12"))),
            Err(AttributeValidationError::PatternMismatch(_))
        ));
    }

    #[test]
    fn test_date_type() {
        let def = definition(AttributeValueType::Date, AttributeRules::default());
        assert!(def.validate_value(Some(&json!("2024-05-01T10:00:00Z"))).is_ok());
        assert!(def.validate_value(Some(&json!("yesterday"))).is_err());
    }
}

//! Declarative config-field schema and validation engine.
//!
//! Every platform describes its specific fields with a static
//! [`ConfigField`] table. The engine resolves each value as
//! explicit value -> environment variable -> declared default, then
//! type-checks and pattern-checks the result. It never mutates the input
//! and never touches the network.

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

/// Field value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Password,
    Number,
    Boolean,
    Select(&'static [&'static str]),
    FilePath,
}

/// One field in a platform's config schema
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigField {
    /// Key in the config's options map
    pub name: &'static str,

    /// Display label
    pub label: &'static str,

    /// Value type
    pub field_type: FieldType,

    /// Whether a value must resolve for the config to be valid
    pub required: bool,

    /// Declared default, applied when neither an explicit value nor the
    /// environment variable yields one
    pub default: Option<&'static str>,

    /// Regex the resolved string value must match
    pub pattern: Option<&'static str>,

    /// Environment variable consulted when no explicit value is present
    pub env_var: Option<&'static str>,
}

/// Outcome of validating a config against a field schema
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Add an error, marking the report invalid
    pub fn push(&mut self, error: impl Into<String>) {
        self.valid = false;
        self.errors.push(error.into());
    }
}

/// Resolve the effective value of a field: explicit value, then environment
/// variable, then declared default. Empty strings and nulls count as absent.
pub fn resolve_value(field: &ConfigField, options: &Map<String, Value>) -> Option<Value> {
    resolve_value_with(field, options, |name| std::env::var(name).ok())
}

/// Resolution with an explicit environment lookup; tests inject their own
/// instead of mutating the process environment
fn resolve_value_with(
    field: &ConfigField,
    options: &Map<String, Value>,
    env: impl Fn(&str) -> Option<String>,
) -> Option<Value> {
    match options.get(field.name) {
        Some(Value::Null) => {}
        Some(Value::String(s)) if s.is_empty() => {}
        Some(value) => return Some(value.clone()),
        None => {}
    }

    if let Some(env_var) = field.env_var {
        if let Some(value) = env(env_var) {
            if !value.is_empty() {
                return Some(Value::String(value));
            }
        }
    }

    field
        .default
        .map(|default| Value::String(default.to_string()))
}

/// Validate a raw config map against a field schema
pub fn validate_fields(fields: &[ConfigField], options: &Map<String, Value>) -> ValidationReport {
    let mut report = ValidationReport::ok();

    for field in fields {
        let resolved = resolve_value(field, options);

        let value = match resolved {
            Some(value) => value,
            None => {
                if field.required {
                    report.push(format!("Missing required field: {}", field.name));
                }
                continue;
            }
        };

        check_type(field, &value, &mut report);
    }

    report
}

fn check_type(field: &ConfigField, value: &Value, report: &mut ValidationReport) {
    match field.field_type {
        FieldType::Number => {
            let ok = match value {
                Value::Number(_) => true,
                Value::String(s) => s.parse::<f64>().is_ok(),
                _ => false,
            };
            if !ok {
                report.push(format!("Invalid value for {}: expected a number", field.name));
            }
        }
        FieldType::Boolean => {
            let ok = match value {
                Value::Bool(_) => true,
                Value::String(s) => s.parse::<bool>().is_ok(),
                _ => false,
            };
            if !ok {
                report.push(format!(
                    "Invalid value for {}: expected a boolean",
                    field.name
                ));
            }
        }
        FieldType::Select(choices) => match value.as_str() {
            Some(s) if choices.contains(&s) => {}
            _ => report.push(format!(
                "Invalid value for {}: expected one of {}",
                field.name,
                choices.join(", ")
            )),
        },
        FieldType::Text | FieldType::Password | FieldType::FilePath => {
            match value.as_str() {
                Some(s) => {
                    if let Some(pattern) = field.pattern {
                        check_pattern(field.name, pattern, s, report);
                    }
                }
                None => report.push(format!(
                    "Invalid value for {}: expected a string",
                    field.name
                )),
            }
        }
    }
}

fn check_pattern(name: &str, pattern: &str, value: &str, report: &mut ValidationReport) {
    match Regex::new(pattern) {
        Ok(regex) => {
            if !regex.is_match(value) {
                report.push(format!(
                    "Invalid value for {}: does not match pattern {}",
                    name, pattern
                ));
            }
        }
        Err(e) => report.push(format!("Invalid pattern for {}: {}", name, e)),
    }
}

/// Resolve every field like [`validate_fields`] does, but write the
/// resolved values back into the map instead of erroring. Used to pre-fill
/// a config before showing it to a user or handing it to an adapter.
pub fn apply_defaults(fields: &[ConfigField], options: &mut Map<String, Value>) {
    for field in fields {
        if let Some(value) = resolve_value(field, options) {
            options.insert(field.name.to_string(), coerce(field, value));
        }
    }
}

/// Coerce a resolved string value towards the field's declared type
fn coerce(field: &ConfigField, value: Value) -> Value {
    let Value::String(s) = &value else {
        return value;
    };

    match field.field_type {
        FieldType::Number => s
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or(value),
        FieldType::Boolean => s.parse::<bool>().map(Value::Bool).unwrap_or(value),
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: &[ConfigField] = &[
        ConfigField {
            name: "host",
            label: "Host",
            field_type: FieldType::Text,
            required: true,
            default: None,
            pattern: None,
            env_var: Some("SHIPYARD_TEST_HOST"),
        },
        ConfigField {
            name: "port",
            label: "Port",
            field_type: FieldType::Number,
            required: false,
            default: Some("22"),
            pattern: None,
            env_var: None,
        },
        ConfigField {
            name: "protocol",
            label: "Protocol",
            field_type: FieldType::Select(&["ftp", "sftp"]),
            required: false,
            default: Some("ftp"),
            pattern: None,
            env_var: None,
        },
        ConfigField {
            name: "domain",
            label: "Domain",
            field_type: FieldType::Text,
            required: false,
            default: None,
            pattern: Some(r"^[\w.-]+\.[a-z]{2,}$"),
            env_var: None,
        },
    ];

    #[test]
    fn test_missing_required_field() {
        let options = Map::new();
        let report = validate_fields(FIELDS, &options);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("host")));
    }

    #[test]
    fn test_env_var_fallback() {
        let host = &FIELDS[0];
        let lookup = |name: &str| {
            (name == "SHIPYARD_TEST_HOST").then(|| "fallback.example.com".to_string())
        };

        let options = Map::new();
        let resolved = resolve_value_with(host, &options, lookup);
        assert_eq!(resolved, Some(Value::String("fallback.example.com".into())));

        // Explicit value wins over the environment
        let mut options = Map::new();
        options.insert("host".into(), Value::String("explicit.example.com".into()));
        let resolved = resolve_value_with(host, &options, lookup);
        assert_eq!(resolved, Some(Value::String("explicit.example.com".into())));
    }

    #[test]
    fn test_type_checks() {
        let mut options = Map::new();
        options.insert("host".into(), Value::String("h".into()));
        options.insert("port".into(), Value::String("not-a-number".into()));
        options.insert("protocol".into(), Value::String("gopher".into()));

        let report = validate_fields(FIELDS, &options);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("port")));
        assert!(report.errors.iter().any(|e| e.contains("protocol")));
    }

    #[test]
    fn test_pattern_check() {
        let mut options = Map::new();
        options.insert("host".into(), Value::String("h".into()));
        options.insert("domain".into(), Value::String("not a domain".into()));

        let report = validate_fields(FIELDS, &options);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("domain")));
    }

    #[test]
    fn test_apply_defaults() {
        let mut options = Map::new();
        options.insert("host".into(), Value::String("h".into()));
        apply_defaults(FIELDS, &mut options);

        assert_eq!(options.get("port"), Some(&Value::from(22)));
        assert_eq!(options.get("protocol"), Some(&Value::String("ftp".into())));
        // No default and no value: left absent
        assert!(!options.contains_key("domain"));
    }

    #[test]
    fn test_empty_string_counts_as_absent() {
        let mut options = Map::new();
        options.insert("host".into(), Value::String(String::new()));
        let report = validate_fields(FIELDS, &options);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("host")));
    }
}

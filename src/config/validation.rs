//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - At least one policy file, at least one key attribute
//! - Extra attributes: unique, non-empty names; enums carry values
//! - Value ranges (poll interval > 0, metrics address parses)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PolicyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::PolicyConfig;
use crate::dictionary::{Dictionary, ValueType};

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &PolicyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.module.files().is_empty() {
        errors.push(ValidationError::new(
            "module.filename",
            "no policy file configured",
        ));
    }

    if config.module.key.is_empty() {
        errors.push(ValidationError::new("module.key", "at least one key attribute is required"));
    }
    for (i, name) in config.module.key.iter().enumerate() {
        if name.trim().is_empty() {
            errors.push(ValidationError::new(format!("module.key[{}]", i), "empty attribute name"));
        }
    }

    let builtin = Dictionary::builtin();
    let mut seen = HashSet::new();
    for (i, attr) in config.dictionary.attributes.iter().enumerate() {
        let field = format!("dictionary.attributes[{}]", i);
        if attr.name.trim().is_empty() {
            errors.push(ValidationError::new(&field, "empty attribute name"));
            continue;
        }
        let lower = attr.name.to_ascii_lowercase();
        if builtin.lookup(&lower).is_some() || !seen.insert(lower) {
            errors.push(ValidationError::new(
                &field,
                format!("duplicate attribute {}", attr.name),
            ));
        }
        if attr.ty == ValueType::Enum && attr.values.is_empty() {
            errors.push(ValidationError::new(
                &field,
                format!("enum attribute {} has no values", attr.name),
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address {}", config.observability.metrics_address),
        ));
    }

    if config.reload.poll_interval_secs == 0 {
        errors.push(ValidationError::new("reload.poll_interval_secs", "must be greater than 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::AttributeConfig;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn valid() -> PolicyConfig {
        let mut config = PolicyConfig::default();
        config.module.filename = Some(PathBuf::from("users"));
        config
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = PolicyConfig::default();
        config.module.key.clear();
        config.reload.poll_interval_secs = 0;
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "nowhere".to_string();
        config.dictionary.attributes = vec![
            AttributeConfig {
                name: "Tier".to_string(),
                ty: ValueType::Enum,
                values: BTreeMap::new(),
            },
            AttributeConfig {
                name: "tier".to_string(),
                ty: ValueType::String,
                values: BTreeMap::new(),
            },
            AttributeConfig {
                name: "Filter-Id".to_string(),
                ty: ValueType::String,
                values: BTreeMap::new(),
            },
        ];

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "module.filename",
                "module.key",
                "dictionary.attributes[0]",
                "dictionary.attributes[1]",
                "dictionary.attributes[2]",
                "observability.metrics_address",
                "reload.poll_interval_secs",
            ]
        );
    }

    #[test]
    fn test_phase_file_alone_is_enough() {
        let mut config = PolicyConfig::default();
        config.module.auth_filename = Some(PathBuf::from("users.auth"));
        assert!(validate_config(&config).is_ok());
    }
}

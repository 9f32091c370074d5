//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the policy
//! daemon. All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dictionary::{Dictionary, DictionaryError, ValueType};
use crate::module::Phase;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PolicyConfig {
    /// Key attributes and policy files.
    pub module: ModuleConfig,

    /// Attributes added to the built-in dictionary.
    pub dictionary: DictionaryConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Reload triggers.
    pub reload: ReloadConfig,
}

/// Policy module configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// Candidate key attributes; the first one present in a request is used.
    pub key: Vec<String>,

    /// Users file used by every phase without its own file.
    pub filename: Option<PathBuf>,

    /// Users file for the receive phase.
    pub recv_filename: Option<PathBuf>,

    /// Users file for accounting requests.
    pub acct_filename: Option<PathBuf>,

    /// Users file for the authenticate phase.
    pub auth_filename: Option<PathBuf>,

    /// Users file for the send phase.
    pub send_filename: Option<PathBuf>,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            key: vec!["Stripped-User-Name".to_string(), "User-Name".to_string()],
            filename: None,
            recv_filename: None,
            acct_filename: None,
            auth_filename: None,
            send_filename: None,
        }
    }
}

impl ModuleConfig {
    /// File configured for a phase, not counting the common file.
    pub fn phase_file(&self, phase: Phase) -> Option<&Path> {
        match phase {
            Phase::Recv => self.recv_filename.as_deref(),
            Phase::RecvAccounting => self.acct_filename.as_deref(),
            Phase::Authenticate => self.auth_filename.as_deref(),
            Phase::Send => self.send_filename.as_deref(),
        }
    }

    /// Every configured file.
    pub fn files(&self) -> Vec<&Path> {
        let mut files: Vec<&Path> = self.filename.as_deref().into_iter().collect();
        files.extend(Phase::ALL.iter().filter_map(|p| self.phase_file(*p)));
        files
    }
}

/// Extra dictionary attributes.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DictionaryConfig {
    pub attributes: Vec<AttributeConfig>,
}

impl DictionaryConfig {
    /// Built-in dictionary extended with the configured attributes.
    pub fn build(&self) -> Result<Dictionary, DictionaryError> {
        let mut dict = Dictionary::builtin();
        for attr in &self.attributes {
            let values = attr
                .values
                .iter()
                .map(|(name, number)| (name.clone(), *number))
                .collect();
            dict.add(&attr.name, attr.ty, values)?;
        }
        Ok(dict)
    }
}

/// One attribute definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AttributeConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub ty: ValueType,

    /// Named values, for `enum` attributes.
    #[serde(default)]
    pub values: BTreeMap<String, u32>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9464".to_string(),
        }
    }
}

/// Reload configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Rebuild when a policy file changes on disk.
    pub watch: bool,

    /// Poll interval for the file watcher backend, in seconds.
    pub poll_interval_secs: u64,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            watch: true,
            poll_interval_secs: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: PolicyConfig = toml::from_str("[module]\nfilename = \"users\"\n").unwrap();
        assert_eq!(config.module.key, vec!["Stripped-User-Name", "User-Name"]);
        assert_eq!(config.module.files(), vec![Path::new("users")]);
        assert_eq!(config.observability.log_level, "info");
        assert!(config.reload.watch);
    }

    #[test]
    fn test_full_config() {
        let text = r#"
            [module]
            key = ["Framed-IP-Address"]
            filename = "users"
            auth_filename = "users.auth"

            [[dictionary.attributes]]
            name = "Tier"
            type = "enum"
            values = { Gold = 1, Silver = 2 }

            [[dictionary.attributes]]
            name = "Site-Network"
            type = "ipprefix"

            [observability]
            log_level = "debug"
            metrics_enabled = true

            [reload]
            watch = false
        "#;
        let config: PolicyConfig = toml::from_str(text).unwrap();
        assert_eq!(config.module.phase_file(Phase::Authenticate), Some(Path::new("users.auth")));
        assert_eq!(config.module.phase_file(Phase::Send), None);
        assert_eq!(config.module.files().len(), 2);

        let dict = config.dictionary.build().unwrap();
        let tier = dict.require("Tier").unwrap();
        assert_eq!(tier.ty, ValueType::Enum);
        assert_eq!(tier.parse_value("Silver").unwrap(), crate::dictionary::Value::Enum(2));
        assert_eq!(dict.require("site-network").unwrap().ty, ValueType::IpPrefix);
    }

    #[test]
    fn test_dictionary_rejects_builtin_names() {
        let config = DictionaryConfig {
            attributes: vec![AttributeConfig {
                name: "User-Name".to_string(),
                ty: ValueType::String,
                values: BTreeMap::new(),
            }],
        };
        assert!(matches!(config.build(), Err(DictionaryError::Duplicate(_))));
    }
}

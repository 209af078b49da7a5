use crate::error::{ForwarderError, Result};
use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Root-level keys of an EMF record that a spam metric name must not shadow.
const RESERVED_METRIC_NAMES: [&str; 2] = ["_aws", "Type"];

lazy_static! {
    static ref ADDRESS_PATTERN: Regex = Regex::new(r"^[^@\s]+@[^@\s]+$").unwrap();
}

/// Which spam filter handles inbound mail.
///
/// `None` and `Managed` both leave the custom classifier idle: `Managed`
/// relies on the receipt rule set dropping spam before this engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpamFilterMode {
    None,
    #[serde(alias = "default")]
    Managed,
    #[default]
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Short identifier used as the metrics namespace prefix.
    pub project: String,
    /// Forwarded mail is sent from this verified address.
    pub recipient: String,
    #[serde(default = "default_header_value")]
    pub header_value: String,
    /// Storage key prefix of raw messages, trailing slash included.
    #[serde(default)]
    pub email_key_prefix: String,
    #[serde(default)]
    pub subject_prefix: String,
    #[serde(default = "default_allow_plus_sign")]
    pub allow_plus_sign: bool,
    #[serde(default)]
    pub spam_filter_mode: SpamFilterMode,
    #[serde(default)]
    pub subject_filter_keywords: Vec<String>,
    #[serde(default)]
    pub blocked_recipients: Vec<String>,
    /// Keys are `local@domain`, `@domain`, `local` or the catch-all `@`.
    #[serde(default)]
    pub forwarding_rules: BTreeMap<String, Vec<String>>,
}

fn default_header_value() -> String {
    "forwarded".to_string()
}

fn default_allow_plus_sign() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        let mut forwarding_rules = BTreeMap::new();
        forwarding_rules.insert(
            "info@example.com".to_string(),
            vec![
                "example.john@example.com".to_string(),
                "example.jen@example.com".to_string(),
            ],
        );
        forwarding_rules.insert(
            "abuse@example.com".to_string(),
            vec!["example.jim@example.com".to_string()],
        );
        forwarding_rules.insert(
            "@example.com".to_string(),
            vec!["example.john@example.com".to_string()],
        );
        forwarding_rules.insert("info".to_string(), vec!["info@example.com".to_string()]);

        Config {
            project: "MyProject".to_string(),
            recipient: "contact@example.com".to_string(),
            header_value: default_header_value(),
            email_key_prefix: "emails/".to_string(),
            subject_prefix: String::new(),
            allow_plus_sign: true,
            spam_filter_mode: SpamFilterMode::Custom,
            subject_filter_keywords: Vec::new(),
            blocked_recipients: Vec::new(),
            forwarding_rules,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| ForwarderError::Configuration(e.to_string()))?;
        config.validated()
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {path}"))?;
        Ok(())
    }

    /// Checks every field and lower-cases the forwarding rule keys so lookups
    /// can be done on a lower-cased address.
    pub fn validated(mut self) -> Result<Self> {
        if self.project.trim().is_empty() {
            return Err(ForwarderError::Configuration(
                "project must not be empty".to_string(),
            ));
        }

        if !ADDRESS_PATTERN.is_match(&self.recipient) {
            return Err(ForwarderError::Configuration(format!(
                "recipient '{}' is not an email address",
                self.recipient
            )));
        }

        if self.subject_filter_keywords.iter().any(|k| k.is_empty()) {
            return Err(ForwarderError::Configuration(
                "subject_filter_keywords must not contain empty keywords".to_string(),
            ));
        }

        if let Some(reserved) = self
            .subject_filter_keywords
            .iter()
            .find(|k| RESERVED_METRIC_NAMES.contains(&k.as_str()))
        {
            return Err(ForwarderError::Configuration(format!(
                "subject_filter_keywords entry '{reserved}' clashes with a metric record key"
            )));
        }

        if self.blocked_recipients.iter().any(|r| r.is_empty()) {
            return Err(ForwarderError::Configuration(
                "blocked_recipients must not contain empty addresses".to_string(),
            ));
        }

        let mut rules = BTreeMap::new();
        for (key, destinations) in std::mem::take(&mut self.forwarding_rules) {
            if destinations.is_empty() {
                return Err(ForwarderError::Configuration(format!(
                    "forwarding rule '{key}' has no destinations"
                )));
            }
            if let Some(bad) = destinations.iter().find(|d| !ADDRESS_PATTERN.is_match(d)) {
                return Err(ForwarderError::Configuration(format!(
                    "forwarding rule '{key}' has invalid destination '{bad}'"
                )));
            }

            let normalized = key.to_lowercase();
            if rules.insert(normalized.clone(), destinations).is_some() {
                return Err(ForwarderError::Configuration(format!(
                    "forwarding rule '{key}' collides with another rule as '{normalized}'"
                )));
            }
        }
        self.forwarding_rules = rules;

        if self.spam_filter_mode == SpamFilterMode::None {
            log::warn!("Warning: you are not using any spam filter!");
        }

        Ok(self)
    }

    /// Root metrics namespace, `{project}/SESForwarder`.
    pub fn namespace_root(&self) -> String {
        format!("{}/SESForwarder", self.project)
    }

    /// Storage key of the raw message with the given SES message id.
    pub fn message_key(&self, message_id: &str) -> String {
        format!("{}{}", self.email_key_prefix, message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default().validated().unwrap();
        assert_eq!(config.namespace_root(), "MyProject/SESForwarder");
        assert_eq!(config.forwarding_rules.len(), 4);
    }

    #[test]
    fn test_example_file_parses() {
        let config = Config::from_yaml_str(include_str!("../ses-forwarder.example.yaml")).unwrap();
        assert_eq!(config.project, "MyProject");
        assert_eq!(config.spam_filter_mode, SpamFilterMode::Custom);
        assert!(config.allow_plus_sign);
        assert_eq!(config.message_key("abc123"), "emails/abc123");
        assert_eq!(
            config.forwarding_rules.get("info@example.com").unwrap(),
            &vec![
                "example.john@example.com".to_string(),
                "example.jen@example.com".to_string()
            ]
        );
    }

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let yaml = "project: Acme\nrecipient: relay@acme.test\n";
        let config = Config::from_yaml_str(yaml).unwrap();

        assert_eq!(config.header_value, "forwarded");
        assert!(config.allow_plus_sign);
        assert_eq!(config.spam_filter_mode, SpamFilterMode::Custom);
        assert!(config.subject_filter_keywords.is_empty());
        assert!(config.forwarding_rules.is_empty());
    }

    #[test]
    fn test_spam_filter_mode_names() {
        for (name, mode) in [
            ("none", SpamFilterMode::None),
            ("managed", SpamFilterMode::Managed),
            ("default", SpamFilterMode::Managed),
            ("custom", SpamFilterMode::Custom),
        ] {
            let yaml = format!(
                "project: Acme\nrecipient: relay@acme.test\nspam_filter_mode: {name}\n"
            );
            assert_eq!(Config::from_yaml_str(&yaml).unwrap().spam_filter_mode, mode);
        }

        let yaml = "project: Acme\nrecipient: relay@acme.test\nspam_filter_mode: aggressive\n";
        assert!(matches!(
            Config::from_yaml_str(yaml),
            Err(ForwarderError::Configuration(_))
        ));
    }

    #[test]
    fn test_missing_required_fields() {
        assert!(matches!(
            Config::from_yaml_str("recipient: relay@acme.test\n"),
            Err(ForwarderError::Configuration(_))
        ));
        assert!(matches!(
            Config::from_yaml_str("project: Acme\n"),
            Err(ForwarderError::Configuration(_))
        ));
    }

    #[test]
    fn test_keywords_near_reserved_names_allowed() {
        let config = Config {
            subject_filter_keywords: vec!["type".to_string(), "aws".to_string()],
            ..Default::default()
        };
        assert!(config.validated().is_ok());
    }

    #[test]
    fn test_forwarding_keys_are_lowercased() {
        let mut config = Config::default();
        config.forwarding_rules.clear();
        config
            .forwarding_rules
            .insert("Sales@Example.COM".to_string(), vec!["a@b.com".to_string()]);

        let config = config.validated().unwrap();
        assert!(config.forwarding_rules.contains_key("sales@example.com"));
        assert!(!config.forwarding_rules.contains_key("Sales@Example.COM"));
    }

    #[test]
    fn test_rejects_invalid_values() {
        let cases: Vec<Box<dyn Fn(&mut Config)>> = vec![
            Box::new(|c: &mut Config| c.project = "  ".to_string()),
            Box::new(|c: &mut Config| c.recipient = "not-an-address".to_string()),
            Box::new(|c: &mut Config| c.subject_filter_keywords = vec!["ok".to_string(), String::new()]),
            Box::new(|c: &mut Config| c.subject_filter_keywords = vec!["_aws".to_string()]),
            Box::new(|c: &mut Config| c.subject_filter_keywords = vec!["Type".to_string()]),
            Box::new(|c: &mut Config| c.blocked_recipients = vec![String::new()]),
            Box::new(|c: &mut Config| {
                c.forwarding_rules.insert("empty".to_string(), Vec::new());
            }),
            Box::new(|c: &mut Config| {
                c.forwarding_rules
                    .insert("bad".to_string(), vec!["nobody".to_string()]);
            }),
            Box::new(|c: &mut Config| {
                c.forwarding_rules
                    .insert("INFO".to_string(), vec!["x@y.com".to_string()]);
            }),
        ];

        for mutate in cases {
            let mut config = Config::default();
            mutate(&mut config);
            assert!(matches!(
                config.validated(),
                Err(ForwarderError::Configuration(_))
            ));
        }
    }
}

//! PII masking configuration: environment, JSON file, runtime overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Value of `enabled_types` meaning every supported PII kind.
pub const ALL_TYPES: &str = "all";

/// PII masking settings for the chat path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiiConfig {
    /// Whether chat turns mask PII by default.
    #[serde(default)]
    pub enabled: bool,
    /// Whether the entity classifier (names, orgs, locations) is consulted.
    #[serde(default = "default_use_classifier", alias = "use_spacy")]
    pub use_classifier: bool,
    /// `"all"` or a comma-separated list of kind labels, e.g. `"EMAIL,PHONE"`.
    #[serde(default = "default_enabled_types")]
    pub enabled_types: String,
}

fn default_use_classifier() -> bool {
    true
}
fn default_enabled_types() -> String {
    ALL_TYPES.into()
}

impl Default for PiiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            use_classifier: true,
            enabled_types: ALL_TYPES.into(),
        }
    }
}

impl PiiConfig {
    /// Build config from process environment variables.
    ///
    /// - `PII_MASKING_ENABLED` (default `false`)
    /// - `PII_USE_CLASSIFIER` or legacy `PII_USE_SPACY` (default `true`)
    /// - `PII_ENABLED_TYPES` (default `all`)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(v) = lookup("PII_MASKING_ENABLED") {
            config.enabled = parse_flag(&v).unwrap_or(false);
        }
        if let Some(v) = lookup("PII_USE_CLASSIFIER").or_else(|| lookup("PII_USE_SPACY")) {
            config.use_classifier = parse_flag(&v).unwrap_or(true);
        }
        if let Some(v) = lookup("PII_ENABLED_TYPES") {
            config.enabled_types = v;
        }
        config
    }

    /// Load config from env, then overlay a JSON file if it exists.
    ///
    /// A missing file is not an error; a malformed one is.
    pub fn load(config_path: &Path) -> Result<Self> {
        let mut config = Self::from_env();
        match std::fs::read_to_string(config_path) {
            Ok(contents) => {
                let overrides: serde_json::Value = serde_json::from_str(&contents)?;
                // Accept both a bare PII object and a full app config with a "pii" section.
                let section = overrides.get("pii").unwrap_or(&overrides);
                config.apply_overrides(section)?;
                info!("Loaded PII config from {}", config_path.display());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No PII config at {}, using env", config_path.display());
            }
            Err(e) => return Err(e.into()),
        }
        Ok(config)
    }

    /// Apply a JSON object of overrides. Unknown keys are ignored.
    pub fn apply_overrides(&mut self, overrides: &serde_json::Value) -> Result<()> {
        let obj = overrides
            .as_object()
            .ok_or_else(|| Error::Config("PII overrides must be a JSON object".into()))?;

        if let Some(v) = obj.get("enabled") {
            self.enabled = value_to_bool("enabled", v)?;
        }
        if let Some(v) = obj.get("use_classifier").or_else(|| obj.get("use_spacy")) {
            self.use_classifier = value_to_bool("use_classifier", v)?;
        }
        if let Some(v) = obj.get("enabled_types") {
            self.enabled_types = match v {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Array(items) => items
                    .iter()
                    .map(|i| {
                        i.as_str().map(str::to_string).ok_or_else(|| {
                            Error::Config("enabled_types entries must be strings".into())
                        })
                    })
                    .collect::<Result<Vec<_>>>()?
                    .join(","),
                other => {
                    return Err(Error::Config(format!(
                        "enabled_types must be a string or list, got {}",
                        other
                    )))
                }
            };
        }
        Ok(())
    }

    /// Enabled kind labels, upper-cased. `None` means all kinds.
    pub fn enabled_type_labels(&self) -> Option<Vec<String>> {
        let raw = self.enabled_types.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case(ALL_TYPES) {
            return None;
        }
        Some(
            raw.split(',')
                .map(|s| s.trim().to_ascii_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

fn value_to_bool(key: &str, v: &serde_json::Value) -> Result<bool> {
    match v {
        serde_json::Value::Bool(b) => Ok(*b),
        serde_json::Value::Number(n) => Ok(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
        serde_json::Value::String(s) => parse_flag(s)
            .ok_or_else(|| Error::Config(format!("{} is not a boolean: {:?}", key, s))),
        other => Err(Error::Config(format!("{} is not a boolean: {}", key, other))),
    }
}

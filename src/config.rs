//! # Configuration Module
//!
//! Section/key configuration with string values.
//!
//! Values are layered in this order, later layers overriding earlier ones:
//!
//! 1. the template compiled into the binary (`config/config.tpl.json`),
//! 2. the operator's JSON file (`--config`, default `config.json`),
//! 3. environment variables `FORUMD_<SECTION>_<KEY>` for sections the
//!    template or file already defines.
//!
//! ```json
//! {
//!   "https": { "address": ":443", "certificate": "cert.pem", "key": "key.pem" }
//! }
//! ```
//!
//! Every value is read back as a string; lookups of unknown sections or keys
//! return `""`, so callers treat the empty string as "not configured".

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const TEMPLATE: &str = include_str!("../config/config.tpl.json");

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "FORUMD_";

/// Configuration loading failure.
#[derive(Debug)]
pub enum ConfigError {
    /// The configuration file exists but could not be read
    Io { path: PathBuf, source: std::io::Error },
    /// The document is not valid JSON
    Parse { origin: String, source: serde_json::Error },
    /// The document is JSON but not an object of sections
    Shape { origin: String, detail: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "cannot read config file {}: {source}", path.display())
            }
            ConfigError::Parse { origin, source } => {
                write!(f, "invalid JSON in {origin}: {source}")
            }
            ConfigError::Shape { origin, detail } => write!(f, "malformed {origin}: {detail}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Shape { .. } => None,
        }
    }
}

/// Merged configuration, read-only once loaded.
#[derive(Debug, Clone, Default)]
pub struct Config {
    sections: HashMap<String, HashMap<String, String>>,
}

impl Config {
    /// Configuration holding only the compiled-in template values.
    ///
    /// # Errors
    ///
    /// Only fails if the embedded template is malformed.
    pub fn from_template() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.merge_json(TEMPLATE, "config template")?;
        Ok(config)
    }

    /// Template, then `path` (if it exists), then the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_template()?;
        if path.exists() {
            let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            config.merge_json(&raw, &path.display().to_string())?;
            info!(path = %path.display(), "Custom configuration loaded");
        } else {
            info!(path = %path.display(), "No custom configuration file, using defaults");
        }
        config.apply_env(std::env::vars());
        Ok(config)
    }

    /// Overlay a JSON document of `{ "section": { "key": value } }`.
    ///
    /// Scalars that are not strings are stored in their JSON text form
    /// (`true`, `8080`); `null` becomes `""`.
    ///
    /// # Errors
    ///
    /// Fails on invalid JSON or when the document is not an object of objects.
    pub fn merge_json(&mut self, raw: &str, origin: &str) -> Result<(), ConfigError> {
        let doc: Value = serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            origin: origin.to_string(),
            source,
        })?;
        let Value::Object(sections) = doc else {
            return Err(ConfigError::Shape {
                origin: origin.to_string(),
                detail: "top level must be an object".to_string(),
            });
        };
        for (section, entries) in sections {
            let Value::Object(entries) = entries else {
                return Err(ConfigError::Shape {
                    origin: origin.to_string(),
                    detail: format!("section '{section}' must be an object"),
                });
            };
            let target = self.sections.entry(section).or_default();
            for (key, value) in entries {
                let text = match value {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                target.insert(key, text);
            }
        }
        Ok(())
    }

    /// Apply `FORUMD_<SECTION>_<KEY>` overrides for already-known sections.
    pub fn apply_env<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            let Some(rest) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let Some((section, key)) = rest.split_once('_') else {
                continue;
            };
            let section = section.to_ascii_lowercase();
            if let Some(entries) = self.sections.get_mut(&section) {
                let key = key.to_ascii_lowercase();
                debug!(section = %section, key = %key, "Configuration overridden from environment");
                entries.insert(key, value);
            }
        }
    }

    /// String value of `section.key`, `""` when absent.
    #[must_use]
    pub fn get(&self, section: &str, key: &str) -> String {
        self.sections
            .get(section)
            .and_then(|entries| entries.get(key))
            .cloned()
            .unwrap_or_default()
    }

    /// `true` only for the literal value `"true"`.
    #[must_use]
    pub fn get_bool(&self, section: &str, key: &str) -> bool {
        self.get(section, key) == "true"
    }

    /// Numeric value of `section.key`, `default` when absent or not a number.
    #[must_use]
    pub fn get_u64_or(&self, section: &str, key: &str, default: u64) -> u64 {
        self.get(section, key).trim().parse().unwrap_or(default)
    }

    /// All sections and their entries.
    #[must_use]
    pub fn sections(&self) -> &HashMap<String, HashMap<String, String>> {
        &self.sections
    }

    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }
}

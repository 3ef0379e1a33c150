// Typed access to a loaded set of configuration variables

use crate::{ConfigError, Result};
use secrecy::SecretString;
use std::collections::HashMap;
use std::str::FromStr;

/// A snapshot of configuration variables with the prefix stripped.
///
/// Keys are stored upper-case without the prefix, so `PAYLANE_PROVIDERS`
/// is looked up as `PROVIDERS`. Error messages use the full variable name.
#[derive(Debug, Clone, Default)]
pub struct ConfigVars {
    prefix: String,
    values: HashMap<String, String>,
}

impl ConfigVars {
    /// Build from `(name, value)` pairs, keeping only names with the prefix
    pub fn from_pairs<I, K, V>(prefix: &str, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let head = format!("{}_", prefix.to_uppercase());
        let values = pairs
            .into_iter()
            .filter_map(|(key, value)| {
                let key = key.as_ref().to_uppercase();
                key.strip_prefix(&head)
                    .map(|suffix| (suffix.to_string(), value.into()))
            })
            .collect();

        Self {
            prefix: prefix.to_uppercase(),
            values,
        }
    }

    /// Number of variables
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no variables were loaded
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Full variable name for a key, used in messages
    pub fn full_key(&self, key: &str) -> String {
        format!("{}_{}", self.prefix, key.to_uppercase())
    }

    /// Raw value, treating blank values as absent
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(&key.to_uppercase())
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Check if a key exists
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Value that must be present
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| ConfigError::Missing(self.full_key(key)))
    }

    /// Secret that must be present
    pub fn require_secret(&self, key: &str) -> Result<SecretString> {
        self.require(key).map(|v| SecretString::from(v.to_string()))
    }

    /// Parse an optional value
    pub fn parse<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key)
            .map(|raw| {
                raw.parse::<T>()
                    .map_err(|e| ConfigError::invalid(self.full_key(key), e.to_string()))
            })
            .transpose()
    }

    /// Parse a value, falling back to a default when absent
    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        Ok(self.parse(key)?.unwrap_or(default))
    }

    /// Boolean accepting `true/false`, `1/0`, `yes/no`, `on/off`
    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool> {
        let Some(raw) = self.get(key) else {
            return Ok(default);
        };

        match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            other => Err(ConfigError::invalid(
                self.full_key(key),
                format!("'{}' is not a boolean", other),
            )),
        }
    }

    /// Comma separated list with blanks dropped
    pub fn list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

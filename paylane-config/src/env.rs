// Environment variable loading

use crate::{ConfigError, ConfigVars, Result};
use std::env;
use std::path::Path;
use tracing::debug;

/// Environment variable loader
pub struct EnvLoader {
    prefix: String,
}

impl EnvLoader {
    /// Create a loader for variables named `{prefix}_*`
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load `.env` from the working directory if present, then the process environment
    pub fn load_dotenv(&self) -> Result<ConfigVars> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "Loaded .env file"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(ConfigError::LoadError(e.to_string())),
        }
        self.load()
    }

    /// Load a specific env file, then the process environment
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ConfigVars> {
        dotenvy::from_path(path.as_ref()).map_err(|e| ConfigError::LoadError(e.to_string()))?;
        self.load()
    }

    /// Load all prefixed environment variables
    pub fn load(&self) -> Result<ConfigVars> {
        let vars = ConfigVars::from_pairs(&self.prefix, env::vars());
        debug!(prefix = %self.prefix, count = vars.len(), "Loaded environment configuration");
        Ok(vars)
    }

    /// Load a specific environment variable
    pub fn load_var(&self, key: &str) -> Result<String> {
        let full_key = format!("{}_{}", self.prefix, key.to_uppercase());
        env::var(&full_key).map_err(ConfigError::EnvError)
    }

    /// Load with default value
    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }

    /// The variable prefix
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new("PAYLANE")
    }
}

// Configuration validation

use crate::{ConfigError, Result};

/// Trait for validating configuration
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Configuration validator with rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate that a value is not empty
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                field
            )));
        }
        Ok(())
    }

    /// Validate that a number is within range. Unordered values (NaN) fail.
    pub fn in_range<T>(value: T, min: T, max: T, field: &str) -> Result<()>
    where
        T: PartialOrd + std::fmt::Display,
    {
        if !(min <= value && value <= max) {
            return Err(ConfigError::ValidationError(format!(
                "{} must be between {} and {}, got {}",
                field, min, max, value
            )));
        }
        Ok(())
    }

    /// Validate that a number is greater than zero
    pub fn positive(value: u64, field: &str) -> Result<()> {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{} must be greater than 0",
                field
            )));
        }
        Ok(())
    }

    /// Validate that a value is in a list of allowed values
    pub fn one_of<T: PartialEq + std::fmt::Debug>(value: &T, allowed: &[T], field: &str) -> Result<()> {
        if !allowed.contains(value) {
            return Err(ConfigError::ValidationError(format!(
                "{} must be one of {:?}",
                field, allowed
            )));
        }
        Ok(())
    }

    /// Validate URL format
    pub fn is_url(value: &str, field: &str) -> Result<()> {
        let rest = value
            .strip_prefix("https://")
            .or_else(|| value.strip_prefix("http://"));

        match rest {
            Some(host) if !host.is_empty() && !host.starts_with('/') => Ok(()),
            _ => Err(ConfigError::ValidationError(format!(
                "{} must be a valid http(s) URL",
                field
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_empty_validation() {
        assert!(ConfigValidator::not_empty("value", "field").is_ok());
        assert!(ConfigValidator::not_empty("", "field").is_err());
        assert!(ConfigValidator::not_empty("  ", "field").is_err());
    }

    #[test]
    fn test_range_validation() {
        assert!(ConfigValidator::in_range(99.5, 0.0, 100.0, "uptime").is_ok());
        assert!(ConfigValidator::in_range(0, 1, 10, "field").is_err());

        let err = ConfigValidator::in_range(101.0, 0.0, 100.0, "uptime").unwrap_err();
        assert!(err.to_string().contains("between 0 and 100"));

        assert!(ConfigValidator::in_range(f64::NAN, 0.0, 100.0, "uptime").is_err());
        assert!(ConfigValidator::in_range(f64::INFINITY, 0.0, 100.0, "uptime").is_err());
    }

    #[test]
    fn test_positive_validation() {
        assert!(ConfigValidator::positive(1, "max_requests").is_ok());
        assert!(ConfigValidator::positive(0, "max_requests").is_err());
    }

    #[test]
    fn test_one_of_validation() {
        let allowed = ["json", "pretty", "compact"];
        assert!(ConfigValidator::one_of(&"json", &allowed, "log_format").is_ok());
        assert!(ConfigValidator::one_of(&"xml", &allowed, "log_format").is_err());
    }

    #[test]
    fn test_url_validation() {
        assert!(ConfigValidator::is_url("https://api.nium.example", "field").is_ok());
        assert!(ConfigValidator::is_url("http://localhost:8080", "field").is_ok());
        assert!(ConfigValidator::is_url("api.nium.example", "field").is_err());
        assert!(ConfigValidator::is_url("https://", "field").is_err());
    }
}

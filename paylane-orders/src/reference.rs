//! Order references

use crate::{OrderError, OrderResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const PREFIX: &str = "ORD-";

/// Internally generated order reference
///
/// Built from a UUIDv7, so references sort by creation time while the random
/// tail keeps them unguessable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderRef(String);

impl OrderRef {
    /// Generate a fresh reference
    pub fn generate() -> Self {
        Self(format!("{}{}", PREFIX, Uuid::now_v7().simple()))
    }

    /// Wrap an existing reference
    pub fn parse(value: &str) -> OrderResult<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(OrderError::InvalidReference("empty reference".into()));
        }
        if value.len() > 128 || value.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(OrderError::InvalidReference(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    /// Reference as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for OrderRef {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for OrderRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

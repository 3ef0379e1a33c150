//! Error types for order operations

use thiserror::Error;

/// Result type for order operations
pub type OrderResult<T> = Result<T, OrderError>;

/// Order errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// No order with this reference
    #[error("Order not found: {0}")]
    NotFound(String),

    /// An order with this reference already exists
    #[error("Order already exists: {0}")]
    Duplicate(String),

    /// Malformed order reference
    #[error("Invalid order reference: {0}")]
    InvalidReference(String),

    /// Order data failed validation
    #[error("Invalid order: {0}")]
    Invalid(String),

    /// Storage backend failure
    #[error("Order store error: {0}")]
    Store(String),
}

impl OrderError {
    /// Create a new store error
    pub fn store<S: Into<String>>(msg: S) -> Self {
        Self::Store(msg.into())
    }

    /// Whether the error means the order does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

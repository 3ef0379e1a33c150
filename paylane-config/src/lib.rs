// Configuration loading for Paylane
//
// Variables come from the process environment (optionally seeded from a
// `.env` file) under a common prefix, and are read through `ConfigVars`
// typed accessors. Components validate their own sections with
// `ConfigValidator` when they are built.

pub mod env;
pub mod error;
pub mod validation;
pub mod vars;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use validation::{ConfigValidator, Validate};
pub use vars::ConfigVars;

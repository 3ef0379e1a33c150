//! Integration tests for paylane-config

use paylane_config::*;
use std::env;

#[test]
fn test_env_loader_with_prefix() {
    let loader = EnvLoader::new("PAYLANE_ITEST");

    unsafe {
        env::set_var("PAYLANE_ITEST_RATE_LIMIT_MAX_REQUESTS", "42");
        env::set_var("PAYLANE_ITEST_PROVIDERS", "nium,openpayd");
    }

    let vars = loader.load().unwrap();
    assert_eq!(vars.parse_or("RATE_LIMIT_MAX_REQUESTS", 100u64).unwrap(), 42);
    assert_eq!(vars.list("PROVIDERS"), vec!["nium", "openpayd"]);
    assert_eq!(loader.load_var("providers").unwrap(), "nium,openpayd");

    // Cleanup
    unsafe {
        env::remove_var("PAYLANE_ITEST_RATE_LIMIT_MAX_REQUESTS");
        env::remove_var("PAYLANE_ITEST_PROVIDERS");
    }
}

#[test]
fn test_env_loader_missing_var() {
    let loader = EnvLoader::default();

    let result = loader.load_var("NONEXISTENT_VAR_123456");
    assert!(result.is_err());
}

#[test]
fn test_missing_secret_names_full_key() {
    let vars = ConfigVars::from_pairs("PAYLANE", [("PAYLANE_PROVIDERS", "nium")]);

    let err = vars.require_secret("PROVIDER_NIUM_WEBHOOK_SECRET").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Required configuration key missing: PAYLANE_PROVIDER_NIUM_WEBHOOK_SECRET"
    );
}

#[test]
fn test_config_error_display() {
    let err = ConfigError::invalid("PAYLANE_RATE_LIMIT_WINDOW_MS", "invalid digit found in string");
    let display = format!("{}", err);
    assert!(display.contains("PAYLANE_RATE_LIMIT_WINDOW_MS"));
    assert!(display.contains("invalid digit"));
}

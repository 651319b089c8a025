//! Configuration loader
//!
//! Loads client configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `NIMBUS_BASE_URL` is missing or a value is invalid, falls back to a
//!    file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! Every loaded configuration is validated before it is returned.
//!
//! ## Environment Variables
//! - `NIMBUS_BASE_URL`: API base URL (required)
//! - `NIMBUS_ACCESS_TOKEN`: Developer bearer token
//! - `NIMBUS_MAX_ATTEMPTS`: Attempt budget per request
//! - `NIMBUS_REQUEST_TIMEOUT_MS`: Connect/read timeout in milliseconds
//! - `NIMBUS_USER_AGENT`: User-Agent header value
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./nimbus.json` or `./nimbus.toml` (current working directory)
//! 2. `./config.json` or `./config.toml` (current working directory)
//! 3. `../nimbus.json` or `../nimbus.toml` (parent directory)
//! 4. Relative to executable location

use std::path::{Path, PathBuf};
use std::time::Duration;

use nimbus_domain::{ClientConfig, NimbusError, Result};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If that fails, falls
/// back to loading from a config file.
///
/// # Errors
/// Returns `NimbusError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - The loaded configuration fails validation
pub fn load() -> Result<ClientConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only `NIMBUS_BASE_URL` is required; unset variables keep their defaults.
///
/// # Errors
/// Returns `NimbusError::Config` if the base URL is missing or a value is
/// invalid.
pub fn load_from_env() -> Result<ClientConfig> {
    let mut config =
        ClientConfig { base_url: env_var("NIMBUS_BASE_URL")?, ..ClientConfig::default() };

    if let Some(token) = optional_env("NIMBUS_ACCESS_TOKEN") {
        config.access_token = Some(token);
    }
    if let Some(attempts) = optional_env("NIMBUS_MAX_ATTEMPTS") {
        config.max_request_attempts = attempts.parse::<u32>().map_err(|e| {
            NimbusError::Config(format!("Invalid NIMBUS_MAX_ATTEMPTS {attempts:?}: {e}"))
        })?;
    }
    if let Some(timeout) = optional_env("NIMBUS_REQUEST_TIMEOUT_MS") {
        let millis = timeout.parse::<u64>().map_err(|e| {
            NimbusError::Config(format!("Invalid NIMBUS_REQUEST_TIMEOUT_MS {timeout:?}: {e}"))
        })?;
        config.request_timeout = Duration::from_millis(millis);
    }
    if let Some(agent) = optional_env("NIMBUS_USER_AGENT") {
        config.user_agent = agent;
    }

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `NimbusError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid or the configuration fails validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(NimbusError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            NimbusError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| NimbusError::Config(format!("Failed to read config file: {}", e)))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| NimbusError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| NimbusError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(NimbusError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidate_files(&cwd));
        candidates.extend(candidate_files(&cwd.join("..")));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidate_files(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidate_files(dir: &Path) -> [PathBuf; 4] {
    [
        dir.join("nimbus.json"),
        dir.join("nimbus.toml"),
        dir.join("config.json"),
        dir.join("config.toml"),
    ]
}

/// Get required environment variable
///
/// # Errors
/// Returns `NimbusError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    optional_env(key).ok_or_else(|| {
        NimbusError::Config(format!("Missing required environment variable: {}", key))
    })
}

/// Non-empty value of an environment variable, trimmed.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const VARS: [&str; 5] = [
        "NIMBUS_BASE_URL",
        "NIMBUS_ACCESS_TOKEN",
        "NIMBUS_MAX_ATTEMPTS",
        "NIMBUS_REQUEST_TIMEOUT_MS",
        "NIMBUS_USER_AGENT",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_load_from_env_all_vars_set() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("NIMBUS_BASE_URL", "http://localhost:8080/2.0/");
        std::env::set_var("NIMBUS_ACCESS_TOKEN", "dev-token");
        std::env::set_var("NIMBUS_MAX_ATTEMPTS", "5");
        std::env::set_var("NIMBUS_REQUEST_TIMEOUT_MS", "2500");
        std::env::set_var("NIMBUS_USER_AGENT", "nimbus-test");

        let result = load_from_env();
        clear_env();

        let config = result.expect("config from env");
        assert_eq!(config.base_url, "http://localhost:8080/2.0/");
        assert_eq!(config.access_token.as_deref(), Some("dev-token"));
        assert_eq!(config.max_request_attempts, 5);
        assert_eq!(config.request_timeout, Duration::from_millis(2500));
        assert_eq!(config.user_agent, "nimbus-test");
    }

    #[test]
    fn test_load_from_env_missing_base_url() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, NimbusError::Config(msg) if msg.contains("NIMBUS_BASE_URL")));
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("NIMBUS_BASE_URL", "http://localhost/");
        std::env::set_var("NIMBUS_MAX_ATTEMPTS", "lots");
        let result = load_from_env();
        clear_env();

        assert!(matches!(result, Err(NimbusError::Config(_))));
    }

    #[test]
    fn test_load_from_env_rejects_zero_attempts() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("NIMBUS_BASE_URL", "http://localhost/");
        std::env::set_var("NIMBUS_MAX_ATTEMPTS", "0");
        let result = load_from_env();
        clear_env();

        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file_json() {
        let json_content = r#"{
            "base_url": "https://api.example.com/2.0/",
            "max_request_attempts": 4,
            "backoff": { "initial_delay_ms": 250 }
        }"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(json_content.as_bytes()).unwrap();
        let path = temp_file.path().with_extension("json");
        std::fs::copy(temp_file.path(), &path).unwrap();

        let result = load_from_file(Some(path.clone()));
        std::fs::remove_file(path).ok();

        let config = result.expect("config from JSON file");
        assert_eq!(config.base_url, "https://api.example.com/2.0/");
        assert_eq!(config.max_request_attempts, 4);
        assert_eq!(config.backoff.initial_delay_ms, 250);
    }

    #[test]
    fn test_unsupported_extension() {
        let result = parse_config("base_url: x", Path::new("config.yaml"));
        assert!(matches!(result, Err(NimbusError::Config(msg)) if msg.contains("yaml")));
    }

    #[test]
    fn test_missing_explicit_file() {
        let result = load_from_file(Some(PathBuf::from("/definitely/not/here/nimbus.toml")));
        assert!(matches!(result, Err(NimbusError::Config(msg)) if msg.contains("not found")));
    }
}

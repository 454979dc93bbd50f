//! Environment Configuration Loader
//!
//! Loads environment variables from the canonical location: `/etc/sdn-diag/environment`
//! so the CLI and any embedding agent runtime share the same settings.
//!
//! ## Usage
//!
//! Call `load_environment()` early in main() before building [`crate::Settings`]:
//!
//! ```rust
//! use sdn_core::config::load_environment;
//!
//! fn main() {
//!     load_environment();
//!     let settings = sdn_core::Settings::from_env();
//!     assert!(settings.read_timeout.as_secs() > 0);
//! }
//! ```

use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Paths checked in order when `SDN_ENV_FILE` is not set
pub const ENV_FILE_PATHS: &[&str] = &["/etc/sdn-diag/environment", "/etc/sdn-diag.env", ".env"];

/// Load environment variables from the first configuration file found.
///
/// Existing variables are never overridden. Returns the path that was loaded.
pub fn load_environment() -> Option<String> {
    if let Ok(custom_path) = std::env::var("SDN_ENV_FILE") {
        if let Some(path) = try_load_env_file(&custom_path) {
            return Some(path);
        }
    }

    for path in ENV_FILE_PATHS {
        if let Some(loaded_path) = try_load_env_file(path) {
            return Some(loaded_path);
        }
    }

    debug!("No environment file found, using existing environment");
    None
}

/// Try to load an environment file from the given path.
pub fn try_load_env_file(path: &str) -> Option<String> {
    let path_obj = Path::new(path);

    if !path_obj.exists() {
        return None;
    }

    match fs::read_to_string(path_obj) {
        Ok(content) => {
            let mut loaded_count = 0;
            let mut skipped_count = 0;

            for line in content.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }

                if let Some((key, value)) = parse_env_line(line) {
                    if std::env::var(&key).is_err() {
                        std::env::set_var(&key, &value);
                        loaded_count += 1;
                        debug!("Loaded: {}={}", key, masked(&key, &value));
                    } else {
                        skipped_count += 1;
                        debug!("Skipped (already set): {}", key);
                    }
                }
            }

            info!(
                "Loaded {} environment variables from {} ({} skipped - already set)",
                loaded_count, path, skipped_count
            );

            Some(path.to_string())
        }
        Err(e) => {
            warn!("Failed to read environment file {}: {}", path, e);
            None
        }
    }
}

/// Hide values of keys that look like credentials
fn masked<'a>(key: &str, value: &'a str) -> &'a str {
    if key.contains("KEY") || key.contains("TOKEN") || key.contains("SECRET") {
        "***"
    } else {
        value
    }
}

/// Parse a single `KEY=VALUE` line; quotes around the value are stripped.
fn parse_env_line(line: &str) -> Option<(String, String)> {
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    let value = value.trim();

    if key.is_empty() {
        return None;
    }

    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);

    Some((key.to_string(), value.to_string()))
}

/// Get an optional configuration value. Empty values count as unset.
pub fn get_config_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get a boolean configuration value.
pub fn get_config_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => match v.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

/// Get an integer configuration value.
pub fn get_config_int(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

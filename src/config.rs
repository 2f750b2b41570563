//! Server configuration.
//!
//! Settings come from an optional JSON file, then environment overrides.
//! Every field has a default, so an empty or missing file is valid.

use crate::error::AppError;
use crate::services::api_tokens::DEFAULT_GENERATION_ATTEMPTS;
use crate::services::token_generator::VendorChecksumTokenGenerator;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Environment variable naming the settings file.
pub const CONFIG_ENV: &str = "RB_CONFIG";

const PORT_ENV: &str = "RB_PORT";
const DATABASE_PATH_ENV: &str = "RB_DATABASE_PATH";
const BIND_ADDRESS_ENV: &str = "RB_BIND_ADDRESS";

/// Server settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    /// Address to listen on.
    pub bind_address: String,

    pub port: u16,

    /// SQLite database file, created on first start.
    pub database_path: PathBuf,

    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,

    /// ID of the generator used for new API tokens.
    pub token_generator: String,

    /// How many token values to try before giving up on a unique one.
    pub token_generation_attempts: u32,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
            database_path: PathBuf::from("reviewboard.db"),
            log_level: "info".to_string(),
            token_generator: VendorChecksumTokenGenerator::ID.to_string(),
            token_generation_attempts: DEFAULT_GENERATION_ATTEMPTS,
        }
    }
}

impl ServerSettings {
    /// Load settings from a JSON file. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!(
                    "[config] {} not found, using default settings",
                    path.display()
                );
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(AppError::internal(format!(
                    "Failed to read settings from {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_json::from_str(&raw).map_err(|e| {
            AppError::invalid_input(format!("Invalid settings file {}: {}", path.display(), e))
        })
    }

    /// Load settings from `path` (or `RB_CONFIG`), then apply environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);

        let mut settings = match path.or(env_path.as_deref()) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        settings.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(settings)
    }

    /// Apply `RB_*` overrides using `lookup` to read variables.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(PORT_ENV) {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| AppError::invalid_field(PORT_ENV, format!("Invalid port \"{}\"", port)))?;
        }

        if let Some(path) = lookup(DATABASE_PATH_ENV).filter(|p| !p.is_empty()) {
            self.database_path = PathBuf::from(path);
        }

        if let Some(address) = lookup(BIND_ADDRESS_ENV).filter(|a| !a.is_empty()) {
            self.bind_address = address;
        }

        Ok(())
    }

    /// The socket address to bind.
    pub fn socket_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|e| {
                AppError::invalid_field(
                    "bind_address",
                    format!("Invalid bind address \"{}\": {}", self.bind_address, e),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_default_settings() {
        let settings = ServerSettings::default();
        assert_eq!(settings.bind_address, "127.0.0.1");
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.token_generator, "vendor_checksum");
        assert_eq!(settings.token_generation_attempts, 20);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"port": 9000, "log_level": "debug"}"#).unwrap();

        let settings = ServerSettings::from_file(&path).unwrap();
        assert_eq!(settings.port, 9000);
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.database_path, PathBuf::from("reviewboard.db"));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempdir().unwrap();
        let settings = ServerSettings::from_file(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings, ServerSettings::default());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{port: nope").unwrap();

        assert!(matches!(
            ServerSettings::from_file(&path),
            Err(AppError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("RB_PORT", "9999"),
            ("RB_DATABASE_PATH", "/tmp/rb.db"),
            ("RB_BIND_ADDRESS", "0.0.0.0"),
        ]
        .into_iter()
        .collect();

        let mut settings = ServerSettings::default();
        settings
            .apply_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(settings.port, 9999);
        assert_eq!(settings.database_path, PathBuf::from("/tmp/rb.db"));
        assert_eq!(settings.socket_addr().unwrap().to_string(), "0.0.0.0:9999");
    }

    #[test]
    fn test_bad_port_override() {
        let mut settings = ServerSettings::default();
        let err = settings
            .apply_overrides(|name| (name == "RB_PORT").then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(err.field_errors().unwrap().contains_key("RB_PORT"));
    }
}

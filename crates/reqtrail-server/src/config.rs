//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default audit database location.
pub const DEFAULT_DATABASE_PATH: &str = "./reqtrail.db";

/// Default cap on request bodies captured as `$_POST` (64 KiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

/// Paths that are never recorded.
pub const DEFAULT_IGNORED_PATHS: &str = "/health,/audit/javascript";

/// Default CORS allowed origin for local development.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub audit: AuditConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    /// Store captured payloads zlib-compressed
    pub compress_data: bool,
    /// Application table holding `id` and `username`, if any
    pub user_table: Option<String>,
}

/// Recording behaviour of the audit middleware
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Path prefixes that bypass recording
    pub ignored_paths: Vec<String>,
    /// Largest request body captured as `$_POST`
    pub max_body_bytes: usize,
}

impl AuditConfig {
    pub fn is_ignored(&self, path: &str) -> bool {
        self.ignored_paths
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_list(key: &str, default: &str) -> Vec<String> {
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    /// Load configuration from `.env`, `REQTRAIL_*` variables and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: std::env::var("REQTRAIL_HOST")
                    .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: env_or("REQTRAIL_PORT", DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: env_or(
                    "REQTRAIL_SHUTDOWN_TIMEOUT",
                    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                ),
            },
            database: DatabaseConfig {
                path: std::env::var("REQTRAIL_DATABASE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATABASE_PATH)),
                compress_data: env_or("REQTRAIL_COMPRESS_DATA", true),
                user_table: std::env::var("REQTRAIL_USER_TABLE")
                    .ok()
                    .filter(|s| !s.is_empty()),
            },
            audit: AuditConfig {
                ignored_paths: env_list("REQTRAIL_IGNORED_PATHS", DEFAULT_IGNORED_PATHS),
                max_body_bytes: env_or("REQTRAIL_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES),
            },
            cors: CorsConfig {
                allowed_origins: env_list("CORS_ALLOWED_ORIGINS", DEFAULT_CORS_ALLOWED_ORIGIN),
            },
        };

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.database.path.as_os_str().is_empty() {
            anyhow::bail!("Database path cannot be empty");
        }

        if self.audit.max_body_bytes == 0 {
            anyhow::bail!("REQTRAIL_MAX_BODY_BYTES must be greater than 0");
        }

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            database: DatabaseConfig {
                path: PathBuf::from(DEFAULT_DATABASE_PATH),
                compress_data: true,
                user_table: None,
            },
            audit: AuditConfig::default(),
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
            },
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            ignored_paths: DEFAULT_IGNORED_PATHS
                .split(',')
                .map(str::to_string)
                .collect(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "REQTRAIL_HOST",
        "REQTRAIL_PORT",
        "REQTRAIL_DATABASE",
        "REQTRAIL_USER_TABLE",
        "REQTRAIL_IGNORED_PATHS",
        "REQTRAIL_MAX_BODY_BYTES",
    ];

    fn clear() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_load_defaults() {
        clear();
        let config = Config::load().unwrap();
        assert_eq!(config.server.port, DEFAULT_SERVER_PORT);
        assert_eq!(config.audit.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert!(config.audit.is_ignored("/health"));
        assert!(config.database.user_table.is_none());
    }

    #[test]
    #[serial]
    fn test_load_from_env() {
        clear();
        std::env::set_var("REQTRAIL_PORT", "9100");
        std::env::set_var("REQTRAIL_DATABASE", "/tmp/trail.db");
        std::env::set_var("REQTRAIL_USER_TABLE", "app_user");
        std::env::set_var("REQTRAIL_IGNORED_PATHS", "/static, /assets");

        let config = Config::load().unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.database.path, PathBuf::from("/tmp/trail.db"));
        assert_eq!(config.database.user_table.as_deref(), Some("app_user"));
        assert!(config.audit.is_ignored("/static/app.css"));
        assert!(!config.audit.is_ignored("/health"));
        clear();
    }

    #[test]
    #[serial]
    fn test_invalid_port_rejected() {
        clear();
        std::env::set_var("REQTRAIL_PORT", "0");
        assert!(Config::load().is_err());
        clear();
    }

    #[test]
    fn test_zero_body_limit_rejected() {
        let mut config = Config::default();
        config.audit.max_body_bytes = 0;
        assert!(config.validate().is_err());
    }
}

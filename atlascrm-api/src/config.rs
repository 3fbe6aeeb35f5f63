/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `PRODUCTION`: Enables secure cookies and HSTS (default: false)
/// - `CORS_ORIGINS`: Comma-separated allowed origins, `*` for any (default: *)
/// - `SESSION_TTL_DAYS`: Session lifetime, 1 to 365 (default: 30)
/// - `RESET_TOKEN_TTL_MINUTES`: Reset token lifetime, 1 to 1440 (default: 30)
/// - `PASSWORD_HASH_MEMORY_KIB`, `PASSWORD_HASH_ITERATIONS`,
///   `PASSWORD_HASH_PARALLELISM`: Argon2id cost (default: 65536 / 3 / 4)
/// - `DEFAULT_TENANT_NAME`: Name of the shared default tenant (default: AtlasCRM)
/// - `LOG_FORMAT`: `pretty` or `json` (default: pretty)
/// - `RUST_LOG`: Log filter
///
/// # Example
///
/// ```no_run
/// use atlascrm_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use anyhow::Context;
use atlascrm_shared::auth::password::HashParams;
use atlascrm_shared::auth::service::{AuthConfig, DEFAULT_TENANT_NAME};
use atlascrm_shared::db::pool;
use serde::{Deserialize, Serialize};
use std::env;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Upper bound for `SESSION_TTL_DAYS` (one year)
const MAX_SESSION_TTL_DAYS: i64 = 365;

/// Upper bound for `RESET_TOKEN_TTL_MINUTES` (one day)
const MAX_RESET_TOKEN_TTL_MINUTES: i64 = 1440;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Credential subsystem tunables
    pub auth: AuthSettings,

    /// Log output format
    pub log_format: LogFormat,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Production mode: `Secure` cookies, HSTS, no reset links in logs
    pub production: bool,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// Session, reset and hashing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    pub session_ttl_days: i64,
    pub reset_token_ttl_minutes: i64,
    pub password_hash_memory_kib: u32,
    pub password_hash_iterations: u32,
    pub password_hash_parallelism: u32,
    pub default_tenant_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("LOG_FORMAT must be 'pretty' or 'json', got '{}'", other),
        }
    }
}

/// Parses an optional variable, falling back to `default` when unset
fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}

/// Like [`parse_or`], but the value must also fall inside `range`
fn parse_in_range(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: i64,
    range: RangeInclusive<i64>,
) -> anyhow::Result<i64> {
    let value = parse_or(lookup, key, default)?;
    if !range.contains(&value) {
        anyhow::bail!(
            "{} must be between {} and {}, got {}",
            key,
            range.start(),
            range.end(),
            value
        );
    }
    Ok(value)
}

fn parse_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<bool> {
    match lookup(key).as_deref().map(str::trim) {
        None | Some("") => Ok(false),
        Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => Ok(true),
        Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => Ok(false),
        Some(v) => anyhow::bail!("{} must be true or false, got '{}'", key, v),
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variables have invalid values
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let host = lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&lookup, "API_PORT", 8080u16)?;
        let production = parse_bool(&lookup, "PRODUCTION")?;
        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .context("DATABASE_URL environment variable is required")?;
        let max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10u32)?;

        let session_ttl_days = parse_in_range(
            &lookup,
            "SESSION_TTL_DAYS",
            30,
            1..=MAX_SESSION_TTL_DAYS,
        )?;
        let reset_token_ttl_minutes = parse_in_range(
            &lookup,
            "RESET_TOKEN_TTL_MINUTES",
            30,
            1..=MAX_RESET_TOKEN_TTL_MINUTES,
        )?;

        let defaults = HashParams::default();
        let default_tenant_name = lookup("DEFAULT_TENANT_NAME")
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_TENANT_NAME.to_string());

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                production,
                cors_origins,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            auth: AuthSettings {
                session_ttl_days,
                reset_token_ttl_minutes,
                password_hash_memory_kib: parse_or(
                    &lookup,
                    "PASSWORD_HASH_MEMORY_KIB",
                    defaults.memory_kib,
                )?,
                password_hash_iterations: parse_or(
                    &lookup,
                    "PASSWORD_HASH_ITERATIONS",
                    defaults.iterations,
                )?,
                password_hash_parallelism: parse_or(
                    &lookup,
                    "PASSWORD_HASH_PARALLELISM",
                    defaults.parallelism,
                )?,
                default_tenant_name,
            },
            log_format: parse_or(&lookup, "LOG_FORMAT", LogFormat::Pretty)?,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Pool settings for the shared database layer
    pub fn pool_config(&self) -> pool::DatabaseConfig {
        pool::DatabaseConfig {
            url: self.database.url.clone(),
            max_connections: self.database.max_connections,
            ..Default::default()
        }
    }

    /// Settings for the credential services
    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            session_ttl: chrono::Duration::days(self.auth.session_ttl_days),
            reset_token_ttl: chrono::Duration::minutes(self.auth.reset_token_ttl_minutes),
            hash_params: HashParams {
                memory_kib: self.auth.password_hash_memory_kib,
                iterations: self.auth.password_hash_iterations,
                parallelism: self.auth.password_hash_parallelism,
            },
            default_tenant_name: self.auth.default_tenant_name.clone(),
        }
    }

    /// Whether any origin may call the API
    pub fn allows_any_origin(&self) -> bool {
        self.api.cors_origins.iter().any(|o| o == "*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "postgresql://localhost/test")]))
            .unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert!(!config.api.production);
        assert!(config.allows_any_origin());
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.auth.session_ttl_days, 30);
        assert_eq!(config.auth.reset_token_ttl_minutes, 30);
        assert_eq!(config.auth.password_hash_memory_kib, 65536);
        assert_eq!(config.auth.default_tenant_name, "AtlasCRM");
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_database_url_required() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgresql://localhost/test"),
            ("API_HOST", "127.0.0.1"),
            ("API_PORT", "9000"),
            ("PRODUCTION", "true"),
            ("CORS_ORIGINS", "https://app.atlascrm.app, https://atlascrm.app"),
            ("SESSION_TTL_DAYS", "7"),
            ("LOG_FORMAT", "json"),
        ]))
        .unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert!(config.api.production);
        assert!(!config.allows_any_origin());
        assert_eq!(config.api.cors_origins.len(), 2);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.auth_config().session_ttl, chrono::Duration::days(7));
    }

    #[test]
    fn test_invalid_values_rejected() {
        for (key, value) in [
            ("API_PORT", "eighty"),
            ("PRODUCTION", "maybe"),
            ("SESSION_TTL_DAYS", "0"),
            ("PASSWORD_HASH_ITERATIONS", "-1"),
            ("LOG_FORMAT", "xml"),
        ] {
            let result = Config::from_lookup(lookup(&[
                ("DATABASE_URL", "postgresql://localhost/test"),
                (key, value),
            ]));
            assert!(result.is_err(), "{} = {} should be rejected", key, value);
        }
    }

    #[test]
    fn test_oversized_ttls_rejected() {
        for (key, value) in [
            ("SESSION_TTL_DAYS", "9223372036854775807"),
            ("SESSION_TTL_DAYS", "366"),
            ("RESET_TOKEN_TTL_MINUTES", "9223372036854775807"),
            ("RESET_TOKEN_TTL_MINUTES", "1441"),
        ] {
            let err = Config::from_lookup(lookup(&[
                ("DATABASE_URL", "postgresql://localhost/test"),
                (key, value),
            ]))
            .unwrap_err();
            assert!(err.to_string().contains(key), "{}", err);
        }

        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgresql://localhost/test"),
            ("SESSION_TTL_DAYS", "365"),
            ("RESET_TOKEN_TTL_MINUTES", "1440"),
        ]))
        .unwrap();
        let auth = config.auth_config();
        assert_eq!(auth.session_ttl, chrono::Duration::days(365));
        assert_eq!(auth.reset_token_ttl, chrono::Duration::minutes(1440));
    }

    #[test]
    fn test_pool_config() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgresql://localhost/test"),
            ("DATABASE_MAX_CONNECTIONS", "25"),
        ]))
        .unwrap();

        let pool = config.pool_config();
        assert_eq!(pool.url, "postgresql://localhost/test");
        assert_eq!(pool.max_connections, 25);
    }
}

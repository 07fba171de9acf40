//! Application configuration loaded from environment variables.

use secrecy::SecretString;

const DEV_ACCESS_SECRET: &str = "dev-access-token-secret";
const DEV_REFRESH_SECRET: &str = "dev-refresh-token-secret";

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset runs on the in-memory store
/// - `ACCESS_TOKEN_SECRET` / `REFRESH_TOKEN_SECRET`: HMAC keys for bearer tokens
/// - `ACCESS_TOKEN_TTL_SECS` (default: one day) / `REFRESH_TOKEN_TTL_SECS` (default: 30 days)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub access_token_secret: SecretString,
    pub refresh_token_secret: SecretString,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: parsed_var("PORT").unwrap_or(defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            access_token_secret: std::env::var("ACCESS_TOKEN_SECRET")
                .map(SecretString::from)
                .unwrap_or(defaults.access_token_secret),
            refresh_token_secret: std::env::var("REFRESH_TOKEN_SECRET")
                .map(SecretString::from)
                .unwrap_or(defaults.refresh_token_secret),
            access_token_ttl_secs: parsed_var("ACCESS_TOKEN_TTL_SECS")
                .unwrap_or(defaults.access_token_ttl_secs),
            refresh_token_ttl_secs: parsed_var("REFRESH_TOKEN_TTL_SECS")
                .unwrap_or(defaults.refresh_token_ttl_secs),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn access_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.access_token_ttl_secs)
    }

    pub fn refresh_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_token_ttl_secs)
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            access_token_secret: SecretString::from(DEV_ACCESS_SECRET.to_string()),
            refresh_token_secret: SecretString::from(DEV_REFRESH_SECRET.to_string()),
            access_token_ttl_secs: 24 * 60 * 60,
            refresh_token_ttl_secs: 30 * 24 * 60 * 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert!(config.database_url.is_none());
        assert_eq!(config.access_token_ttl_secs, 86_400);
        assert_eq!(config.refresh_token_ttl_secs, 2_592_000);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_ttls_as_durations() {
        let config = Config::default();
        assert_eq!(config.access_token_ttl(), chrono::Duration::days(1));
        assert_eq!(config.refresh_token_ttl(), chrono::Duration::days(30));
    }

    #[test]
    fn test_secrets_are_distinct_and_redacted() {
        let config = Config::default();
        assert_ne!(
            config.access_token_secret.expose_secret(),
            config.refresh_token_secret.expose_secret()
        );
        assert!(!format!("{config:?}").contains(DEV_ACCESS_SECRET));
    }
}

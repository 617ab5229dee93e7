//! Engine connection configuration.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use relmatrix_core::{Error, Result};

/// Header carrying the engine admin secret.
pub const ADMIN_SECRET_HEADER: &str = "X-Hasura-Admin-Secret";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

fn base_url_regex() -> &'static Regex {
    static URL: OnceLock<Regex> = OnceLock::new();
    URL.get_or_init(|| Regex::new(r"^https?://[^\s/?#]+(/[^\s?#]*)?$").expect("valid url regex"))
}

/// How to reach the engine under test.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL, e.g. `http://localhost:8080`
    pub base_url: String,
    /// Value for the admin secret header, when the engine requires one
    pub admin_secret: Option<String>,
    /// Timeout applied to every request
    pub timeout: Duration,
}

impl GatewayConfig {
    /// Create a configuration for the engine at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            admin_secret: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the admin secret.
    pub fn admin_secret(mut self, secret: impl Into<String>) -> Self {
        self.admin_secret = Some(secret.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reject URLs the HTTP client could never reach.
    pub fn validate(&self) -> Result<()> {
        if !base_url_regex().is_match(&self.base_url) {
            return Err(Error::config(format!(
                "engine URL '{}' must be an http(s) URL without query or fragment",
                self.base_url
            )));
        }
        if self.timeout.is_zero() {
            return Err(Error::config("engine timeout must be greater than zero"));
        }
        Ok(())
    }

    pub fn metadata_url(&self) -> String {
        format!("{}/v1/metadata", self.base_url)
    }

    pub fn query_url(&self) -> String {
        format!("{}/v2/query", self.base_url)
    }

    pub fn graphql_url(&self) -> String {
        format!("{}/v1/graphql", self.base_url)
    }

    pub fn health_url(&self) -> String {
        format!("{}/healthz", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        let config = GatewayConfig::new("http://localhost:8080/");
        assert_eq!(config.metadata_url(), "http://localhost:8080/v1/metadata");
        assert_eq!(config.query_url(), "http://localhost:8080/v2/query");
        assert_eq!(config.graphql_url(), "http://localhost:8080/v1/graphql");
        assert_eq!(config.health_url(), "http://localhost:8080/healthz");
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        assert!(GatewayConfig::new("localhost:8080").validate().is_err());
        assert!(GatewayConfig::new("http://host?x=1").validate().is_err());
        assert!(
            GatewayConfig::new("http://host")
                .timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
        GatewayConfig::new("https://engine.internal/prefix")
            .validate()
            .unwrap();
    }

    #[test]
    fn test_builder() {
        let config = GatewayConfig::new("http://e")
            .admin_secret("s3cret")
            .timeout(Duration::from_secs(5));
        assert_eq!(config.admin_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }
}

//! Harness configuration.
//!
//! A backend kind takes part in the matrix only when its configuration is
//! present. Configuration comes from the environment (`from_env`), from JSON
//! (`from_json_str`) or from the builder methods.

use std::path::PathBuf;
use std::time::Duration;

use relmatrix_core::{BackendKind, Error, Result};
use relmatrix_gateway::GatewayConfig;
use serde::{Deserialize, Serialize};

use crate::backends::LhsKind;
use crate::backends::remote_schema::AuxServerConfig;

pub const ENGINE_URL_ENV: &str = "RELMATRIX_ENGINE_URL";
pub const ADMIN_SECRET_ENV: &str = "RELMATRIX_ADMIN_SECRET";
pub const TIMEOUT_ENV: &str = "RELMATRIX_TIMEOUT_SECS";
pub const STARTUP_TIMEOUT_ENV: &str = "RELMATRIX_STARTUP_TIMEOUT_SECS";
pub const POSTGRES_URL_ENV: &str = "RELMATRIX_POSTGRES_URL";
pub const SQLSERVER_URL_ENV: &str = "RELMATRIX_SQLSERVER_URL";
pub const SQLITE_DIR_ENV: &str = "RELMATRIX_SQLITE_DIR";
pub const SQLITE_ENGINE_DIR_ENV: &str = "RELMATRIX_SQLITE_ENGINE_DIR";
pub const REMOTE_SCHEMA_CMD_ENV: &str = "RELMATRIX_REMOTE_SCHEMA_CMD";
pub const REMOTE_SCHEMA_PORT_ENV: &str = "RELMATRIX_REMOTE_SCHEMA_PORT";
pub const REMOTE_SCHEMA_URL_ENV: &str = "RELMATRIX_REMOTE_SCHEMA_URL";
pub const LHS_ENV: &str = "RELMATRIX_LHS";
pub const RHS_ENV: &str = "RELMATRIX_RHS";
pub const MAX_TEARDOWN_FAILURES_ENV: &str = "RELMATRIX_MAX_TEARDOWN_FAILURES";

/// Everything a run needs to know about its environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Engine base URL
    pub engine_url: Option<String>,
    pub admin_secret: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// How long to wait for the engine and auxiliary servers to come up
    pub startup_timeout_secs: u64,
    /// Postgres URL as the engine sees it
    pub postgres_url: Option<String>,
    /// SQL Server connection string as the engine sees it
    pub sqlserver_url: Option<String>,
    /// Directory holding SQLite database files
    pub sqlite_dir: Option<PathBuf>,
    /// The same directory as the engine sees it
    pub sqlite_engine_dir: Option<PathBuf>,
    /// Shell command starting the auxiliary GraphQL server
    pub remote_schema_cmd: Option<String>,
    pub remote_schema_port: u16,
    /// URL the engine uses to reach the auxiliary server
    pub remote_schema_url: Option<String>,
    /// LHS kinds to run; all configured kinds when unset
    pub lhs: Option<Vec<String>>,
    /// RHS kinds to run; all configured kinds when unset
    pub rhs: Option<Vec<String>>,
    /// Teardown failures after which the run stops
    pub max_teardown_failures: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            engine_url: None,
            admin_secret: None,
            timeout_secs: 60,
            startup_timeout_secs: 30,
            postgres_url: None,
            sqlserver_url: None,
            sqlite_dir: None,
            sqlite_engine_dir: None,
            remote_schema_cmd: None,
            remote_schema_port: 4000,
            remote_schema_url: None,
            lhs: None,
            rhs: None,
            max_teardown_failures: 2,
        }
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::config(format!("{} must be a number, got '{}'", name, raw)))
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl HarnessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the `RELMATRIX_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`, which maps variable names to values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        config.engine_url = get(ENGINE_URL_ENV);
        config.admin_secret = get(ADMIN_SECRET_ENV);
        if let Some(raw) = get(TIMEOUT_ENV) {
            config.timeout_secs = parse_number(TIMEOUT_ENV, &raw)?;
        }
        if let Some(raw) = get(STARTUP_TIMEOUT_ENV) {
            config.startup_timeout_secs = parse_number(STARTUP_TIMEOUT_ENV, &raw)?;
        }
        config.postgres_url = get(POSTGRES_URL_ENV);
        config.sqlserver_url = get(SQLSERVER_URL_ENV);
        config.sqlite_dir = get(SQLITE_DIR_ENV).map(PathBuf::from);
        config.sqlite_engine_dir = get(SQLITE_ENGINE_DIR_ENV).map(PathBuf::from);
        config.remote_schema_cmd = get(REMOTE_SCHEMA_CMD_ENV);
        if let Some(raw) = get(REMOTE_SCHEMA_PORT_ENV) {
            config.remote_schema_port = parse_number(REMOTE_SCHEMA_PORT_ENV, &raw)?;
        }
        config.remote_schema_url = get(REMOTE_SCHEMA_URL_ENV);
        config.lhs = get(LHS_ENV).map(|raw| parse_list(&raw));
        config.rhs = get(RHS_ENV).map(|raw| parse_list(&raw));
        if let Some(raw) = get(MAX_TEARDOWN_FAILURES_ENV) {
            config.max_teardown_failures = parse_number(MAX_TEARDOWN_FAILURES_ENV, &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            Error::Config(relmatrix_core::ConfigError {
                message: format!("invalid harness configuration: {}", e),
                source: Some(Box::new(e)),
            })
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn engine_url(mut self, url: impl Into<String>) -> Self {
        self.engine_url = Some(url.into());
        self
    }

    pub fn admin_secret(mut self, secret: impl Into<String>) -> Self {
        self.admin_secret = Some(secret.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn postgres_url(mut self, url: impl Into<String>) -> Self {
        self.postgres_url = Some(url.into());
        self
    }

    pub fn sqlserver_url(mut self, url: impl Into<String>) -> Self {
        self.sqlserver_url = Some(url.into());
        self
    }

    pub fn sqlite_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sqlite_dir = Some(dir.into());
        self
    }

    pub fn remote_schema_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.remote_schema_cmd = Some(cmd.into());
        self
    }

    pub fn remote_schema_port(mut self, port: u16) -> Self {
        self.remote_schema_port = port;
        self
    }

    /// Restrict the LHS kinds.
    pub fn lhs(mut self, kinds: &[&str]) -> Self {
        self.lhs = Some(kinds.iter().map(|k| (*k).to_string()).collect());
        self
    }

    /// Restrict the RHS kinds.
    pub fn rhs(mut self, kinds: &[&str]) -> Self {
        self.rhs = Some(kinds.iter().map(|k| (*k).to_string()).collect());
        self
    }

    pub fn max_teardown_failures(mut self, max: usize) -> Self {
        self.max_teardown_failures = max;
        self
    }

    /// Check the values that can be checked without touching the network.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(Error::config("timeout_secs must be greater than zero"));
        }
        if self.max_teardown_failures == 0 {
            return Err(Error::config("max_teardown_failures must be at least 1"));
        }
        self.lhs_kinds()?;
        self.rhs_kinds()?;
        if let Some(url) = &self.engine_url {
            self.gateway_config_for(url).validate()?;
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    fn gateway_config_for(&self, url: &str) -> GatewayConfig {
        let mut config = GatewayConfig::new(url).timeout(self.timeout());
        if let Some(secret) = &self.admin_secret {
            config = config.admin_secret(secret.clone());
        }
        config
    }

    /// Gateway configuration; fails when no engine URL is set.
    pub fn gateway_config(&self) -> Result<GatewayConfig> {
        let url = self
            .engine_url
            .as_deref()
            .ok_or_else(|| Error::config(format!("{} is not set", ENGINE_URL_ENV)))?;
        Ok(self.gateway_config_for(url))
    }

    /// The auxiliary server configuration, if a command is configured.
    pub fn aux_server_config(&self) -> Option<AuxServerConfig> {
        let command = self.remote_schema_cmd.clone()?;
        let mut config = AuxServerConfig::new(command, self.remote_schema_port)
            .startup_timeout(self.startup_timeout());
        if let Some(url) = &self.remote_schema_url {
            config = config.engine_url(url.clone());
        }
        Some(config)
    }

    /// LHS kinds selected by the filter (all kinds when unset).
    pub fn lhs_kinds(&self) -> Result<Vec<LhsKind>> {
        match &self.lhs {
            None => Ok(LhsKind::all()),
            Some(names) => names
                .iter()
                .map(|name| {
                    LhsKind::parse(name)
                        .ok_or_else(|| Error::config(format!("unknown LHS kind '{}'", name)))
                })
                .collect(),
        }
    }

    /// RHS kinds selected by the filter (all kinds when unset).
    pub fn rhs_kinds(&self) -> Result<Vec<BackendKind>> {
        match &self.rhs {
            None => Ok(BackendKind::ALL.to_vec()),
            Some(names) => names
                .iter()
                .map(|name| {
                    BackendKind::parse(name)
                        .ok_or_else(|| Error::config(format!("unknown RHS kind '{}'", name)))
                })
                .collect(),
        }
    }

    /// Whether the kinds were picked explicitly rather than defaulted.
    pub fn has_lhs_filter(&self) -> bool {
        self.lhs.is_some()
    }

    pub fn has_rhs_filter(&self) -> bool {
        self.rhs.is_some()
    }
}

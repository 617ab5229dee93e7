//! HTTP transport to the engine.

use std::time::{Duration, Instant};

use relmatrix_core::{Error, MetadataError, Result, TransportError};
use serde_json::Value;

use crate::config::{ADMIN_SECRET_HEADER, GatewayConfig};
use crate::gateway::EngineGateway;
use crate::graphql::GraphqlRequest;
use crate::metadata::{MetadataCall, RunSql, bulk_json};

/// [`EngineGateway`] over HTTP, one blocking request per call.
pub struct HttpGateway {
    config: GatewayConfig,
    agent: ureq::Agent,
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("base_url", &self.config.base_url)
            .field("timeout", &self.config.timeout)
            .finish_non_exhaustive()
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build();
    ureq::Agent::new_with_config(config)
}

fn transport_error(url: &str, err: &ureq::Error) -> Error {
    let message = err.to_string();
    let timed_out = matches!(err, ureq::Error::Timeout(_))
        || message.contains("timed out")
        || message.contains("Timeout");
    Error::Transport(TransportError {
        url: url.to_string(),
        message,
        timed_out,
    })
}

/// Map a non-2xx metadata response onto an error.
///
/// The engine answers `{"code", "error", "path"}`; anything else is kept as
/// the message so nothing the engine said is lost.
pub fn metadata_error_from_body(call: &str, status: u16, body: &str) -> Error {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let field = |name: &str| {
        parsed
            .as_ref()
            .and_then(|v| v.get(name))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    Error::Metadata(MetadataError {
        call: call.to_string(),
        code: field("code"),
        path: field("path"),
        message: field("error").unwrap_or_else(|| body.trim().to_string()),
        status,
    })
}

impl HttpGateway {
    /// Create a gateway; the configuration is validated first.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        config.validate()?;
        let agent = build_agent(config.timeout);
        Ok(Self { config, agent })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn post(&self, url: &str, body: &Value, headers: &[(String, String)]) -> Result<(u16, String)> {
        let bytes = serde_json::to_vec(body)?;

        let mut request = self
            .agent
            .post(url)
            .header("Content-Type", "application/json");
        if let Some(secret) = &self.config.admin_secret {
            request = request.header(ADMIN_SECRET_HEADER, secret.as_str());
        }
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let mut response = request
            .send(&bytes[..])
            .map_err(|e| transport_error(url, &e))?;
        let status = response.status().as_u16();
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| transport_error(url, &e))?;
        Ok((status, text))
    }

    /// POST a metadata-style body and parse a 2xx JSON answer.
    fn post_call(&self, url: &str, call: &str, body: &Value) -> Result<Value> {
        tracing::debug!(call = %call, url = %url, "Sending engine call");
        let (status, text) = self.post(url, body, &[])?;
        if !(200..300).contains(&status) {
            let err = metadata_error_from_body(call, status, &text);
            tracing::debug!(call = %call, status, error = %err, "Engine call rejected");
            return Err(err);
        }
        serde_json::from_str(&text).map_err(|e| {
            Error::protocol(
                format!("{} returned invalid JSON: {}", call, e),
                Some(text.clone()),
            )
        })
    }
}

impl EngineGateway for HttpGateway {
    fn metadata(&self, call: &MetadataCall) -> Result<Value> {
        self.post_call(&self.config.metadata_url(), &call.call_type(), &call.to_json()?)
    }

    fn metadata_batch(&self, calls: &[MetadataCall]) -> Result<Value> {
        self.post_call(&self.config.metadata_url(), "bulk", &bulk_json(calls)?)
    }

    fn run_sql(&self, sql: &RunSql) -> Result<Value> {
        tracing::trace!(source = %sql.source, sql = %sql.sql, "run_sql");
        self.post_call(&self.config.query_url(), sql.call_type()?, &sql.to_json()?)
    }

    fn graphql(&self, request: &GraphqlRequest) -> Result<Value> {
        let url = self.config.graphql_url();
        let headers = match &request.identity {
            Some(identity) => identity.headers()?,
            None => Vec::new(),
        };
        tracing::debug!(
            role = request.identity.as_ref().map_or("admin", |i| i.role.as_str()),
            "Executing GraphQL query"
        );
        let (status, text) = self.post(&url, &request.body(), &headers)?;
        serde_json::from_str(&text).map_err(|e| {
            Error::protocol(
                format!("GraphQL endpoint answered {} with invalid JSON: {}", status, e),
                Some(text.clone()),
            )
        })
    }

    fn health(&self) -> Result<()> {
        let url = self.config.health_url();
        check_health(&self.agent, &url)
    }
}

fn check_health(agent: &ureq::Agent, url: &str) -> Result<()> {
    let response = agent.get(url).call().map_err(|e| transport_error(url, &e))?;
    let status = response.status().as_u16();
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(Error::Transport(TransportError {
            url: url.to_string(),
            message: format!("health check returned status {}", status),
            timed_out: false,
        }))
    }
}

/// Poll `url` until it answers 2xx or `timeout` elapses.
///
/// Only used while an engine or auxiliary server is starting.
pub fn wait_until_ready(url: &str, timeout: Duration) -> Result<()> {
    let poll_interval = Duration::from_millis(200);
    let agent = build_agent(Duration::from_secs(2));
    let deadline = Instant::now() + timeout;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match check_health(&agent, url) {
            Ok(()) => {
                tracing::debug!(url = %url, attempts, "Server is ready");
                return Ok(());
            }
            Err(err) if Instant::now() >= deadline => {
                return Err(Error::Transport(TransportError {
                    url: url.to_string(),
                    message: format!(
                        "not ready after {:?} ({} attempts): {}",
                        timeout, attempts, err
                    ),
                    timed_out: true,
                }));
            }
            Err(err) => {
                tracing::trace!(url = %url, error = %err, "Server not ready yet");
                std::thread::sleep(poll_interval);
            }
        }
    }
}

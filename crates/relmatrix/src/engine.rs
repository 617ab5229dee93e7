//! The engine handle injected into every setup, teardown and query.

use std::sync::Arc;
use std::time::Duration;

use relmatrix_core::Result;
use relmatrix_gateway::{
    EngineGateway, GatewayConfig, GraphqlRequest, HttpGateway, MetadataCall, RunSql,
    wait_until_ready,
};
use serde_json::Value;

/// Shared handle to the engine under test.
///
/// Cloning is cheap; every clone talks to the same engine. The lifecycle
/// (`start`, `clear_metadata`, `stop`) is driven by whoever owns the run,
/// never by an individual context.
#[derive(Clone)]
pub struct EngineHandle {
    gateway: Arc<dyn EngineGateway>,
    health_url: Option<String>,
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("health_url", &self.health_url)
            .finish_non_exhaustive()
    }
}

impl EngineHandle {
    /// Wrap any gateway implementation.
    pub fn new(gateway: Arc<dyn EngineGateway>) -> Self {
        Self {
            gateway,
            health_url: None,
        }
    }

    /// Connect to an engine over HTTP.
    pub fn http(config: GatewayConfig) -> Result<Self> {
        let health_url = config.health_url();
        let gateway = HttpGateway::new(config)?;
        Ok(Self {
            gateway: Arc::new(gateway),
            health_url: Some(health_url),
        })
    }

    pub fn gateway(&self) -> &Arc<dyn EngineGateway> {
        &self.gateway
    }

    /// Make sure the engine is reachable before the first combination.
    ///
    /// HTTP engines are polled for up to `startup_timeout`; other gateways get
    /// a single health check.
    pub fn start(&self, startup_timeout: Duration) -> Result<()> {
        match &self.health_url {
            Some(url) => wait_until_ready(url, startup_timeout)?,
            None => self.gateway.health()?,
        }
        tracing::info!("Engine is ready");
        Ok(())
    }

    /// Drop every source, table tracking, permission and relationship.
    pub fn clear_metadata(&self) -> Result<()> {
        tracing::debug!("Clearing engine metadata");
        self.gateway.metadata(&MetadataCall::ClearMetadata)?;
        Ok(())
    }

    /// Leave the engine with empty metadata at the end of a run.
    pub fn stop(&self) -> Result<()> {
        self.clear_metadata()?;
        tracing::info!("Engine metadata cleared; run finished");
        Ok(())
    }

    pub fn metadata(&self, call: &MetadataCall) -> Result<Value> {
        self.gateway.metadata(call)
    }

    pub fn metadata_batch(&self, calls: &[MetadataCall]) -> Result<Value> {
        self.gateway.metadata_batch(calls)
    }

    pub fn run_sql(&self, sql: &RunSql) -> Result<Value> {
        self.gateway.run_sql(sql)
    }

    pub fn graphql(&self, request: &GraphqlRequest) -> Result<Value> {
        self.gateway.graphql(request)
    }
}

/// Treat "already gone" as success for a teardown step.
pub fn tolerate_missing<T>(result: Result<T>) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(err) if err.is_not_found() => {
            tracing::debug!(error = %err, "Teardown step found nothing to remove");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

//! In-memory engine stand-in for exercising contexts and the driver.
//!
//! [`RecordingGateway`] answers every call successfully unless told
//! otherwise, records what it was asked, and can share an [`EventLog`] with
//! test contexts so relative ordering across both is observable.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use relmatrix_core::{Error, MetadataError, Result};
use relmatrix_gateway::{EngineGateway, GraphqlRequest, MetadataCall, RunSql};
use serde_json::{Value, json};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ordered, shareable list of events.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        lock(&self.0).push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        lock(&self.0).clone()
    }
}

/// One call received by a [`RecordingGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Metadata(String),
    Batch(Vec<String>),
    RunSql { source: String, sql: String },
    Graphql { role: Option<String> },
    Health,
}

type Responder = Box<dyn Fn(&GraphqlRequest) -> Value + Send + Sync>;

/// Gateway that records calls and injects failures.
pub struct RecordingGateway {
    calls: Mutex<Vec<Call>>,
    bodies: Mutex<Vec<Value>>,
    failing_calls: Mutex<Vec<(String, Option<String>)>>,
    fail_health: bool,
    responder: Option<Responder>,
    log: Option<EventLog>,
}

impl std::fmt::Debug for RecordingGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingGateway")
            .field("calls", &*lock(&self.calls))
            .finish_non_exhaustive()
    }
}

impl Default for RecordingGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            bodies: Mutex::new(Vec::new()),
            failing_calls: Mutex::new(Vec::new()),
            fail_health: false,
            responder: None,
            log: None,
        }
    }

    /// Mirror every call into `log` as `"<kind> <type>"`.
    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Answer GraphQL queries with `responder` instead of `{"data": {}}`.
    pub fn with_responder(
        mut self,
        responder: impl Fn(&GraphqlRequest) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.responder = Some(Box::new(responder));
        self
    }

    /// Report the engine as down.
    pub fn with_failing_health(mut self) -> Self {
        self.fail_health = true;
        self
    }

    /// Reject every metadata or SQL call whose type equals `call_type`, with
    /// the given engine error code.
    pub fn fail_call(&self, call_type: impl Into<String>, code: Option<&str>) {
        lock(&self.failing_calls).push((call_type.into(), code.map(str::to_string)));
    }

    /// Stop rejecting `call_type`.
    pub fn heal_call(&self, call_type: &str) {
        lock(&self.failing_calls).retain(|(t, _)| t != call_type);
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    /// Full request bodies of metadata, batch and SQL calls, in order.
    pub fn bodies(&self) -> Vec<Value> {
        lock(&self.bodies).clone()
    }

    /// Types of every metadata call, with batches flattened.
    pub fn metadata_types(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .flat_map(|call| match call {
                Call::Metadata(t) => vec![t],
                Call::Batch(types) => types,
                _ => Vec::new(),
            })
            .collect()
    }

    fn record(&self, call: Call, event: String) {
        if let Some(log) = &self.log {
            log.push(event);
        }
        lock(&self.calls).push(call);
    }

    fn check(&self, call_type: &str) -> Result<()> {
        let failing = lock(&self.failing_calls);
        match failing.iter().find(|(t, _)| t == call_type) {
            Some((_, code)) => Err(Error::Metadata(MetadataError {
                call: call_type.to_string(),
                code: code.clone(),
                path: Some("$.args".to_string()),
                message: format!("injected failure for {}", call_type),
                status: 400,
            })),
            None => Ok(()),
        }
    }
}

impl EngineGateway for RecordingGateway {
    fn metadata(&self, call: &MetadataCall) -> Result<Value> {
        let call_type = call.call_type();
        lock(&self.bodies).push(call.to_json()?);
        self.record(
            Call::Metadata(call_type.clone()),
            format!("metadata {}", call_type),
        );
        self.check(&call_type)?;
        Ok(json!({ "message": "success" }))
    }

    fn metadata_batch(&self, calls: &[MetadataCall]) -> Result<Value> {
        let types: Vec<String> = calls.iter().map(MetadataCall::call_type).collect();
        lock(&self.bodies).push(relmatrix_gateway::bulk_json(calls)?);
        self.record(Call::Batch(types.clone()), format!("bulk {}", types.join(",")));
        self.check("bulk")?;
        for call_type in &types {
            self.check(call_type)?;
        }
        Ok(json!(types.iter().map(|_| json!({ "message": "success" })).collect::<Vec<_>>()))
    }

    fn run_sql(&self, sql: &RunSql) -> Result<Value> {
        lock(&self.bodies).push(sql.to_json()?);
        self.record(
            Call::RunSql {
                source: sql.source.clone(),
                sql: sql.sql.clone(),
            },
            format!("run_sql {}", sql.source),
        );
        self.check(sql.call_type()?)?;
        Ok(json!({ "result_type": "CommandOk", "result": null }))
    }

    fn graphql(&self, request: &GraphqlRequest) -> Result<Value> {
        let role = request.identity.as_ref().map(|i| i.role.clone());
        self.record(
            Call::Graphql { role: role.clone() },
            format!("graphql {}", role.as_deref().unwrap_or("admin")),
        );
        Ok(match &self.responder {
            Some(responder) => responder(request),
            None => json!({ "data": {} }),
        })
    }

    fn health(&self) -> Result<()> {
        self.record(Call::Health, "health".to_string());
        if self.fail_health {
            return Err(Error::Custom("engine is down".to_string()));
        }
        Ok(())
    }
}

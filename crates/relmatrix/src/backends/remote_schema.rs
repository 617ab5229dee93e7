//! Remote-schema LHS backed by an auxiliary GraphQL server.
//!
//! The server is an external program started with `sh -c <command>`. It must:
//!
//! - listen on `127.0.0.1:$PORT`,
//! - answer `GET /healthz` with 2xx once ready,
//! - serve GraphQL at `/graphql` with a `hasura_artist` list root returning
//!   objects `{ id: Int, name: String! }`,
//! - read its rows from the JSON file named by `RELMATRIX_ARTIST_DATA`
//!   (`{"hasura_artist": [{"id": 1, "name": "artist1"}, ...]}`).
//!
//! The process runs in its own process group, owned by the LHS local state.
//! Dropping the state kills the whole group, so servers the shell forked
//! release the port along with it.

use std::io::Write;
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use relmatrix_core::{
    Error, Options, RelationshipSource, Result, TableIdentity, TransportError,
};
use relmatrix_gateway::{MetadataCall, wait_until_ready};
#[cfg(unix)]
use nix::sys::signal::{Signal, killpg};
#[cfg(unix)]
use nix::unistd::Pid;
use serde_json::json;
use tempfile::NamedTempFile;

use super::LhsLocalState;
use crate::context::{Context, LhsFactory, collect_teardown};
use crate::engine::{EngineHandle, tolerate_missing};
use crate::fixtures;

/// Environment variable naming the artist data file.
pub const ARTIST_DATA_ENV: &str = "RELMATRIX_ARTIST_DATA";

/// Engine-side timeout for remote schema requests.
const REMOTE_SCHEMA_TIMEOUT_SECS: u64 = 60;

/// How to start the auxiliary server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxServerConfig {
    /// Shell command line
    pub command: String,
    pub port: u16,
    /// GraphQL URL as the engine sees it, when it differs from the local one
    pub engine_url: Option<String>,
    pub startup_timeout: Duration,
}

impl AuxServerConfig {
    pub fn new(command: impl Into<String>, port: u16) -> Self {
        Self {
            command: command.into(),
            port,
            engine_url: None,
            startup_timeout: Duration::from_secs(30),
        }
    }

    pub fn engine_url(mut self, url: impl Into<String>) -> Self {
        self.engine_url = Some(url.into());
        self
    }

    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    fn local_base(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn health_url(&self) -> String {
        format!("{}/healthz", self.local_base())
    }

    /// The URL registered with the engine.
    pub fn graphql_url(&self) -> String {
        self.engine_url
            .clone()
            .unwrap_or_else(|| format!("{}/graphql", self.local_base()))
    }
}

/// A running auxiliary server.
#[derive(Debug)]
pub struct AuxServer {
    child: Child,
    url: String,
    // Kept alive for as long as the server may read it.
    _data: NamedTempFile,
}

impl AuxServer {
    /// Write the artist rows, start the server and wait until it is healthy.
    pub fn spawn(config: &AuxServerConfig) -> Result<Self> {
        let rows = fixtures::artist_table().rows_as_json();
        let mut data = NamedTempFile::new()?;
        serde_json::to_writer(&mut data, &json!({ fixtures::ARTIST_TYPE: rows }))?;
        data.flush()?;

        tracing::info!(command = %config.command, port = config.port, "Starting auxiliary GraphQL server");
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&config.command)
            .env("PORT", config.port.to_string())
            .env(ARTIST_DATA_ENV, data.path())
            .stdin(Stdio::null());
        #[cfg(unix)]
        command.process_group(0);
        let child = command.spawn()?;

        let mut server = Self {
            child,
            url: config.graphql_url(),
            _data: data,
        };

        if let Err(err) = wait_until_ready(&config.health_url(), config.startup_timeout) {
            // A server that already exited says more than the timeout does.
            if let Ok(Some(status)) = server.child.try_wait() {
                return Err(Error::Transport(TransportError {
                    url: config.health_url(),
                    message: format!("auxiliary server exited with {} before becoming ready", status),
                    timed_out: false,
                }));
            }
            return Err(err);
        }
        Ok(server)
    }

    /// GraphQL URL the engine should use.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl AuxServer {
    /// Signal every process in the server's group.
    #[cfg(unix)]
    fn kill_group(&self) {
        let Ok(pgid) = i32::try_from(self.child.id()) else {
            return;
        };
        if let Err(err) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
            tracing::debug!(error = %err, pgid, "Auxiliary server group already gone");
        }
    }
}

impl Drop for AuxServer {
    fn drop(&mut self) {
        #[cfg(unix)]
        self.kill_group();
        if let Err(err) = self.child.kill() {
            tracing::debug!(error = %err, "Auxiliary server already stopped");
        }
        let _ = self.child.wait();
    }
}

/// LHS factory for a remote schema named `source` exposing `hasura_artist`.
pub fn remote_schema_lhs(config: AuxServerConfig) -> LhsFactory<LhsLocalState> {
    LhsFactory::new("remote_schema", move |target: &TableIdentity| {
        let relationship = fixtures::albums_relationship(
            RelationshipSource::RemoteSchemaType {
                remote_schema: fixtures::LHS_SOURCE.to_string(),
                type_name: fixtures::ARTIST_TYPE.to_string(),
            },
            target,
        );
        let config = config.clone();

        let setup = move |engine: &EngineHandle, local: &LhsLocalState| -> Result<()> {
            let server = local
                .aux_server()
                .ok_or_else(|| Error::config("remote schema LHS started without a server"))?;
            relationship.validate(&fixtures::artist_table(), &fixtures::album_table())?;
            engine.metadata(&MetadataCall::AddRemoteSchema {
                name: fixtures::LHS_SOURCE.to_string(),
                url: server.url().to_string(),
                timeout_seconds: REMOTE_SCHEMA_TIMEOUT_SECS,
            })?;
            engine.metadata(&MetadataCall::CreateRemoteSchemaRelationship {
                relationship: relationship.clone(),
            })?;
            Ok(())
        };

        // Removing the remote schema drops its relationships as well.
        let teardown = |engine: &EngineHandle, _: &LhsLocalState| -> Result<()> {
            collect_teardown([tolerate_missing(engine.metadata(
                &MetadataCall::RemoveRemoteSchema {
                    name: fixtures::LHS_SOURCE.to_string(),
                },
            ))])
        };

        Context::new("remote_schema", move |_: &EngineHandle| {
            AuxServer::spawn(&config).map(LhsLocalState::AuxServer)
        })
        .with_setup(setup)
        .with_teardown(teardown)
        .with_options(Options::default().unordered_field(fixtures::ARTIST_TYPE))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingGateway;
    use std::net::TcpListener;
    use std::sync::Arc;

    fn free_port() -> u16 {
        TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    #[test]
    fn urls() {
        let config = AuxServerConfig::new("node server.js", 4000);
        assert_eq!(config.health_url(), "http://127.0.0.1:4000/healthz");
        assert_eq!(config.graphql_url(), "http://127.0.0.1:4000/graphql");
        let config = config.engine_url("http://host.docker.internal:4000/graphql");
        assert_eq!(config.graphql_url(), "http://host.docker.internal:4000/graphql");
    }

    #[test]
    fn server_that_exits_is_reported() {
        let config = AuxServerConfig::new("exit 3", free_port())
            .startup_timeout(Duration::from_millis(500));
        let err = AuxServer::spawn(&config).unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[test]
    #[cfg(unix)]
    fn forked_server_goes_down_with_its_shell() {
        use std::net::TcpStream;
        use std::time::Instant;

        if Command::new("python3").arg("--version").output().is_err() {
            eprintln!("skipping forked server test: python3 not available");
            return;
        }
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("healthz"), "ok").unwrap();
        let port = free_port();
        // `; true` keeps sh alive as the parent instead of exec'ing python.
        let command = format!(
            "cd '{}' && python3 -m http.server \"$PORT\" --bind 127.0.0.1; true",
            root.path().display()
        );
        let config = AuxServerConfig::new(command, port).startup_timeout(Duration::from_secs(15));

        let server = AuxServer::spawn(&config).unwrap();
        assert!(TcpStream::connect(("127.0.0.1", port)).is_ok());
        drop(server);

        let deadline = Instant::now() + Duration::from_secs(5);
        while TcpStream::connect(("127.0.0.1", port)).is_ok() {
            assert!(Instant::now() < deadline, "server on port {port} outlived its shell");
            std::thread::sleep(Duration::from_millis(50));
        }
        TcpListener::bind(("127.0.0.1", port)).unwrap();
    }

    #[test]
    fn local_state_failure_surfaces_from_context() {
        let engine = EngineHandle::new(Arc::new(RecordingGateway::new()));
        let config = AuxServerConfig::new("exit 1", free_port())
            .startup_timeout(Duration::from_millis(300));
        let context = remote_schema_lhs(config)
            .context_for(&TableIdentity::path("target", "album"));
        assert_eq!(context.name, "remote_schema");
        assert!(context.options.unordered_fields.contains("hasura_artist"));
        assert!(context.build_local_state(&engine).is_err());
    }

    #[test]
    fn setup_requires_a_server() {
        let gateway = Arc::new(RecordingGateway::new());
        let engine = EngineHandle::new(gateway.clone());
        let context = remote_schema_lhs(AuxServerConfig::new("true", 4000))
            .context_for(&TableIdentity::qualified("target", "hasura", "album"));
        assert!(context.run_setup(&engine, &LhsLocalState::Database).is_err());
        context.run_teardown(&engine, &LhsLocalState::Database).unwrap();
        assert_eq!(gateway.metadata_types(), vec!["remove_remote_schema"]);
    }
}

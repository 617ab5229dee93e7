//! Error types for harness operations.

use std::fmt;

use crate::options::OptionsConflict;

/// The primary error type for all relmatrix operations.
#[derive(Debug)]
pub enum Error {
    /// Invalid configuration or fixture definition
    Config(ConfigError),
    /// Conflicting options found while combining contexts
    Options(Vec<OptionsConflict>),
    /// A backend rejected a DDL/DML statement
    Backend(BackendError),
    /// The engine rejected a metadata or run_sql call
    Metadata(MetadataError),
    /// HTTP-level failure talking to the engine or an auxiliary server
    Transport(TransportError),
    /// The engine answered with something we could not interpret
    Protocol(ProtocolError),
    /// One or more teardown steps failed
    Teardown(Vec<Error>),
    /// I/O errors
    Io(std::io::Error),
    /// Serialization/deserialization errors
    Serde(String),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug)]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub sql: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// Could not open or reach the database
    Connect,
    /// Syntax error in generated SQL
    Syntax,
    /// Constraint violation while inserting fixture rows
    Constraint,
    /// Table or schema not found
    NotFound,
    /// Any other database error
    Database,
}

/// An error returned by the engine for a metadata-management call.
#[derive(Debug, Clone)]
pub struct MetadataError {
    /// The `type` of the call that failed (e.g. `pg_track_table`, `bulk`)
    pub call: String,
    /// Engine error code (e.g. `not-exists`, `already-tracked`)
    pub code: Option<String>,
    /// JSON path inside the request that the engine blamed
    pub path: Option<String>,
    pub message: String,
    /// HTTP status of the response
    pub status: u16,
}

#[derive(Debug)]
pub struct TransportError {
    pub url: String,
    pub message: String,
    pub timed_out: bool,
}

#[derive(Debug)]
pub struct ProtocolError {
    pub message: String,
    pub body: Option<String>,
}

impl MetadataError {
    /// Does this error say the object being removed was never there?
    ///
    /// Teardown steps treat these as success so that teardown after a
    /// partial setup is safe.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.code.as_deref(),
            Some("not-exists" | "already-untracked" | "not-found" | "remote-schema-not-found")
        )
    }

    /// Does this error say the object being created is already there?
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self.code.as_deref(),
            Some("already-exists" | "already-tracked")
        )
    }
}

impl Error {
    /// Build a configuration error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(ConfigError {
            message: message.into(),
            source: None,
        })
    }

    /// Build a protocol error from a message and optional raw body.
    pub fn protocol(message: impl Into<String>, body: Option<String>) -> Self {
        Error::Protocol(ProtocolError {
            message: message.into(),
            body,
        })
    }

    /// Is this a metadata "not found" error (see [`MetadataError::is_not_found`])?
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Metadata(m) => m.is_not_found(),
            Error::Backend(b) => b.kind == BackendErrorKind::NotFound,
            _ => false,
        }
    }

    /// Get the engine error code if this is a metadata error.
    pub fn metadata_code(&self) -> Option<&str> {
        match self {
            Error::Metadata(m) => m.code.as_deref(),
            _ => None,
        }
    }

    /// Get the SQL that caused this error, if available.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Backend(b) => b.sql.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Options(conflicts) => {
                write!(f, "Conflicting options:")?;
                for conflict in conflicts {
                    write!(f, " [{}]", conflict)?;
                }
                Ok(())
            }
            Error::Backend(e) => write!(f, "Backend error: {}", e),
            Error::Metadata(e) => write!(f, "Metadata error: {}", e),
            Error::Transport(e) => write!(f, "Transport error: {}", e),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e.message),
            Error::Teardown(errors) => {
                write!(f, "Teardown failed in {} step(s)", errors.len())?;
                for err in errors {
                    write!(f, "; {}", err)?;
                }
                Ok(())
            }
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Serde(msg) => write!(f, "Serialization error: {}", msg),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Io(e) => Some(e),
            Error::Teardown(errors) => errors
                .first()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sql {
            Some(sql) => write!(f, "{} (while running: {})", self.message, sql),
            None => write!(f, "{}", self.message),
        }
    }
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed", self.call)?;
        if let Some(code) = &self.code {
            write!(f, " [{}]", code)?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(path) = &self.path {
            write!(f, " at {}", path)?;
        }
        Ok(())
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.timed_out {
            write!(f, "request to {} timed out: {}", self.url, self.message)
        } else {
            write!(f, "request to {} failed: {}", self.url, self.message)
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err.to_string())
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<BackendError> for Error {
    fn from(err: BackendError) -> Self {
        Error::Backend(err)
    }
}

impl From<MetadataError> for Error {
    fn from(err: MetadataError) -> Self {
        Error::Metadata(err)
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        Error::Transport(err)
    }
}

impl From<ProtocolError> for Error {
    fn from(err: ProtocolError) -> Self {
        Error::Protocol(err)
    }
}

/// Result type alias for relmatrix operations.
pub type Result<T> = std::result::Result<T, Error>;

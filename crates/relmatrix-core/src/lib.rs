//! Core types for the relmatrix relationship harness.
//!
//! This crate holds the backend-agnostic vocabulary shared by every other
//! relmatrix crate:
//!
//! - `Table` fixtures describing columns, keys and seed rows
//! - `TableIdentity` values passed from an RHS to an LHS
//! - `RelationshipDeclaration` and `SelectPermission` metadata payloads
//! - `Options` and their conflict-detecting merge
//! - the `Error` taxonomy

pub mod backend;
pub mod error;
pub mod fixture;
pub mod identity;
pub mod options;
pub mod permission;
pub mod relationship;
pub mod value;

pub use backend::BackendKind;
pub use error::{
    BackendError, BackendErrorKind, ConfigError, Error, MetadataError, ProtocolError, Result,
    TransportError,
};
pub use fixture::{Column, Reference, ScalarType, Table, is_valid_identifier};
pub use identity::{TableIdentity, TableNaming};
pub use options::{Options, OptionsConflict};
pub use permission::{SelectPermission, effective_limit};
pub use relationship::{RelationshipDeclaration, RelationshipKind, RelationshipSource};
pub use value::Value;

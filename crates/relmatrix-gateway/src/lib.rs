//! Gateway to the federated GraphQL engine under test.
//!
//! - [`MetadataCall`] / [`RunSql`]: metadata-management and SQL calls
//! - [`GraphqlRequest`] with an optional [`CallerIdentity`]
//! - [`EngineGateway`]: the trait the harness talks to
//! - [`HttpGateway`]: the `ureq`-based implementation

pub mod config;
pub mod gateway;
pub mod graphql;
pub mod http;
pub mod identity;
pub mod metadata;

pub use config::{ADMIN_SECRET_HEADER, DEFAULT_TIMEOUT, GatewayConfig};
pub use gateway::EngineGateway;
pub use graphql::{GraphqlRequest, response_errors};
pub use http::{HttpGateway, metadata_error_from_body, wait_until_ready};
pub use identity::CallerIdentity;
pub use metadata::{MetadataCall, RunSql, bulk_json};

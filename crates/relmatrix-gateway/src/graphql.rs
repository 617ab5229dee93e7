//! GraphQL requests and response helpers.

use serde_json::{Value, json};

use crate::identity::CallerIdentity;

/// A GraphQL query against the unified schema.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphqlRequest {
    pub query: String,
    pub variables: Option<Value>,
    /// Caller identity; `None` runs the query as admin.
    pub identity: Option<CallerIdentity>,
}

impl GraphqlRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: None,
            identity: None,
        }
    }

    pub fn variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }

    /// Run the query as this caller.
    pub fn identity(mut self, identity: CallerIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// The request body.
    pub fn body(&self) -> Value {
        match &self.variables {
            Some(variables) => json!({ "query": self.query, "variables": variables }),
            None => json!({ "query": self.query }),
        }
    }
}

/// The `errors` array of a response, if the engine reported any.
pub fn response_errors(response: &Value) -> Option<&[Value]> {
    response
        .get("errors")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .filter(|errors| !errors.is_empty())
}

//! Caller identity forwarded with GraphQL queries.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use relmatrix_core::{Error, Result};

const HEADER_PREFIX: &str = "X-Hasura-";

fn claim_regex() -> &'static Regex {
    static CLAIM: OnceLock<Regex> = OnceLock::new();
    CLAIM.get_or_init(|| Regex::new(r"^[A-Za-z0-9]+(-[A-Za-z0-9]+)*$").expect("valid claim regex"))
}

/// A role plus session claims, sent as `X-Hasura-*` headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub role: String,
    /// Claim name (without the `X-Hasura-` prefix) -> value
    pub claims: BTreeMap<String, String>,
}

impl CallerIdentity {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            claims: BTreeMap::new(),
        }
    }

    /// Add a claim. `name` may carry the `x-hasura-` prefix or not.
    pub fn claim(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        let name = name.as_ref();
        let bare = match name.get(..HEADER_PREFIX.len()) {
            Some(prefix) if prefix.eq_ignore_ascii_case(HEADER_PREFIX) => {
                &name[HEADER_PREFIX.len()..]
            }
            _ => name,
        };
        self.claims.insert(bare.to_ascii_lowercase(), value.into());
        self
    }

    /// Render the identity as request headers.
    ///
    /// Fails on claim names that cannot be header names, rather than letting
    /// the HTTP client reject the request later.
    pub fn headers(&self) -> Result<Vec<(String, String)>> {
        let mut headers = Vec::with_capacity(self.claims.len() + 1);
        headers.push((format!("{HEADER_PREFIX}Role"), self.role.clone()));
        for (name, value) in &self.claims {
            if !claim_regex().is_match(name) {
                return Err(Error::config(format!("invalid session claim name '{}'", name)));
            }
            headers.push((format!("{HEADER_PREFIX}{}", title_case(name)), value.clone()));
        }
        Ok(headers)
    }
}

fn title_case(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

//! The fixed relationship assertion suite.
//!
//! A [`Suite`] is an ordered list of groups, each an ordered list of cases.
//! Cases see the combination through a [`Testbed`] and never mutate engine
//! state; they only query.

mod execution;
mod permission;
mod schema;

use std::fmt;
use std::sync::Arc;

use relmatrix_core::{Error, Options};
use relmatrix_gateway::{CallerIdentity, GraphqlRequest, response_errors};
use serde_json::Value;

use crate::assert::{AssertionFailure, assert_json_eq};
use crate::engine::EngineHandle;
use crate::fixtures;

/// Why a case failed.
#[derive(Debug)]
pub enum Failure {
    /// The response did not match.
    Assertion(AssertionFailure),
    /// The engine could not be queried at all.
    Engine(Error),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Assertion(failure) => write!(f, "{}", failure),
            Failure::Engine(err) => write!(f, "engine error: {}", err),
        }
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Failure::Assertion(failure) => Some(failure),
            Failure::Engine(err) => Some(err),
        }
    }
}

impl From<AssertionFailure> for Failure {
    fn from(failure: AssertionFailure) -> Self {
        Failure::Assertion(failure)
    }
}

impl From<Error> for Failure {
    fn from(err: Error) -> Self {
        Failure::Engine(err)
    }
}

/// What a case can see of the combination it runs in.
#[derive(Debug)]
pub struct Testbed<'a, L> {
    pub engine: &'a EngineHandle,
    /// Local state of the LHS
    pub local: &'a L,
    /// Merged options of the combination
    pub options: &'a Options,
    /// Combination name
    pub combination: &'a str,
}

impl<L> Testbed<'_, L> {
    /// Run `query` as admin, or as `identity`, and return the raw response.
    pub fn query(&self, query: &str, identity: Option<CallerIdentity>) -> Result<Value, Failure> {
        let mut request = GraphqlRequest::new(query);
        if let Some(identity) = identity {
            request = request.identity(identity);
        }
        tracing::trace!(combination = %self.combination, query = %query, "Running query");
        Ok(self.engine.graphql(&request)?)
    }

    /// Run a query that must succeed and return its `data`.
    pub fn data(&self, query: &str, identity: Option<CallerIdentity>) -> Result<Value, Failure> {
        let response = self.query(query, identity)?;
        if let Some(errors) = response_errors(&response) {
            return Err(AssertionFailure::new(format!(
                "query returned {} error(s): {}",
                errors.len(),
                errors[0]
            ))
            .with_actual(response.clone())
            .into());
        }
        match response.get("data") {
            Some(data) if !data.is_null() => Ok(data.clone()),
            _ => Err(AssertionFailure::new("response has no data")
                .with_actual(response)
                .into()),
        }
    }

    /// Compare under the combination's options.
    pub fn assert_eq(&self, root: &str, expected: &Value, actual: &Value) -> Result<(), Failure> {
        Ok(assert_json_eq(root, expected, actual, self.options)?)
    }
}

type CaseFn<L> = Arc<dyn Fn(&Testbed<'_, L>) -> Result<(), Failure> + Send + Sync>;

/// One named assertion.
pub struct TestCase<L> {
    pub name: String,
    run: CaseFn<L>,
    requires_aggregates: bool,
}

impl<L> Clone for TestCase<L> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            run: Arc::clone(&self.run),
            requires_aggregates: self.requires_aggregates,
        }
    }
}

impl<L> fmt::Debug for TestCase<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("requires_aggregates", &self.requires_aggregates)
            .finish_non_exhaustive()
    }
}

impl<L> TestCase<L> {
    pub fn new(
        name: impl Into<String>,
        run: impl Fn(&Testbed<'_, L>) -> Result<(), Failure> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            run: Arc::new(run),
            requires_aggregates: false,
        }
    }

    /// Only run when the RHS exposes aggregate fields.
    pub fn requires_aggregates(mut self) -> Self {
        self.requires_aggregates = true;
        self
    }

    /// Whether the case applies under `options`.
    pub fn applies(&self, options: &Options) -> bool {
        !self.requires_aggregates || options.has_aggregates()
    }

    pub fn run(&self, bed: &Testbed<'_, L>) -> Result<(), Failure> {
        (self.run)(bed)
    }
}

/// An ordered group of cases.
#[derive(Debug, Clone)]
pub struct TestGroup<L> {
    pub name: String,
    pub cases: Vec<TestCase<L>>,
}

impl<L> TestGroup<L> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cases: Vec::new(),
        }
    }

    pub fn case(mut self, case: TestCase<L>) -> Self {
        self.cases.push(case);
        self
    }
}

/// An ordered list of groups.
#[derive(Debug, Clone)]
pub struct Suite<L> {
    pub groups: Vec<TestGroup<L>>,
}

impl<L> Default for Suite<L> {
    fn default() -> Self {
        Self { groups: Vec::new() }
    }
}

impl<L> Suite<L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(mut self, group: TestGroup<L>) -> Self {
        self.groups.push(group);
        self
    }

    /// `(group, case)` pairs in execution order.
    pub fn cases(&self) -> impl Iterator<Item = (&TestGroup<L>, &TestCase<L>)> {
        self.groups
            .iter()
            .flat_map(|group| group.cases.iter().map(move |case| (group, case)))
    }

    pub fn case_count(&self) -> usize {
        self.groups.iter().map(|g| g.cases.len()).sum()
    }
}

/// The schema, execution and permission groups, in that order.
pub fn relationship_suite<L: 'static>() -> Suite<L> {
    Suite::new()
        .group(schema::group())
        .group(execution::group())
        .group(permission::group())
}

/// Titles of `artist_id`'s albums, ordered by album id.
pub(crate) fn album_titles(artist_id: i64) -> Vec<String> {
    let album = fixtures::album_table();
    let (Some(id), Some(title), Some(artist)) = (
        album.column_index("id"),
        album.column_index("title"),
        album.column_index("artist_id"),
    ) else {
        return Vec::new();
    };
    let mut rows: Vec<(i64, String)> = album
        .rows
        .iter()
        .filter(|row| row[artist].as_i64() == Some(artist_id))
        .filter_map(|row| Some((row[id].as_i64()?, row[title].as_str()?.to_string())))
        .collect();
    rows.sort();
    rows.into_iter().map(|(_, title)| title).collect()
}

/// `[{"title": ..}, ..]` for `artist_id`, cut at `limit`.
pub(crate) fn title_objects(artist_id: i64, limit: Option<u64>) -> Value {
    let titles = album_titles(artist_id);
    let take = limit.map_or(titles.len(), |l| usize::try_from(l).unwrap_or(usize::MAX));
    Value::Array(
        titles
            .into_iter()
            .take(take)
            .map(|title| serde_json::json!({ "title": title }))
            .collect(),
    )
}

/// Identity of role1 with its artist claim.
pub(crate) fn filtered_caller(artist_id: i64) -> CallerIdentity {
    CallerIdentity::new(fixtures::ROLE_FILTERED)
        .claim(fixtures::ARTIST_ID_CLAIM, artist_id.to_string())
}

pub(crate) fn limited_caller() -> CallerIdentity {
    CallerIdentity::new(fixtures::ROLE_LIMITED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suite_shape() {
        let suite = relationship_suite::<()>();
        let groups: Vec<&str> = suite.groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(groups, vec!["schema", "execution", "permission"]);
        assert_eq!(suite.case_count(), suite.cases().count());

        let aggregate_cases = suite
            .cases()
            .filter(|(_, case)| !case.applies(&Options::default().supports_aggregates(false)))
            .count();
        assert!(aggregate_cases > 0);
        assert!(suite.cases().all(|(_, case)| case.applies(&Options::default())));
    }

    #[test]
    fn album_titles_follow_fixture() {
        assert_eq!(album_titles(1), vec!["album1_artist1", "album2_artist1"]);
        assert_eq!(album_titles(2), vec!["album3_artist2"]);
        assert!(album_titles(3).is_empty());
        assert_eq!(
            title_objects(1, Some(1)),
            serde_json::json!([{ "title": "album1_artist1" }])
        );
    }

    #[test]
    fn failure_display() {
        let failure: Failure = AssertionFailure::new("albums differ").into();
        assert_eq!(failure.to_string(), "albums differ");
        let failure: Failure = Error::Custom("connection reset".into()).into();
        assert_eq!(failure.to_string(), "engine error: connection reset");
    }
}

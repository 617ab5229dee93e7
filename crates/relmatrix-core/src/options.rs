//! Engine-specific execution hints carried by every context.
//!
//! Options from an LHS and an RHS context are merged when the two are
//! combined. Merging never drops a flag set by either side: two different
//! values for the same flag are a [`OptionsConflict`], reported when the test
//! matrix is built rather than while it runs.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Execution hints for a context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    /// The engine renders numeric scalars as strings.
    pub stringify_numbers: Option<bool>,
    /// Whether the backend exposes aggregate companion fields.
    pub supports_aggregates: Option<bool>,
    /// Response keys whose array values are compared without regard to order.
    pub unordered_fields: BTreeSet<String>,
}

/// Two contexts disagree on the value of one flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionsConflict {
    /// Name of the conflicting flag.
    pub flag: &'static str,
    pub left: bool,
    pub right: bool,
    /// Label of the combination being built, once known.
    pub context: Option<String>,
}

impl fmt::Display for OptionsConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(f, "{}: ", context)?;
        }
        write!(
            f,
            "'{}' is {} on one side and {} on the other",
            self.flag, self.left, self.right
        )
    }
}

impl std::error::Error for OptionsConflict {}

fn check_flag(flag: &'static str, left: Option<bool>, right: Option<bool>) -> Option<OptionsConflict> {
    match (left, right) {
        (Some(l), Some(r)) if l != r => Some(OptionsConflict {
            flag,
            left: l,
            right: r,
            context: None,
        }),
        _ => None,
    }
}

impl Options {
    /// Set `stringify_numbers`.
    pub fn stringify_numbers(mut self, enabled: bool) -> Self {
        self.stringify_numbers = Some(enabled);
        self
    }

    /// Set `supports_aggregates`.
    pub fn supports_aggregates(mut self, enabled: bool) -> Self {
        self.supports_aggregates = Some(enabled);
        self
    }

    /// Compare arrays under this response key as multisets.
    pub fn unordered_field(mut self, field: impl Into<String>) -> Self {
        self.unordered_fields.insert(field.into());
        self
    }

    /// Effective value of `stringify_numbers` (unset means off).
    pub fn stringifies_numbers(&self) -> bool {
        self.stringify_numbers.unwrap_or(false)
    }

    /// Effective value of `supports_aggregates` (unset means on).
    pub fn has_aggregates(&self) -> bool {
        self.supports_aggregates.unwrap_or(true)
    }

    /// Merge two option sets.
    ///
    /// Flags set on only one side are kept, equal flags are kept once, sets
    /// are unioned. Every conflicting flag is reported.
    pub fn merge(&self, other: &Options) -> Result<Options, Vec<OptionsConflict>> {
        let conflicts = self.conflicts(other);
        if !conflicts.is_empty() {
            return Err(conflicts);
        }
        Ok(Options {
            stringify_numbers: self.stringify_numbers.or(other.stringify_numbers),
            supports_aggregates: self.supports_aggregates.or(other.supports_aggregates),
            unordered_fields: self
                .unordered_fields
                .union(&other.unordered_fields)
                .cloned()
                .collect(),
        })
    }

    /// Every flag on which the two option sets disagree.
    pub fn conflicts(&self, other: &Options) -> Vec<OptionsConflict> {
        [
            check_flag(
                "stringify_numbers",
                self.stringify_numbers,
                other.stringify_numbers,
            ),
            check_flag(
                "supports_aggregates",
                self.supports_aggregates,
                other.supports_aggregates,
            ),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

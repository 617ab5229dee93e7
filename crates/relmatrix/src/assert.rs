//! JSON assertions with path-addressed diffs.
//!
//! Comparison honours the merged [`Options`]: with `stringify_numbers` a
//! number equals its string rendering, and arrays stored under a key listed in
//! `unordered_fields` are compared as multisets.

use std::fmt;

use relmatrix_core::Options;
use serde_json::Value;

/// A failed expectation.
#[derive(Debug, Clone, PartialEq)]
pub struct AssertionFailure {
    pub message: String,
    pub expected: Option<Value>,
    pub actual: Option<Value>,
    /// One line per difference, e.g. `$.data.hasura_artist[0].albums: expected [], found null`
    pub diff: Vec<String>,
}

impl AssertionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            expected: None,
            actual: None,
            diff: Vec::new(),
        }
    }

    pub fn with_actual(mut self, actual: Value) -> Self {
        self.actual = Some(actual);
        self
    }
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        for line in &self.diff {
            write!(f, "\n  {}", line)?;
        }
        if self.diff.is_empty() {
            if let Some(expected) = &self.expected {
                write!(f, "\n  expected: {}", expected)?;
            }
            if let Some(actual) = &self.actual {
                write!(f, "\n  actual: {}", actual)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for AssertionFailure {}

fn scalar_eq(expected: &Value, actual: &Value, stringify: bool) -> bool {
    if expected == actual {
        return true;
    }
    if !stringify {
        return false;
    }
    match (expected, actual) {
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            n.to_string() == *s
        }
        _ => false,
    }
}

struct Differ<'a> {
    options: &'a Options,
    diff: Vec<String>,
}

impl Differ<'_> {
    fn values_eq(&self, expected: &Value, actual: &Value, field: Option<&str>) -> bool {
        let mut probe = Differ {
            options: self.options,
            diff: Vec::new(),
        };
        probe.walk("$", field, expected, actual);
        probe.diff.is_empty()
    }

    fn walk(&mut self, path: &str, field: Option<&str>, expected: &Value, actual: &Value) {
        match (expected, actual) {
            (Value::Object(e), Value::Object(a)) => {
                for (key, e_value) in e {
                    let child = format!("{}.{}", path, key);
                    match a.get(key) {
                        Some(a_value) => self.walk(&child, Some(key), e_value, a_value),
                        None => self
                            .diff
                            .push(format!("{}: expected {}, found nothing", child, e_value)),
                    }
                }
                for (key, a_value) in a {
                    if !e.contains_key(key) {
                        self.diff
                            .push(format!("{}.{}: unexpected {}", path, key, a_value));
                    }
                }
            }
            (Value::Array(e), Value::Array(a))
                if field.is_some_and(|f| self.options.unordered_fields.contains(f)) =>
            {
                self.walk_unordered(path, field, e, a);
            }
            (Value::Array(e), Value::Array(a)) => {
                if e.len() != a.len() {
                    self.diff.push(format!(
                        "{}: expected {} element(s), found {}",
                        path,
                        e.len(),
                        a.len()
                    ));
                }
                for (i, (e_item, a_item)) in e.iter().zip(a).enumerate() {
                    self.walk(&format!("{}[{}]", path, i), field, e_item, a_item);
                }
            }
            _ => {
                if !scalar_eq(expected, actual, self.options.stringifies_numbers()) {
                    self.diff
                        .push(format!("{}: expected {}, found {}", path, expected, actual));
                }
            }
        }
    }

    fn walk_unordered(&mut self, path: &str, field: Option<&str>, expected: &[Value], actual: &[Value]) {
        let mut unmatched: Vec<&Value> = actual.iter().collect();
        for e_item in expected {
            match unmatched
                .iter()
                .position(|a_item| self.values_eq(e_item, a_item, field))
            {
                Some(i) => {
                    unmatched.swap_remove(i);
                }
                None => self
                    .diff
                    .push(format!("{}: expected element {} not found", path, e_item)),
            }
        }
        for a_item in unmatched {
            self.diff
                .push(format!("{}: unexpected element {}", path, a_item));
        }
    }
}

/// Every difference between `expected` and `actual`, rooted at `root`.
pub fn json_diff(root: &str, expected: &Value, actual: &Value, options: &Options) -> Vec<String> {
    let mut differ = Differ {
        options,
        diff: Vec::new(),
    };
    let field = root.rsplit('.').next().filter(|f| *f != "$");
    differ.walk(root, field, expected, actual);
    differ.diff
}

/// Fail unless `actual` matches `expected` under `options`.
pub fn assert_json_eq(
    root: &str,
    expected: &Value,
    actual: &Value,
    options: &Options,
) -> Result<(), AssertionFailure> {
    let diff = json_diff(root, expected, actual, options);
    if diff.is_empty() {
        return Ok(());
    }
    Err(AssertionFailure {
        message: format!("{} does not match", root),
        expected: Some(expected.clone()),
        actual: Some(actual.clone()),
        diff,
    })
}

/// Fail with `message` unless `condition` holds.
pub fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), AssertionFailure> {
    if condition {
        Ok(())
    } else {
        Err(AssertionFailure::new(message()))
    }
}

/// The element of the array `list` whose `key` equals `value`.
pub fn find_by<'v>(list: &'v Value, key: &str, value: &str) -> Result<&'v Value, AssertionFailure> {
    let items = list.as_array().ok_or_else(|| {
        AssertionFailure::new(format!("expected a list to search for {} = {}", key, value))
            .with_actual(list.clone())
    })?;
    items
        .iter()
        .find(|item| item.get(key).and_then(Value::as_str) == Some(value))
        .ok_or_else(|| {
            AssertionFailure::new(format!("no element with {} = {}", key, value))
                .with_actual(list.clone())
        })
}

/// The value stored under `key`; an explicit `null` is returned as such, a
/// missing key is a failure at `path`.
pub fn field<'v>(object: &'v Value, key: &str, path: &str) -> Result<&'v Value, AssertionFailure> {
    object.get(key).ok_or_else(|| {
        AssertionFailure::new(format!("{}: field absent", path)).with_actual(object.clone())
    })
}

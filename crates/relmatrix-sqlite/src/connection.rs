//! SQLite connection used to provision fixture tables.
//!
//! The engine's SQLite connector reads the same database files this
//! connection writes, so provisioning happens in-process rather than through
//! a `run_sql` call.

use std::ffi::{CStr, CString, c_char, c_int};
use std::path::Path;
use std::ptr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use relmatrix_core::{BackendError, BackendErrorKind, Error, Result, Value};

use crate::ffi;

/// Configuration for opening a SQLite connection.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Database file path or `:memory:`
    pub path: String,
    /// Busy timeout in milliseconds
    pub busy_timeout_ms: u32,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            busy_timeout_ms: 5000,
        }
    }
}

impl SqliteConfig {
    /// Create a new config for a file-based database.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Create a new config for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }
}

struct SqliteInner {
    db: *mut ffi::sqlite3,
}

// SAFETY: the handle is only touched while holding the Mutex.
unsafe impl Send for SqliteInner {}

/// A connection to a SQLite database file.
pub struct SqliteConnection {
    inner: Mutex<SqliteInner>,
    path: String,
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn error_code_to_kind(rc: c_int) -> BackendErrorKind {
    match rc & 0xff {
        ffi::SQLITE_CONSTRAINT => BackendErrorKind::Constraint,
        ffi::SQLITE_CANTOPEN => BackendErrorKind::Connect,
        ffi::SQLITE_ERROR => BackendErrorKind::Syntax,
        _ => BackendErrorKind::Database,
    }
}

fn backend_error(kind: BackendErrorKind, sql: Option<&str>, message: impl Into<String>) -> Error {
    Error::Backend(BackendError {
        kind,
        sql: sql.map(str::to_string),
        message: message.into(),
    })
}

/// Read the last error message off a handle.
///
/// # Safety
///
/// `db` must be a valid open handle.
unsafe fn last_error(db: *mut ffi::sqlite3) -> String {
    // SAFETY: caller guarantees db is valid; errmsg is never null for a valid handle
    unsafe { CStr::from_ptr(ffi::sqlite3_errmsg(db)) }
        .to_string_lossy()
        .into_owned()
}

impl SqliteConnection {
    /// Open a new SQLite connection with the given configuration.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let c_path = CString::new(config.path.as_str()).map_err(|_| {
            backend_error(
                BackendErrorKind::Connect,
                None,
                "Invalid path: contains null byte",
            )
        })?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();

        let flags = ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        // SAFETY: We pass valid pointers and check the return value
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };

        if rc != ffi::SQLITE_OK {
            let msg = if db.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: db is a handle returned by open_v2, closed right after
                unsafe {
                    let msg = last_error(db);
                    ffi::sqlite3_close_v2(db);
                    msg
                }
            };
            return Err(backend_error(
                BackendErrorKind::Connect,
                None,
                format!("Failed to open database {}: {}", config.path, msg),
            ));
        }

        if config.busy_timeout_ms > 0 {
            // SAFETY: db is valid
            unsafe {
                ffi::sqlite3_busy_timeout(
                    db,
                    c_int::try_from(config.busy_timeout_ms).unwrap_or(c_int::MAX),
                );
            }
        }

        tracing::debug!(path = %config.path, sqlite = ffi::version(), "Opened SQLite database");

        Ok(Self {
            inner: Mutex::new(SqliteInner { db }),
            path: config.path.clone(),
        })
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::open(&SqliteConfig::memory())
    }

    /// Open (creating if needed) a file-based database.
    pub fn open_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(&SqliteConfig::file(path.as_ref().to_string_lossy()))
    }

    /// Get the database path.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, SqliteInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Execute one or more SQL statements without returning rows.
    pub fn execute_raw(&self, sql: &str) -> Result<()> {
        tracing::trace!(path = %self.path, sql = %sql, "Executing SQLite statement");

        let inner = self.lock();
        let c_sql = CString::new(sql).map_err(|_| {
            backend_error(
                BackendErrorKind::Syntax,
                Some(sql),
                "SQL contains null byte",
            )
        })?;

        let mut errmsg: *mut c_char = ptr::null_mut();

        // SAFETY: All pointers are valid
        let rc = unsafe {
            ffi::sqlite3_exec(inner.db, c_sql.as_ptr(), None, ptr::null_mut(), &mut errmsg)
        };

        if rc != ffi::SQLITE_OK {
            let msg = if errmsg.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: errmsg was allocated by sqlite3_exec and is freed once
                unsafe {
                    let msg = CStr::from_ptr(errmsg).to_string_lossy().into_owned();
                    ffi::sqlite3_free(errmsg.cast());
                    msg
                }
            };
            let kind = if msg.starts_with("no such table") {
                BackendErrorKind::NotFound
            } else {
                error_code_to_kind(rc)
            };
            return Err(backend_error(kind, Some(sql), msg));
        }

        Ok(())
    }

    /// Run a query and collect every row as fixture values.
    ///
    /// SQLite's storage classes map onto `Int`/`BigInt`, `Double`, `Text` and
    /// `Null`; blobs are not supported.
    pub fn query_rows(&self, sql: &str) -> Result<Vec<Vec<Value>>> {
        let inner = self.lock();
        let c_sql = CString::new(sql).map_err(|_| {
            backend_error(
                BackendErrorKind::Syntax,
                Some(sql),
                "SQL contains null byte",
            )
        })?;

        let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();
        // SAFETY: db is valid, c_sql is NUL-terminated
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(inner.db, c_sql.as_ptr(), -1, &mut stmt, ptr::null_mut())
        };
        if rc != ffi::SQLITE_OK || stmt.is_null() {
            // SAFETY: db is valid
            let msg = unsafe { last_error(inner.db) };
            return Err(backend_error(error_code_to_kind(rc), Some(sql), msg));
        }

        // SAFETY: stmt is a prepared statement
        let col_count = unsafe { ffi::sqlite3_column_count(stmt) };
        let mut rows = Vec::new();
        let outcome = loop {
            // SAFETY: stmt is valid
            let rc = unsafe { ffi::sqlite3_step(stmt) };
            match rc {
                ffi::SQLITE_ROW => {
                    let row = (0..col_count)
                        // SAFETY: stmt is positioned on a row, i < column count
                        .map(|i| unsafe { read_column(stmt, i) })
                        .collect();
                    rows.push(row);
                }
                ffi::SQLITE_DONE => break Ok(()),
                _ => {
                    // SAFETY: db is valid
                    let msg = unsafe { last_error(inner.db) };
                    break Err(backend_error(error_code_to_kind(rc), Some(sql), msg));
                }
            }
        };

        // SAFETY: stmt is valid and finalized exactly once
        unsafe { ffi::sqlite3_finalize(stmt) };

        outcome.map(|()| rows)
    }

    /// Does a table with this name exist?
    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let sql = format!(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = '{}'",
            name.replace('\'', "''")
        );
        let rows = self.query_rows(&sql)?;
        Ok(rows
            .first()
            .and_then(|row| row.first())
            .and_then(Value::as_i64)
            .is_some_and(|n| n > 0))
    }
}

/// Read one column of the current row.
///
/// # Safety
///
/// `stmt` must be positioned on a row and `index` must be below the column count.
unsafe fn read_column(stmt: *mut ffi::sqlite3_stmt, index: c_int) -> Value {
    // SAFETY: guaranteed by the caller
    unsafe {
        match ffi::sqlite3_column_type(stmt, index) {
            ffi::SQLITE_INTEGER => {
                let v = ffi::sqlite3_column_int64(stmt, index);
                i32::try_from(v).map_or(Value::BigInt(v), Value::Int)
            }
            ffi::SQLITE_FLOAT => Value::Double(ffi::sqlite3_column_double(stmt, index)),
            ffi::SQLITE_TEXT => {
                let text = ffi::sqlite3_column_text(stmt, index);
                if text.is_null() {
                    Value::Null
                } else {
                    Value::Text(
                        CStr::from_ptr(text)
                            .to_string_lossy()
                            .into_owned(),
                    )
                }
            }
            ffi::SQLITE_NULL => Value::Null,
            _ => Value::Null,
        }
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        let inner = self.lock();
        if !inner.db.is_null() {
            // SAFETY: db is valid and closed exactly once
            unsafe {
                ffi::sqlite3_close_v2(inner.db);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_and_query() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE t (id INTEGER, name TEXT, score REAL)")
            .unwrap();
        conn.execute_raw("INSERT INTO t VALUES (1, 'a', 1.5), (NULL, 'b', NULL)")
            .unwrap();

        let rows = conn.query_rows("SELECT id, name, score FROM t ORDER BY name").unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Value::Int(1), Value::Text("a".into()), Value::Double(1.5)],
                vec![Value::Null, Value::Text("b".into()), Value::Null],
            ]
        );
        assert!(conn.table_exists("t").unwrap());
        assert!(!conn.table_exists("missing").unwrap());
    }

    #[test]
    fn test_syntax_error_carries_sql() {
        let conn = SqliteConnection::open_memory().unwrap();
        let err = conn.execute_raw("CREAT TABLE t (id INTEGER)").unwrap_err();
        assert_eq!(err.sql(), Some("CREAT TABLE t (id INTEGER)"));
        match err {
            Error::Backend(e) => assert_eq!(e.kind, BackendErrorKind::Syntax),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_constraint_violation() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE t (id INTEGER PRIMARY KEY NOT NULL)")
            .unwrap();
        conn.execute_raw("INSERT INTO t VALUES (1)").unwrap();
        match conn.execute_raw("INSERT INTO t VALUES (1)").unwrap_err() {
            Error::Backend(e) => assert_eq!(e.kind, BackendErrorKind::Constraint),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_big_integers_widen() {
        let conn = SqliteConnection::open_memory().unwrap();
        let rows = conn.query_rows("SELECT 5000000000").unwrap();
        assert_eq!(rows[0][0], Value::BigInt(5_000_000_000));
    }

    #[test]
    fn test_open_invalid_path() {
        let err = SqliteConnection::open_file("/nonexistent-dir/sub/db.sqlite").unwrap_err();
        assert!(err.to_string().contains("Failed to open database"), "{err}");
    }
}

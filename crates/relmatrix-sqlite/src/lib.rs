//! SQLite connection for the relmatrix SQLite backend provider.
//!
// FFI bindings require unsafe code
#![allow(unsafe_code)]
//!
//! A thin, synchronous wrapper over `libsqlite3-sys` that can run DDL/DML
//! scripts and read rows back as [`relmatrix_core::Value`]s.
//!
//! # Example
//!
//! ```rust,ignore
//! use relmatrix_sqlite::SqliteConnection;
//!
//! let conn = SqliteConnection::open_file("target.db")?;
//! conn.execute_raw("CREATE TABLE album (id INTEGER NOT NULL, title TEXT NOT NULL)")?;
//! let rows = conn.query_rows("SELECT id, title FROM album")?;
//! ```

pub mod connection;
pub mod ffi;

pub use connection::{SqliteConfig, SqliteConnection};

/// Re-export the SQLite library version.
pub fn sqlite_version() -> &'static str {
    ffi::version()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_version() {
        let version = sqlite_version();
        assert!(
            version.starts_with('3'),
            "Expected SQLite 3.x, got {}",
            version
        );
    }
}

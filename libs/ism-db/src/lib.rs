//! Portable control-database access (spec §4.1, C1).
//!
//! Two backends are bound behind one [`DataAccess`] contract: an embedded single-file
//! store (sqlite) and a networked relational store (mysql). Every call opens and closes
//! its own connection ("connection-per-operation", spec §5/§9) rather than holding a
//! long-lived session.

mod mysql;
mod placeholder;
mod sqlite;

pub use mysql::MySqlDataAccess;
pub use placeholder::{prepare_parameterised_statement, to_driver_markers, MarkerStyle};
pub use sqlite::SqliteDataAccess;

use async_trait::async_trait;
use ism_errors::Result;
use std::path::PathBuf;

/// Which relational backend a [`DataAccess`] binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbEngine {
    Sqlite,
    MySql,
}

/// A single cell value in a control-database row. Deliberately small: the control
/// schema only ever stores text, integers, and booleans (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

/// One result row: an ordered, positional list of cells.
pub type Row = Vec<Value>;

/// Backend-specific connection parameters. Mirrors the split the spec draws between
/// the embedded file backend and the networked backend (spec §4.1).
#[derive(Debug, Clone)]
pub enum BackendConfig {
    Sqlite {
        /// Full path to the database file, e.g. `<run_dir>/database/<db_name>`.
        path: PathBuf,
    },
    MySql {
        host: String,
        user: String,
        password: String,
        /// The run database name, `<db_name>_<tag>_<timestamp>`.
        run_db: String,
    },
}

/// Whether SQL faults propagate or are swallowed-and-logged (spec §4.1, §9).
#[derive(Debug, Clone, Copy)]
pub struct ConnectOpts {
    pub raise_on_sql_error: bool,
}

impl Default for ConnectOpts {
    fn default() -> Self {
        Self {
            raise_on_sql_error: false,
        }
    }
}

/// Portable CRUD contract against the control database (spec §4.1, C1).
#[async_trait]
pub trait DataAccess: Send + Sync {
    /// Materialises the control database: creates the file/dir (embedded) or issues
    /// `CREATE DATABASE <name>` (networked).
    async fn create_database(&self) -> Result<()>;

    /// Read-only query. Parameter count must match the statement's placeholders.
    async fn execute_query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Write statement; auto-commits.
    async fn execute_statement(&self, sql: &str, params: &[Value]) -> Result<()>;

    /// Normalises `sql`'s placeholder markers to this backend's native contract style.
    fn prepare_parameterised_statement(&self, sql: &str) -> Result<String>;

    /// Releases any held connection. A no-op for connection-per-operation backends that
    /// hold nothing between calls; kept for contract symmetry and for backends that do
    /// pool.
    async fn close(&self) -> Result<()>;

    fn engine(&self) -> DbEngine;
}

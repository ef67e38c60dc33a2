use crate::placeholder::{prepare_parameterised_statement, to_driver_markers, MarkerStyle};
use crate::{ConnectOpts, DataAccess, DbEngine, Row, Value};
use async_trait::async_trait;
use ism_errors::{IsmError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Column, ConnectOptions, Row as SqlxRow};
use std::path::PathBuf;
use std::str::FromStr;

/// Embedded single-file backend. Opens a fresh connection per operation; database
/// creation is implicit on first open (spec §4.1).
pub struct SqliteDataAccess {
    path: PathBuf,
    opts: ConnectOpts,
}

impl SqliteDataAccess {
    pub fn new(path: PathBuf, opts: ConnectOpts) -> Self {
        Self { path, opts }
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        SqliteConnectOptions::from_str(&format!("sqlite://{}", self.path.display()))
            .expect("sqlite path is always a valid DSN")
            .create_if_missing(true)
    }

    async fn connect(&self) -> Result<sqlx::SqliteConnection> {
        self.connect_options()
            .connect()
            .await
            .map_err(|e| IsmError::Database(e.to_string()))
    }

    fn bind<'q>(
        mut query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
        params: &'q [Value],
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        for p in params {
            query = match p {
                Value::Null => query.bind(None::<String>),
                Value::Bool(b) => query.bind(*b),
                Value::Int(i) => query.bind(*i),
                Value::Text(s) => query.bind(s.as_str()),
            };
        }
        query
    }

    fn row_to_values(row: &SqliteRow) -> Row {
        let mut out = Vec::with_capacity(row.columns().len());
        for i in 0..row.columns().len() {
            if let Ok(v) = row.try_get::<i64, _>(i) {
                out.push(Value::Int(v));
                continue;
            }
            if let Ok(v) = row.try_get::<bool, _>(i) {
                out.push(Value::Bool(v));
                continue;
            }
            if let Ok(v) = row.try_get::<String, _>(i) {
                out.push(Value::Text(v));
                continue;
            }
            out.push(Value::Null);
        }
        out
    }
}

#[async_trait]
impl DataAccess for SqliteDataAccess {
    async fn create_database(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        // Opening with create_if_missing materialises the file; close immediately.
        let mut conn = self.connect().await?;
        use sqlx::Connection;
        conn.close()
            .await
            .map_err(|e| IsmError::Database(e.to_string()))?;
        Ok(())
    }

    async fn execute_query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let driver_sql = to_driver_markers(sql);
        let mut conn = match self.connect().await {
            Ok(c) => c,
            Err(e) if !self.opts.raise_on_sql_error => {
                tracing::error!(error = %e, "sqlite connect failed, swallowing");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        let query = Self::bind(sqlx::query(&driver_sql), params);
        match query.fetch_all(&mut conn).await {
            Ok(rows) => Ok(rows.iter().map(Self::row_to_values).collect()),
            Err(e) if !self.opts.raise_on_sql_error => {
                tracing::error!(error = %e, sql = %driver_sql, "sqlite query failed, swallowing");
                Ok(Vec::new())
            }
            Err(e) => Err(IsmError::Database(e.to_string())),
        }
    }

    async fn execute_statement(&self, sql: &str, params: &[Value]) -> Result<()> {
        let driver_sql = to_driver_markers(sql);
        let mut conn = match self.connect().await {
            Ok(c) => c,
            Err(e) if !self.opts.raise_on_sql_error => {
                tracing::error!(error = %e, "sqlite connect failed, swallowing");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let query = Self::bind(sqlx::query(&driver_sql), params);
        match query.execute(&mut conn).await {
            Ok(_) => Ok(()),
            Err(e) if !self.opts.raise_on_sql_error => {
                tracing::error!(error = %e, sql = %driver_sql, "sqlite statement failed, swallowing");
                Ok(())
            }
            Err(e) => Err(IsmError::Database(e.to_string())),
        }
    }

    fn prepare_parameterised_statement(&self, sql: &str) -> Result<String> {
        prepare_parameterised_statement(sql, MarkerStyle::QMark)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn engine(&self) -> DbEngine {
        DbEngine::Sqlite
    }
}

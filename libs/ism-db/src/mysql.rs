use crate::placeholder::{prepare_parameterised_statement, to_driver_markers, MarkerStyle};
use crate::{ConnectOpts, DataAccess, DbEngine, Row, Value};
use async_trait::async_trait;
use ism_errors::{IsmError, Result};
use sqlx::mysql::{MySqlConnectOptions, MySqlRow};
use sqlx::{Column, ConnectOptions, Row as SqlxRow};

/// Networked backend. DDL connects with `(host, user, password)` only; CRUD connects
/// with `database=<run_db>` selected (spec §4.1). Each call opens and closes its own
/// connection.
pub struct MySqlDataAccess {
    host: String,
    user: String,
    password: String,
    run_db: String,
    opts: ConnectOpts,
}

impl MySqlDataAccess {
    pub fn new(host: String, user: String, password: String, run_db: String, opts: ConnectOpts) -> Self {
        Self {
            host,
            user,
            password,
            run_db,
            opts,
        }
    }

    fn admin_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .username(&self.user)
            .password(&self.password)
    }

    fn db_options(&self) -> MySqlConnectOptions {
        self.admin_options().database(&self.run_db)
    }

    async fn connect_db(&self) -> Result<sqlx::MySqlConnection> {
        self.db_options()
            .connect()
            .await
            .map_err(|e| IsmError::Database(e.to_string()))
    }

    fn bind<'q>(
        mut query: sqlx::query::Query<'q, sqlx::MySql, sqlx::mysql::MySqlArguments>,
        params: &'q [Value],
    ) -> sqlx::query::Query<'q, sqlx::MySql, sqlx::mysql::MySqlArguments> {
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

    fn row_to_values(row: &MySqlRow) -> Row {
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
impl DataAccess for MySqlDataAccess {
    async fn create_database(&self) -> Result<()> {
        let mut conn = self
            .admin_options()
            .connect()
            .await
            .map_err(|e| IsmError::Database(e.to_string()))?;
        let ddl = format!("CREATE DATABASE IF NOT EXISTS `{}`", self.run_db);
        sqlx::query(&ddl)
            .execute(&mut conn)
            .await
            .map_err(|e| IsmError::Database(e.to_string()))?;
        Ok(())
    }

    async fn execute_query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let driver_sql = to_driver_markers(sql);
        let mut conn = match self.connect_db().await {
            Ok(c) => c,
            Err(e) if !self.opts.raise_on_sql_error => {
                tracing::error!(error = %e, "mysql connect failed, swallowing");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        let query = Self::bind(sqlx::query(&driver_sql), params);
        match query.fetch_all(&mut conn).await {
            Ok(rows) => Ok(rows.iter().map(Self::row_to_values).collect()),
            Err(e) if !self.opts.raise_on_sql_error => {
                tracing::error!(error = %e, sql = %driver_sql, "mysql query failed, swallowing");
                Ok(Vec::new())
            }
            Err(e) => Err(IsmError::Database(e.to_string())),
        }
    }

    async fn execute_statement(&self, sql: &str, params: &[Value]) -> Result<()> {
        let driver_sql = to_driver_markers(sql);
        let mut conn = match self.connect_db().await {
            Ok(c) => c,
            Err(e) if !self.opts.raise_on_sql_error => {
                tracing::error!(error = %e, "mysql connect failed, swallowing");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let query = Self::bind(sqlx::query(&driver_sql), params);
        match query.execute(&mut conn).await {
            Ok(_) => Ok(()),
            Err(e) if !self.opts.raise_on_sql_error => {
                tracing::error!(error = %e, sql = %driver_sql, "mysql statement failed, swallowing");
                Ok(())
            }
            Err(e) => Err(IsmError::Database(e.to_string())),
        }
    }

    fn prepare_parameterised_statement(&self, sql: &str) -> Result<String> {
        prepare_parameterised_statement(sql, MarkerStyle::PyFormat)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn engine(&self) -> DbEngine {
        DbEngine::MySql
    }
}

// SPDX-License-Identifier: Apache-2.0

//! PostgreSQL remote client
//!
//! Each prepared insert checks a dedicated connection out of the pool and
//! keeps it until the statement is released. Multi-row writes run inside one
//! transaction on that connection, so a batch lands entirely or not at all.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use fedbridge_core::{ExecutionOutcome, RemoteClient, RemoteError, Row, SqlDialect, Value};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgArguments, PgConnection, PgPool, PgPoolOptions, Postgres};
use sqlx::{Either, Executor, Statement, TypeInfo};
use tracing::{debug, info};

use crate::observability::Sensitive;

const DEFAULT_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Connection settings. The URL carries credentials and never shows up in logs.
#[derive(Debug, Clone, Deserialize)]
pub struct PgRemoteConfig {
    pub url: Sensitive<String>,
    pub max_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
}

impl PgRemoteConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Sensitive::new(url.into()),
            max_connections: None,
            acquire_timeout_secs: None,
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = Some(max_connections);
        self
    }
}

/// An insert prepared on a checked-out connection.
pub struct PreparedInsert {
    conn: PoolConnection<Postgres>,
    sql: String,
    /// Postgres type names of the parameters, used to type NULL binds
    param_types: Vec<String>,
}

impl PreparedInsert {
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

pub struct PgRemoteClient {
    pool: PgPool,
}

impl PgRemoteClient {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &PgRemoteConfig) -> Result<Self, RemoteError> {
        let max_connections = config.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS);
        let acquire_timeout = config.acquire_timeout_secs.unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_SECS);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(acquire_timeout))
            .connect(config.url.expose())
            .await
            .map_err(remote_error)?;

        info!(max_connections, url = %config.url, "PostgreSQL remote connected");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RemoteClient for PgRemoteClient {
    type Statement = PreparedInsert;

    fn dialect(&self) -> SqlDialect {
        SqlDialect::Postgres
    }

    async fn prepare(&self, query: &str) -> Result<PreparedInsert, RemoteError> {
        let mut conn = self.pool.acquire().await.map_err(remote_error)?;

        // Server-side prepare surfaces a missing table or column up front.
        let param_types = {
            let statement = (&mut *conn).prepare(query).await.map_err(remote_error)?;
            match statement.parameters() {
                Some(Either::Left(types)) => types.iter().map(|t| t.name().to_string()).collect(),
                _ => Vec::new(),
            }
        };
        debug!(params = param_types.len(), "Insert prepared");

        Ok(PreparedInsert {
            conn,
            sql: query.to_string(),
            param_types,
        })
    }

    async fn execute(&self, statement: &mut PreparedInsert, rows: &[Row]) -> Result<ExecutionOutcome, RemoteError> {
        let PreparedInsert { conn, sql, param_types } = statement;

        if let [row] = rows {
            let affected = insert_row(conn, sql, param_types, row).await?;
            return Ok(ExecutionOutcome::affected(affected));
        }

        sqlx::query("BEGIN")
            .execute(&mut **conn)
            .await
            .map_err(remote_error)?;

        let mut affected = 0;
        for (index, row) in rows.iter().enumerate() {
            match insert_row(conn, sql, param_types, row).await {
                Ok(n) => affected += n,
                Err(e) => {
                    if let Err(rollback) = sqlx::query("ROLLBACK").execute(&mut **conn).await {
                        debug!(error = %rollback, "Rollback after failed batch row failed");
                    }
                    return Err(RemoteError {
                        message: format!("row {index} of batch: {}", e.message),
                        code: e.code,
                    });
                }
            }
        }

        sqlx::query("COMMIT")
            .execute(&mut **conn)
            .await
            .map_err(remote_error)?;
        Ok(ExecutionOutcome::affected(affected))
    }

    async fn release(&self, statement: PreparedInsert) {
        // Dropping the connection returns it to the pool.
        drop(statement);
    }
}

async fn insert_row(
    conn: &mut PgConnection,
    sql: &str,
    param_types: &[String],
    row: &Row,
) -> Result<u64, RemoteError> {
    let mut query = sqlx::query(sql);
    for (index, value) in row.values.iter().enumerate() {
        let param_type = param_types.get(index).map(String::as_str).unwrap_or("");
        query = bind_param(query, value, param_type);
    }
    let result = query.execute(conn).await.map_err(remote_error)?;
    Ok(result.rows_affected())
}

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

fn bind_param<'q>(query: PgQuery<'q>, value: &'q Value, param_type: &str) -> PgQuery<'q> {
    match value {
        Value::Null => bind_null(query, param_type),
        Value::Bool(b) => query.bind(b),
        Value::Int(i) => query.bind(i),
        Value::Float(f) => query.bind(f),
        Value::Decimal(d) => query.bind(d),
        Value::Text(s) => query.bind(s),
        Value::Bytes(b) => query.bind(b),
        Value::Date(d) => query.bind(d),
        Value::Timestamp(ts) => query.bind(ts),
        Value::Json(j) => query.bind(j),
        Value::Array(items) => query.bind(serde_json::Value::Array(items.iter().map(to_json).collect())),
    }
}

/// Binds a NULL of the parameter's declared type so Postgres accepts it.
fn bind_null<'q>(query: PgQuery<'q>, param_type: &str) -> PgQuery<'q> {
    match param_type {
        "BOOL" => query.bind(Option::<bool>::None),
        "INT2" => query.bind(Option::<i16>::None),
        "INT4" => query.bind(Option::<i32>::None),
        "INT8" => query.bind(Option::<i64>::None),
        "FLOAT4" => query.bind(Option::<f32>::None),
        "FLOAT8" => query.bind(Option::<f64>::None),
        "NUMERIC" => query.bind(Option::<Decimal>::None),
        "BYTEA" => query.bind(Option::<Vec<u8>>::None),
        "DATE" => query.bind(Option::<NaiveDate>::None),
        "TIMESTAMP" => query.bind(Option::<NaiveDateTime>::None),
        "TIMESTAMPTZ" => query.bind(Option::<DateTime<Utc>>::None),
        "JSON" | "JSONB" => query.bind(Option::<serde_json::Value>::None),
        _ => query.bind(Option::<String>::None),
    }
}

fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Value::from(*f),
        Value::Decimal(d) => serde_json::Value::String(d.to_string()),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Bytes(b) => serde_json::Value::Array(b.iter().map(|byte| serde_json::Value::from(*byte)).collect()),
        Value::Date(d) => serde_json::Value::String(d.to_string()),
        Value::Timestamp(ts) => serde_json::Value::String(ts.to_string()),
        Value::Json(j) => j.clone(),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
    }
}

fn remote_error(e: sqlx::Error) -> RemoteError {
    let code = e
        .as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.into_owned());
    RemoteError {
        message: e.to_string(),
        code,
    }
}

//! Store collaborator
//!
//! The mapper talks to the database through exactly two primitives. Each call
//! acquires a pooled connection for the duration of one statement and hands it
//! back when the connection guard drops, whether the statement succeeded or not.

use crate::MODEL_TARGET;
use crate::models::{StoreError, Value};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Database, Row, Sqlite, TypeInfo, ValueRef};
use std::str::FromStr;
use tracing::debug;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Relational store used by the mapper
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Store: Send + Sync {
    /// Run a statement that returns no rows, yielding the affected row count
    async fn execute(&self, sql: &str, params: &[Value]) -> StoreResult<u64>;

    /// Run a query and return every result row as a tuple of values
    async fn fetch_all(&self, sql: &str, params: &[Value]) -> StoreResult<Vec<Vec<Value>>>;
}

/// SQLite-backed store
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `url`
    ///
    /// # Errors
    /// Returns an error if the URL is malformed or the database cannot be opened.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Ok(Self { pool })
    }

    /// Private in-memory database backed by a single long-lived connection
    ///
    /// # Errors
    /// Returns an error if SQLite cannot be initialized.
    pub async fn in_memory() -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self { pool })
    }
}

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, <Sqlite as Database>::Arguments<'q>>;

fn bind_params<'q>(sql: &'q str, params: &'q [Value]) -> SqliteQuery<'q> {
    params
        .iter()
        .fold(sqlx::query(sql), |query, param| match param {
            Value::Integer(i) => query.bind(*i),
            Value::Text(s) => query.bind(s.as_str()),
            Value::Null => query.bind(None::<i64>),
        })
}

fn decode_row(row: &SqliteRow) -> StoreResult<Vec<Value>> {
    (0..row.len())
        .map(|index| {
            let raw = row.try_get_raw(index)?;
            if raw.is_null() {
                return Ok(Value::Null);
            }
            let type_name = raw.type_info().name().to_owned();
            match type_name.as_str() {
                "INTEGER" | "BOOLEAN" => Ok(Value::Integer(row.try_get::<i64, _>(index)?)),
                "TEXT" => Ok(Value::Text(row.try_get::<String, _>(index)?)),
                _ => Err(StoreError::UnsupportedType(type_name)),
            }
        })
        .collect()
}

#[async_trait]
impl Store for SqliteStore {
    async fn execute(&self, sql: &str, params: &[Value]) -> StoreResult<u64> {
        debug!(target: MODEL_TARGET, sql = %sql, params = ?params, "execute");
        let mut conn = self.pool.acquire().await?;
        let result = bind_params(sql, params).execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }

    async fn fetch_all(&self, sql: &str, params: &[Value]) -> StoreResult<Vec<Vec<Value>>> {
        debug!(target: MODEL_TARGET, sql = %sql, params = ?params, "fetch_all");
        let mut conn = self.pool.acquire().await?;
        let rows = bind_params(sql, params).fetch_all(&mut *conn).await?;
        rows.iter().map(decode_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_execute_and_fetch() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .execute("CREATE TABLE t (a INTEGER NOT NULL, b TEXT)", &[])
            .await
            .unwrap();

        let affected = store
            .execute(
                "INSERT INTO t (a, b) VALUES (?, ?)",
                &[Value::Integer(1), Value::Text("one".to_string())],
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);
        store
            .execute("INSERT INTO t (a, b) VALUES (?, ?)", &[Value::Integer(2), Value::Null])
            .await
            .unwrap();

        let rows = store.fetch_all("SELECT a, b FROM t", &[]).await.unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Value::Integer(1), Value::Text("one".to_string())],
                vec![Value::Integer(2), Value::Null],
            ]
        );
    }

    #[tokio::test]
    async fn test_statement_errors_pass_through() {
        let store = SqliteStore::in_memory().await.unwrap();
        let err = store.fetch_all("SELECT * FROM missing", &[]).await.unwrap_err();
        assert!(matches!(err, StoreError::Sqlx(_)));

        // The connection went back to the pool despite the failure
        let rows = store.fetch_all("SELECT 1", &[]).await.unwrap();
        assert_eq!(rows, vec![vec![Value::Integer(1)]]);
    }
}

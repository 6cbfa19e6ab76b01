//! Postgres 适配器（`infra-sqlx` 特性）
//!
use super::{QueryExecutor, ResultSet, Row, SqlValue, StorageError, TransactionHandle};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgPool, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row as _, TypeInfo};
use uuid::Uuid;

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StorageError::UniqueConstraintViolation {
                    reason: err.to_string(),
                }
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => StorageError::ConnectionFailed {
                reason: err.to_string(),
            },
            _ => StorageError::InteractingFailed {
                reason: err.to_string(),
            },
        }
    }
}

fn bind<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &SqlValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Text(v) => query.bind(v.clone()),
        SqlValue::Integer(v) => query.bind(*v),
        SqlValue::Json(v) => query.bind(sqlx::types::Json(v.clone())),
        SqlValue::Timestamp(v) => query.bind(*v),
        SqlValue::Uuid(v) => query.bind(*v),
    }
}

fn prepare<'q>(sql: &'q str, params: &[SqlValue]) -> Query<'q, Postgres, PgArguments> {
    params.iter().fold(sqlx::query(sql), bind)
}

fn returns_rows(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("select"))
}

fn convert_row(row: &PgRow) -> Result<Row, StorageError> {
    let mut out = Row::new();
    for column in row.columns() {
        let name = column.name();
        let value = match column.type_info().name() {
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => row
                .try_get::<Option<String>, _>(name)
                .map(|v| v.map(SqlValue::Text)),
            "INT2" => row
                .try_get::<Option<i16>, _>(name)
                .map(|v| v.map(|i| SqlValue::Integer(i64::from(i)))),
            "INT4" => row
                .try_get::<Option<i32>, _>(name)
                .map(|v| v.map(|i| SqlValue::Integer(i64::from(i)))),
            "INT8" => row
                .try_get::<Option<i64>, _>(name)
                .map(|v| v.map(SqlValue::Integer)),
            "JSON" | "JSONB" => row
                .try_get::<Option<serde_json::Value>, _>(name)
                .map(|v| v.map(SqlValue::Json)),
            "TIMESTAMPTZ" => row
                .try_get::<Option<DateTime<Utc>>, _>(name)
                .map(|v| v.map(SqlValue::Timestamp)),
            "UUID" => row
                .try_get::<Option<Uuid>, _>(name)
                .map(|v| v.map(SqlValue::Uuid)),
            other => {
                return Err(StorageError::interacting(format!(
                    "unsupported column type {other} for '{name}'"
                )));
            }
        }?;
        out = out.with(name, value.unwrap_or(SqlValue::Null));
    }
    Ok(out)
}

/// 基于 sqlx 连接池的执行器
#[derive(Debug, Clone)]
pub struct PgQueryExecutor {
    pool: PgPool,
}

impl PgQueryExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let pool = PgPool::connect(url).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl QueryExecutor for PgQueryExecutor {
    async fn execute(&self, query: &str, params: &[SqlValue]) -> Result<ResultSet, StorageError> {
        if returns_rows(query) {
            let rows = prepare(query, params).fetch_all(&self.pool).await?;
            let rows = rows.iter().map(convert_row).collect::<Result<Vec<_>, _>>()?;
            return Ok(ResultSet::with_rows(rows));
        }
        let done = prepare(query, params).execute(&self.pool).await?;
        Ok(ResultSet::affected(done.rows_affected()))
    }

    async fn transaction(&self) -> Result<Box<dyn TransactionHandle>, StorageError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl TransactionHandle for PgTransaction {
    async fn execute(
        &mut self,
        query: &str,
        params: &[SqlValue],
    ) -> Result<ResultSet, StorageError> {
        if returns_rows(query) {
            let rows = prepare(query, params).fetch_all(&mut *self.tx).await?;
            let rows = rows.iter().map(convert_row).collect::<Result<Vec<_>, _>>()?;
            return Ok(ResultSet::with_rows(rows));
        }
        let done = prepare(query, params).execute(&mut *self.tx).await?;
        Ok(ResultSet::affected(done.rows_affected()))
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

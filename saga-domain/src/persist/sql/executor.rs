use crate::value_object::Version;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// 存储适配层错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("unique constraint violated: {reason}")]
    UniqueConstraintViolation { reason: String },
    #[error("connection failed: {reason}")]
    ConnectionFailed { reason: String },
    #[error("query failed: {reason}")]
    InteractingFailed { reason: String },
}

impl StorageError {
    pub fn interacting(reason: impl Into<String>) -> Self {
        StorageError::InteractingFailed {
            reason: reason.into(),
        }
    }
}

/// 语句参数与结果列的取值
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Text(String),
    Integer(i64),
    Json(Value),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<Value> for SqlValue {
    fn from(value: Value) -> Self {
        SqlValue::Json(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(value)
    }
}

impl From<Uuid> for SqlValue {
    fn from(value: Uuid) -> Self {
        SqlValue::Uuid(value)
    }
}

impl TryFrom<Version> for SqlValue {
    type Error = StorageError;

    fn try_from(version: Version) -> Result<Self, Self::Error> {
        i64::try_from(version.value())
            .map(SqlValue::Integer)
            .map_err(|_| StorageError::interacting(format!("version {version} exceeds i64")))
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

/// 结果行：按列名取值
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.columns.push((column.into(), value.into()));
        self
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    fn required(&self, column: &str) -> Result<&SqlValue, StorageError> {
        self.get(column)
            .ok_or_else(|| StorageError::interacting(format!("missing column '{column}'")))
    }

    fn unexpected(column: &str, expected: &str, found: &SqlValue) -> StorageError {
        StorageError::interacting(format!(
            "column '{column}' expected {expected}, found {found:?}"
        ))
    }

    pub fn text(&self, column: &str) -> Result<String, StorageError> {
        match self.required(column)? {
            SqlValue::Text(value) => Ok(value.clone()),
            other => Err(Self::unexpected(column, "text", other)),
        }
    }

    pub fn integer(&self, column: &str) -> Result<i64, StorageError> {
        match self.required(column)? {
            SqlValue::Integer(value) => Ok(*value),
            other => Err(Self::unexpected(column, "integer", other)),
        }
    }

    pub fn json(&self, column: &str) -> Result<Value, StorageError> {
        match self.required(column)? {
            SqlValue::Json(value) => Ok(value.clone()),
            // 部分驱动以文本返回 JSON 列
            SqlValue::Text(raw) => serde_json::from_str(raw)
                .map_err(|err| StorageError::interacting(format!("column '{column}': {err}"))),
            other => Err(Self::unexpected(column, "json", other)),
        }
    }

    pub fn timestamp(&self, column: &str) -> Result<DateTime<Utc>, StorageError> {
        match self.required(column)? {
            SqlValue::Timestamp(value) => Ok(*value),
            other => Err(Self::unexpected(column, "timestamp", other)),
        }
    }

    pub fn optional_timestamp(&self, column: &str) -> Result<Option<DateTime<Utc>>, StorageError> {
        match self.get(column) {
            None | Some(SqlValue::Null) => Ok(None),
            Some(_) => self.timestamp(column).map(Some),
        }
    }

    /// 非负整数列转为版本号
    pub fn version(&self, column: &str) -> Result<Version, StorageError> {
        let raw = self.integer(column)?;
        usize::try_from(raw)
            .map(Version::from_value)
            .map_err(|_| StorageError::interacting(format!("column '{column}' is negative: {raw}")))
    }

    pub fn uuid(&self, column: &str) -> Result<Uuid, StorageError> {
        match self.required(column)? {
            SqlValue::Uuid(value) => Ok(*value),
            SqlValue::Text(raw) => Uuid::parse_str(raw)
                .map_err(|err| StorageError::interacting(format!("column '{column}': {err}"))),
            other => Err(Self::unexpected(column, "uuid", other)),
        }
    }
}

/// 语句执行结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub rows: Vec<Row>,
    pub affected_rows: u64,
}

impl ResultSet {
    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            affected_rows: 0,
        }
    }

    pub fn affected(affected_rows: u64) -> Self {
        Self {
            rows: Vec::new(),
            affected_rows,
        }
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }
}

/// 参数化语句执行端口
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, query: &str, params: &[SqlValue]) -> Result<ResultSet, StorageError>;

    /// 开启事务，事务内的语句要么全部生效要么全部回滚
    async fn transaction(&self) -> Result<Box<dyn TransactionHandle>, StorageError>;
}

#[async_trait]
impl<T> QueryExecutor for Arc<T>
where
    T: QueryExecutor + ?Sized,
{
    async fn execute(&self, query: &str, params: &[SqlValue]) -> Result<ResultSet, StorageError> {
        (**self).execute(query, params).await
    }

    async fn transaction(&self) -> Result<Box<dyn TransactionHandle>, StorageError> {
        (**self).transaction().await
    }
}

#[async_trait]
pub trait TransactionHandle: Send {
    async fn execute(
        &mut self,
        query: &str,
        params: &[SqlValue],
    ) -> Result<ResultSet, StorageError>;

    async fn commit(self: Box<Self>) -> Result<(), StorageError>;

    async fn rollback(self: Box<Self>) -> Result<(), StorageError>;
}

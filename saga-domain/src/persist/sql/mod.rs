//! 基于 SQL 的事件存储与快照存储
//!
//! 存储逻辑只依赖 `QueryExecutor` 端口（参数化语句 + 事务），
//! 具体数据库驱动以适配器形式注入；启用 `infra-sqlx` 特性时提供 Postgres 实现。
//!
mod event_store;
mod executor;
#[cfg(feature = "infra-sqlx")]
mod postgres;
mod schema;
mod snapshot_store;

pub use event_store::SqlEventStore;
pub use executor::{QueryExecutor, ResultSet, Row, SqlValue, StorageError, TransactionHandle};
#[cfg(feature = "infra-sqlx")]
pub use postgres::PgQueryExecutor;
pub use schema::{SCHEMA, install_schema};
pub use snapshot_store::SqlSnapshotStore;

use super::{QueryExecutor, StorageError};

/// 事件存储所需的表结构
///
/// - `event_store_stream`：流头，`version` 作为乐观并发的比较值
/// - `event_store_stream_events`：事件，(流, 序号) 唯一
/// - `event_store_snapshots`：每条流最新的一份快照
pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS event_store_stream (
        id TEXT NOT NULL,
        entity_type TEXT NOT NULL,
        version BIGINT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        closed_at TIMESTAMPTZ,
        PRIMARY KEY (id, entity_type)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS event_store_stream_events (
        record_id UUID PRIMARY KEY,
        stream_id TEXT NOT NULL,
        entity_type TEXT NOT NULL,
        sequence BIGINT NOT NULL,
        event_type TEXT NOT NULL,
        event_version BIGINT NOT NULL,
        payload JSONB NOT NULL,
        occurred_at TIMESTAMPTZ NOT NULL,
        UNIQUE (stream_id, entity_type, sequence),
        FOREIGN KEY (stream_id, entity_type)
            REFERENCES event_store_stream (id, entity_type) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS event_store_snapshots (
        id TEXT NOT NULL,
        entity_type TEXT NOT NULL,
        version BIGINT NOT NULL,
        payload JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (id, entity_type)
    )
    "#,
];

/// 依次执行建表语句（幂等）
pub async fn install_schema(executor: &dyn QueryExecutor) -> Result<(), StorageError> {
    for statement in SCHEMA {
        executor.execute(statement, &[]).await?;
    }
    Ok(())
}

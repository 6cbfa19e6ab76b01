use super::{QueryExecutor, Row, SqlValue, StorageError, TransactionHandle};
use crate::{
    error::{DomainError, DomainResult as Result},
    identity::Identity,
    persist::{EventStore, SerializedEventRecord, SerializedEventStream},
    value_object::Version,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

const INSERT_STREAM: &str = "INSERT INTO event_store_stream (id, entity_type, version, created_at, closed_at) \
     VALUES ($1, $2, $3, $4, $5::timestamptz)";

const INSERT_EVENT: &str = "INSERT INTO event_store_stream_events \
     (record_id, stream_id, entity_type, sequence, event_type, event_version, payload, occurred_at) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8)";

const SELECT_STREAM: &str = "SELECT version, created_at, closed_at FROM event_store_stream \
     WHERE id = $1 AND entity_type = $2";

const ADVANCE_STREAM: &str = "UPDATE event_store_stream SET version = $1, closed_at = COALESCE($2::timestamptz, closed_at) \
     WHERE id = $3 AND entity_type = $4 AND version = $5 AND closed_at IS NULL";

const SELECT_EVENTS: &str = "SELECT record_id, sequence, event_type, event_version, payload, occurred_at \
     FROM event_store_stream_events \
     WHERE stream_id = $1 AND entity_type = $2 AND sequence > $3 ORDER BY sequence ASC";

const DELETE_EVENTS: &str =
    "DELETE FROM event_store_stream_events WHERE stream_id = $1 AND entity_type = $2";

const DELETE_STREAM: &str = "DELETE FROM event_store_stream WHERE id = $1 AND entity_type = $2";

const TRUNCATE_EVENTS: &str = "DELETE FROM event_store_stream_events \
     WHERE stream_id = $1 AND entity_type = $2 AND sequence > $3";

const REWIND_STREAM: &str = "UPDATE event_store_stream SET version = $1, closed_at = NULL \
     WHERE id = $2 AND entity_type = $3 AND version > $1";

/// 基于 `QueryExecutor` 的事件存储
///
/// 流头与事件在同一事务中写入；追加时以 `version = 期望版本` 作为条件更新流头，
/// 受影响行数为 0 即说明版本已被其他写入推进。
pub struct SqlEventStore<X: ?Sized> {
    executor: Arc<X>,
}

impl<X> SqlEventStore<X>
where
    X: QueryExecutor + ?Sized,
{
    pub fn new(executor: Arc<X>) -> Self {
        Self { executor }
    }

    fn key(identity: &Identity) -> [SqlValue; 2] {
        [identity.value().into(), identity.owner_type().into()]
    }

    async fn insert_events(
        tx: &mut Box<dyn TransactionHandle>,
        identity: &Identity,
        events: &[SerializedEventRecord],
    ) -> std::result::Result<(), StorageError> {
        for event in events {
            let event_version = i64::try_from(event.event_version())
                .map_err(|_| StorageError::interacting("event version exceeds i64"))?;
            tx.execute(
                INSERT_EVENT,
                &[
                    event.record_id().into(),
                    identity.value().into(),
                    identity.owner_type().into(),
                    SqlValue::try_from(event.sequence())?,
                    event.event_type().into(),
                    event_version.into(),
                    event.payload().clone().into(),
                    event.occurred_at().into(),
                ],
            )
            .await?;
        }
        Ok(())
    }

    /// 回滚并返回原始错误；回滚本身失败只记录日志
    async fn abort(tx: Box<dyn TransactionHandle>, err: DomainError) -> DomainError {
        if let Err(rollback) = tx.rollback().await {
            warn!(error = %rollback, "transaction rollback failed");
        }
        err
    }

    fn record_from_row(row: &Row) -> std::result::Result<SerializedEventRecord, StorageError> {
        let event_version = usize::try_from(row.integer("event_version")?)
            .map_err(|_| StorageError::interacting("negative event version"))?;
        Ok(SerializedEventRecord::builder()
            .record_id(row.uuid("record_id")?)
            .event_type(row.text("event_type")?)
            .event_version(event_version)
            .sequence(row.version("sequence")?)
            .occurred_at(row.timestamp("occurred_at")?)
            .payload(row.json("payload")?)
            .build())
    }
}

/// 唯一约束冲突按调用点的语义映射，其余存储错误走通用转换
fn on_unique(err: StorageError, conflict: impl FnOnce() -> DomainError) -> DomainError {
    match err {
        StorageError::UniqueConstraintViolation { .. } => conflict(),
        other => DomainError::from(other),
    }
}

#[async_trait]
impl<X> EventStore for SqlEventStore<X>
where
    X: QueryExecutor + ?Sized,
{
    async fn append(&self, stream: SerializedEventStream) -> Result<()> {
        let identity = stream.identity().clone();
        let version = SqlValue::try_from(stream.last_sequence().unwrap_or_default())?;
        let [id, entity_type] = Self::key(&identity);
        let conflict = || DomainError::NonUniqueStreamId {
            identity: identity.clone(),
        };

        let mut tx = self.executor.transaction().await?;
        let header = tx
            .execute(
                INSERT_STREAM,
                &[
                    id,
                    entity_type,
                    version,
                    stream.created_at().into(),
                    stream.closed_at().into(),
                ],
            )
            .await;
        if let Err(err) = header {
            return Err(Self::abort(tx, on_unique(err, conflict)).await);
        }
        if let Err(err) = Self::insert_events(&mut tx, &identity, stream.events()).await {
            return Err(Self::abort(tx, on_unique(err, conflict)).await);
        }
        tx.commit().await.map_err(|err| on_unique(err, conflict))
    }

    async fn append_events(
        &self,
        stream: SerializedEventStream,
        expected_version: Version,
    ) -> Result<()> {
        let identity = stream.identity().clone();
        let Some(last) = stream.last_sequence() else {
            return Ok(());
        };
        let [id, entity_type] = Self::key(&identity);
        let conflict = || DomainError::ConcurrentModification {
            identity: identity.clone(),
            expected: expected_version.value(),
        };

        let mut tx = self.executor.transaction().await?;
        let advanced = tx
            .execute(
                ADVANCE_STREAM,
                &[
                    SqlValue::try_from(last)?,
                    stream.closed_at().into(),
                    id.clone(),
                    entity_type.clone(),
                    SqlValue::try_from(expected_version)?,
                ],
            )
            .await;

        match advanced {
            Err(err) => return Err(Self::abort(tx, DomainError::from(err)).await),
            Ok(result) if result.affected_rows == 0 => {
                // 区分：流不存在 / 已关闭 / 版本已被推进
                let err = match tx.execute(SELECT_STREAM, &[id, entity_type]).await {
                    Err(err) => DomainError::from(err),
                    Ok(found) => match found.first() {
                        None => DomainError::StreamNotFound {
                            identity: identity.clone(),
                        },
                        Some(row) => {
                            let current = row.version("version");
                            let closed = row.optional_timestamp("closed_at");
                            match (current, closed) {
                                (Ok(v), Ok(Some(_))) if v == expected_version => {
                                    DomainError::ClosedStream {
                                        identity: identity.clone(),
                                    }
                                }
                                _ => conflict(),
                            }
                        }
                    },
                };
                return Err(Self::abort(tx, err).await);
            }
            Ok(_) => {}
        }

        if let Err(err) = Self::insert_events(&mut tx, &identity, stream.events()).await {
            return Err(Self::abort(tx, on_unique(err, conflict)).await);
        }
        tx.commit().await.map_err(|err| on_unique(err, conflict))
    }

    async fn load(
        &self,
        identity: &Identity,
        from_version: Version,
    ) -> Result<SerializedEventStream> {
        let [id, entity_type] = Self::key(identity);

        let header = self
            .executor
            .execute(SELECT_STREAM, &[id.clone(), entity_type.clone()])
            .await?;
        let Some(row) = header.first() else {
            return Err(DomainError::StreamNotFound {
                identity: identity.clone(),
            });
        };
        let created_at = row.timestamp("created_at")?;
        let closed_at = row.optional_timestamp("closed_at")?;

        let rows = self
            .executor
            .execute(
                SELECT_EVENTS,
                &[id, entity_type, SqlValue::try_from(from_version)?],
            )
            .await?;
        let events = rows
            .rows
            .iter()
            .map(Self::record_from_row)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(SerializedEventStream::new(
            identity.clone(),
            created_at,
            closed_at,
            events,
        ))
    }

    async fn delete(&self, identity: &Identity) -> Result<()> {
        let key = Self::key(identity);

        let mut tx = self.executor.transaction().await?;
        if let Err(err) = tx.execute(DELETE_EVENTS, &key).await {
            return Err(Self::abort(tx, err.into()).await);
        }
        if let Err(err) = tx.execute(DELETE_STREAM, &key).await {
            return Err(Self::abort(tx, err.into()).await);
        }
        tx.commit().await?;
        Ok(())
    }

    async fn revert(&self, identity: &Identity, to_version: Version) -> Result<()> {
        let [id, entity_type] = Self::key(identity);
        let to = SqlValue::try_from(to_version)?;

        let mut tx = self.executor.transaction().await?;
        let rewound = match tx
            .execute(REWIND_STREAM, &[to.clone(), id.clone(), entity_type.clone()])
            .await
        {
            Ok(result) => result.affected_rows,
            Err(err) => return Err(Self::abort(tx, err.into()).await),
        };

        if rewound == 0 {
            // 版本不晚于目标时无需回退，只需确认流存在
            let found = tx
                .execute(SELECT_STREAM, &[id, entity_type])
                .await
                .map(|rs| rs.first().is_some());
            let outcome = match found {
                Ok(true) => Ok(()),
                Ok(false) => Err(DomainError::StreamNotFound {
                    identity: identity.clone(),
                }),
                Err(err) => Err(err.into()),
            };
            if let Err(rollback) = tx.rollback().await {
                warn!(error = %rollback, "transaction rollback failed");
            }
            return outcome;
        }

        if let Err(err) = tx.execute(TRUNCATE_EVENTS, &[id, entity_type, to]).await {
            return Err(Self::abort(tx, err.into()).await);
        }
        tx.commit().await?;
        Ok(())
    }
}

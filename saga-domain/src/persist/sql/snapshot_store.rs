use super::{QueryExecutor, SqlValue};
use crate::{
    error::DomainResult as Result,
    identity::Identity,
    persist::{SerializedSnapshot, SnapshotStore},
};
use async_trait::async_trait;
use std::sync::Arc;

// 只允许较新的快照覆盖较旧的
const UPSERT_SNAPSHOT: &str = "INSERT INTO event_store_snapshots (id, entity_type, version, payload, created_at) \
     VALUES ($1, $2, $3, $4, $5) \
     ON CONFLICT (id, entity_type) DO UPDATE SET \
     version = EXCLUDED.version, payload = EXCLUDED.payload, created_at = EXCLUDED.created_at \
     WHERE event_store_snapshots.version <= EXCLUDED.version";

const SELECT_SNAPSHOT: &str = "SELECT version, payload, created_at FROM event_store_snapshots \
     WHERE id = $1 AND entity_type = $2";

const DELETE_SNAPSHOT: &str =
    "DELETE FROM event_store_snapshots WHERE id = $1 AND entity_type = $2";

/// 基于 `QueryExecutor` 的快照存储，每条流保留一份
pub struct SqlSnapshotStore<X: ?Sized> {
    executor: Arc<X>,
}

impl<X> SqlSnapshotStore<X>
where
    X: QueryExecutor + ?Sized,
{
    pub fn new(executor: Arc<X>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl<X> SnapshotStore for SqlSnapshotStore<X>
where
    X: QueryExecutor + ?Sized,
{
    async fn save(&self, snapshot: SerializedSnapshot) -> Result<()> {
        let params = [
            snapshot.identity().value().into(),
            snapshot.entity_type().into(),
            SqlValue::try_from(snapshot.version())?,
            snapshot.payload().clone().into(),
            snapshot.created_at().into(),
        ];
        self.executor.execute(UPSERT_SNAPSHOT, &params).await?;
        Ok(())
    }

    async fn load(&self, identity: &Identity) -> Result<Option<SerializedSnapshot>> {
        let found = self
            .executor
            .execute(
                SELECT_SNAPSHOT,
                &[identity.value().into(), identity.owner_type().into()],
            )
            .await?;
        let Some(row) = found.first() else {
            return Ok(None);
        };

        Ok(Some(
            SerializedSnapshot::builder()
                .identity(identity.clone())
                .version(row.version("version")?)
                .payload(row.json("payload")?)
                .created_at(row.timestamp("created_at")?)
                .build(),
        ))
    }

    async fn remove(&self, identity: &Identity) -> Result<()> {
        self.executor
            .execute(
                DELETE_SNAPSHOT,
                &[identity.value().into(), identity.owner_type().into()],
            )
            .await?;
        Ok(())
    }
}

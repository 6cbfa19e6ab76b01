//! 事件溯源实体提供者
//!
//! 组合事件存储与快照器，完成实体的加载（快照 + 增量重放）与保存
//! （首次保存 / 带期望版本的追加 + 按策略写快照）。
//!
use crate::{
    entity::{EntityCore, EntityRecord, EventSourced},
    error::{DomainError, DomainResult as Result},
    identity::Identity,
    persist::{EventStore, SerializedEventStream, Snapshotter},
    value_object::Version,
};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct EventSourcingProvider {
    store: Arc<dyn EventStore>,
    snapshotter: Snapshotter,
}

impl EventSourcingProvider {
    pub fn new(store: Arc<dyn EventStore>, snapshotter: Snapshotter) -> Self {
        Self { store, snapshotter }
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    pub fn snapshotter(&self) -> &Snapshotter {
        &self.snapshotter
    }

    /// 加载实体：优先从快照恢复，再重放快照之后的事件
    ///
    /// 快照无法还原（类型不符、结构已变更等）时退回到完整重放；
    /// 流不存在时返回 `StreamNotFound`。
    #[tracing::instrument(level = "debug", skip(self), fields(entity_type = T::TYPE))]
    pub async fn load<T: EventSourced>(&self, identity: &Identity) -> Result<EntityCore<T>> {
        identity.ensure_owned_by::<T>()?;

        let snapshot = match self.snapshotter.load(identity).await? {
            Some(snapshot) => match snapshot.to_entity::<T>() {
                Ok(entity) => Some(entity),
                Err(err) => {
                    warn!(
                        %identity,
                        version = snapshot.version().value(),
                        error = %err,
                        "discarding unusable snapshot, replaying full stream"
                    );
                    None
                }
            },
            None => None,
        };

        let from_version = snapshot
            .as_ref()
            .map(|entity| entity.version())
            .unwrap_or_default();
        let stream = self
            .store
            .load(identity, from_version)
            .await?
            .into_stream()?;

        match snapshot {
            Some(mut entity) => {
                let replayed = entity.replay(stream)?;
                debug!(
                    snapshot_version = from_version.value(),
                    replayed, "entity restored from snapshot"
                );
                Ok(entity)
            }
            None => {
                if stream.is_empty() {
                    return Err(DomainError::StreamNotFound {
                        identity: identity.clone(),
                    });
                }
                EntityCore::restore(stream)
            }
        }
    }

    /// 保存实体的未提交事件，返回已提交的事件记录
    ///
    /// 实体此前从未持久化时走 `append`（重复标识报 `NonUniqueStreamId`），
    /// 否则以提交前版本作为期望版本走 `append_events`（版本冲突报 `ConcurrentModification`）。
    /// 快照写入失败只记录日志，不影响保存结果。
    #[tracing::instrument(
        level = "debug",
        skip(self, entity),
        fields(entity_type = T::TYPE, identity = %entity.identity())
    )]
    pub async fn save<T: EventSourced>(
        &self,
        entity: &mut EntityCore<T>,
    ) -> Result<Vec<EntityRecord<T>>> {
        if !entity.has_uncommitted() {
            return Ok(Vec::new());
        }

        let expected_version = entity.committed_version();
        let stream = entity.extract_stream();
        let serialized = match SerializedEventStream::from_stream(&stream) {
            Ok(serialized) => serialized,
            Err(err) => {
                entity.restore_uncommitted(stream);
                return Err(err);
            }
        };

        let appended = if expected_version.is_new() {
            self.store.append(serialized).await
        } else {
            self.store.append_events(serialized, expected_version).await
        };
        if let Err(err) = appended {
            entity.restore_uncommitted(stream);
            return Err(err);
        }

        debug!(
            from = expected_version.value(),
            to = entity.version().value(),
            "events committed"
        );

        if self.snapshotter.should_snapshot(entity) {
            if let Err(err) = self.snapshotter.save(entity).await {
                warn!(
                    version = entity.version().value(),
                    error = %err,
                    "failed to store snapshot"
                );
            }
        }

        Ok(stream.into_events())
    }

    /// 删除实体的事件流与快照
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn remove(&self, identity: &Identity) -> Result<()> {
        self.snapshotter.remove(identity).await?;
        self.store.delete(identity).await
    }

    /// 回退到指定版本并返回回退后的实体
    ///
    /// 快照可能晚于目标版本，统一丢弃后从事件重建。
    #[tracing::instrument(level = "debug", skip(self), fields(entity_type = T::TYPE))]
    pub async fn revert<T: EventSourced>(
        &self,
        identity: &Identity,
        to_version: Version,
    ) -> Result<EntityCore<T>> {
        identity.ensure_owned_by::<T>()?;
        self.snapshotter.remove(identity).await?;
        self.store.revert(identity, to_version).await?;
        self.load::<T>(identity).await
    }
}

//! 快照存储协议与策略
//!
//! 快照是纯粹的加速手段：任何时刻丢弃全部快照都不影响正确性。
//! `Snapshotter` 组合存储与触发策略，负责物化/还原实体。
//!
use crate::{
    entity::{EntityCore, EventSourced},
    error::DomainResult as Result,
    identity::Identity,
    persist::SerializedSnapshot,
    value_object::Version,
};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// 写入快照，同一标识只保留最新一份
    async fn save(&self, snapshot: SerializedSnapshot) -> Result<()>;

    async fn load(&self, identity: &Identity) -> Result<Option<SerializedSnapshot>>;

    async fn remove(&self, identity: &Identity) -> Result<()>;
}

#[async_trait]
impl<T> SnapshotStore for Arc<T>
where
    T: SnapshotStore + ?Sized,
{
    async fn save(&self, snapshot: SerializedSnapshot) -> Result<()> {
        (**self).save(snapshot).await
    }

    async fn load(&self, identity: &Identity) -> Result<Option<SerializedSnapshot>> {
        (**self).load(identity).await
    }

    async fn remove(&self, identity: &Identity) -> Result<()> {
        (**self).remove(identity).await
    }
}

/// 决定保存后是否写快照
pub trait SnapshotTrigger: Send + Sync {
    fn should_snapshot(&self, last_snapshot: Version, current: Version) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotPolicy {
    Never,
    /// 距上次快照累计至少 N 个事件
    Every(usize),
}

impl SnapshotTrigger for SnapshotPolicy {
    fn should_snapshot(&self, last_snapshot: Version, current: Version) -> bool {
        match self {
            SnapshotPolicy::Never => false,
            SnapshotPolicy::Every(interval) => {
                let interval = (*interval).max(1);
                current.distance_from(last_snapshot) >= interval
            }
        }
    }
}

impl<F> SnapshotTrigger for F
where
    F: Fn(Version, Version) -> bool + Send + Sync,
{
    fn should_snapshot(&self, last_snapshot: Version, current: Version) -> bool {
        self(last_snapshot, current)
    }
}

/// 快照器：快照存储 + 触发策略
#[derive(Clone)]
pub struct Snapshotter {
    store: Arc<dyn SnapshotStore>,
    trigger: Arc<dyn SnapshotTrigger>,
}

impl Snapshotter {
    pub fn new(store: Arc<dyn SnapshotStore>, trigger: impl SnapshotTrigger + 'static) -> Self {
        Self {
            store,
            trigger: Arc::new(trigger),
        }
    }

    /// 从不写快照的快照器
    pub fn disabled(store: Arc<dyn SnapshotStore>) -> Self {
        Self::new(store, SnapshotPolicy::Never)
    }

    pub fn should_snapshot<T: EventSourced>(&self, entity: &EntityCore<T>) -> bool {
        self.trigger
            .should_snapshot(entity.snapshot_version(), entity.version())
    }

    /// 物化实体并写入快照
    pub async fn save<T: EventSourced>(&self, entity: &mut EntityCore<T>) -> Result<()> {
        let snapshot = SerializedSnapshot::from_entity(entity)?;
        let version = snapshot.version();
        self.store.save(snapshot).await?;
        entity.mark_snapshot(version);
        Ok(())
    }

    /// 读取原始快照
    pub async fn load(&self, identity: &Identity) -> Result<Option<SerializedSnapshot>> {
        self.store.load(identity).await
    }

    pub async fn remove(&self, identity: &Identity) -> Result<()> {
        self.store.remove(identity).await
    }
}

//! 事件溯源实体（Event-Sourced Entity）
//!
//! - `EventSourced` 约束业务状态：类型名、事件类型与 `apply`；
//! - `EntityCore` 负责标识、版本、生命周期与未提交事件缓冲，
//!   所有状态变更都经由事件完成，重放同一事件序列总能得到相同状态。
//!
use crate::error::{DomainError, DomainResult};
use crate::event::{DomainEvent, EventRecord, EventStream, StreamEvent};
use crate::identity::Identity;
use crate::value_object::Version;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt::Debug;
use std::mem;

/// 可由事件重建的业务状态
pub trait EventSourced:
    Default + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// 实体类型名，作为标识与存储记录的类型鉴别
    const TYPE: &'static str;

    /// 该实体产生的领域事件类型
    type Event: DomainEvent;

    /// 应用事件，更新状态；不关心的事件直接忽略
    fn apply(&mut self, event: &Self::Event);
}

/// 实体流内的事件记录
pub type EntityRecord<T> = EventRecord<StreamEvent<<T as EventSourced>::Event>>;

/// 实体的事件流
pub type EntityStream<T> = EventStream<StreamEvent<<T as EventSourced>::Event>>;

/// 实体核心：标识 + 版本 + 生命周期 + 业务状态
///
/// 快照即该结构的序列化结果；未提交事件与快照版本不参与序列化。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct EntityCore<T: EventSourced> {
    identity: Identity,
    version: Version,
    created_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    state: T,
    #[serde(skip)]
    uncommitted: Vec<EntityRecord<T>>,
    #[serde(skip)]
    snapshot_version: Version,
}

impl<T: EventSourced> EntityCore<T> {
    /// 创建新实体并记录 `Created` 事件，版本变为 1
    pub fn new(identity: Identity) -> DomainResult<Self> {
        identity.ensure_owned_by::<T>()?;
        let mut entity = Self::blank(identity);
        entity.record(StreamEvent::Created {
            created_at: Utc::now(),
        });
        Ok(entity)
    }

    fn blank(identity: Identity) -> Self {
        Self {
            identity,
            version: Version::new(),
            created_at: None,
            closed_at: None,
            state: T::default(),
            uncommitted: Vec::new(),
            snapshot_version: Version::new(),
        }
    }

    /// 从完整事件流重建实体（不产生未提交事件）
    pub fn restore(stream: EntityStream<T>) -> DomainResult<Self> {
        stream.identity().ensure_owned_by::<T>()?;
        let mut entity = Self::blank(stream.identity().clone());
        entity.replay(stream)?;
        Ok(entity)
    }

    /// 在当前状态上依序应用历史事件
    ///
    /// 序号必须从当前版本 + 1 开始连续，否则视为流损坏。
    pub(crate) fn replay(
        &mut self,
        records: impl IntoIterator<Item = EntityRecord<T>>,
    ) -> DomainResult<usize> {
        let mut applied = 0;
        for record in records {
            if self.is_closed() {
                return Err(DomainError::ClosedStream {
                    identity: self.identity.clone(),
                });
            }
            let expected = self.version.next();
            if record.sequence() != expected {
                return Err(DomainError::CorruptedStream {
                    identity: self.identity.clone(),
                    expected: expected.value(),
                    found: record.sequence().value(),
                });
            }
            self.apply_record(&record);
            applied += 1;
        }
        Ok(applied)
    }

    /// 记录业务事件
    pub fn raise(&mut self, event: T::Event) -> DomainResult<()> {
        self.ensure_open()?;
        self.record(StreamEvent::Applied(event));
        Ok(())
    }

    /// 关闭实体，之后不再接受任何事件
    pub fn close(&mut self) -> DomainResult<()> {
        self.ensure_open()?;
        self.record(StreamEvent::Closed {
            closed_at: Utc::now(),
        });
        Ok(())
    }

    /// 取出自上次提取以来产生的事件，缓冲随之清空
    pub fn extract_stream(&mut self) -> EntityStream<T> {
        let events = mem::take(&mut self.uncommitted);
        EventStream::new(
            self.identity.clone(),
            events,
            self.created_at.unwrap_or_else(Utc::now),
            self.closed_at,
        )
    }

    /// 持久化失败时把取出的事件放回缓冲
    pub(crate) fn restore_uncommitted(&mut self, stream: EntityStream<T>) {
        let mut events = stream.into_events();
        events.append(&mut self.uncommitted);
        self.uncommitted = events;
    }

    fn ensure_open(&self) -> DomainResult<()> {
        if self.is_closed() {
            return Err(DomainError::ClosedStream {
                identity: self.identity.clone(),
            });
        }
        Ok(())
    }

    fn record(&mut self, event: StreamEvent<T::Event>) {
        let record = EventRecord::new(self.version.next(), event);
        self.apply_record(&record);
        self.uncommitted.push(record);
    }

    fn apply_record(&mut self, record: &EntityRecord<T>) {
        match record.payload() {
            StreamEvent::Created { created_at } => self.created_at = Some(*created_at),
            StreamEvent::Closed { closed_at } => self.closed_at = Some(*closed_at),
            StreamEvent::Applied(event) => self.state.apply(event),
        }
        self.version = record.sequence();
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// 已持久化部分的版本
    pub fn committed_version(&self) -> Version {
        self.version.rewind(self.uncommitted.len())
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }

    pub fn state(&self) -> &T {
        &self.state
    }

    pub fn uncommitted(&self) -> &[EntityRecord<T>] {
        &self.uncommitted
    }

    pub fn has_uncommitted(&self) -> bool {
        !self.uncommitted.is_empty()
    }

    /// 最近一次快照（保存或加载）对应的版本
    pub fn snapshot_version(&self) -> Version {
        self.snapshot_version
    }

    pub(crate) fn mark_snapshot(&mut self, version: Version) {
        self.snapshot_version = version;
    }
}

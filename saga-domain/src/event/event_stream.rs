use super::EventRecord;
use crate::identity::Identity;
use crate::value_object::Version;
use chrono::{DateTime, Utc};
use std::ops::Deref;
use std::slice::Iter;
use std::vec::IntoIter;

/// 事件流：一个实体的有序事件记录及流级元数据
///
/// 既表示“自上次持久化以来新产生的事件”，也表示从存储加载回来的历史。
#[derive(Debug, Clone, PartialEq)]
pub struct EventStream<E> {
    identity: Identity,
    events: Vec<EventRecord<E>>,
    created_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

impl<E> EventStream<E> {
    pub fn new(
        identity: Identity,
        events: Vec<EventRecord<E>>,
        created_at: DateTime<Utc>,
        closed_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            identity,
            events,
            created_at,
            closed_at,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// 实体类型名（与标识的所属类型一致）
    pub fn entity_type(&self) -> &str {
        self.identity.owner_type()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }

    /// 获取事件列表的不可变引用
    pub fn events(&self) -> &[EventRecord<E>] {
        &self.events
    }

    /// 取出事件列表
    pub fn into_events(self) -> Vec<EventRecord<E>> {
        self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// 第一个事件的序号
    pub fn first_sequence(&self) -> Option<Version> {
        self.events.first().map(|e| e.sequence())
    }

    /// 最后一个事件的序号
    pub fn last_sequence(&self) -> Option<Version> {
        self.events.last().map(|e| e.sequence())
    }

    /// 迭代事件引用（不消费 EventStream）
    pub fn iter(&self) -> Iter<'_, EventRecord<E>> {
        self.events.iter()
    }
}

impl<E> IntoIterator for EventStream<E> {
    type Item = EventRecord<E>;
    type IntoIter = IntoIter<EventRecord<E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl<'a, E> IntoIterator for &'a EventStream<E> {
    type Item = &'a EventRecord<E>;
    type IntoIter = Iter<'a, EventRecord<E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

impl<E> Deref for EventStream<E> {
    type Target = [EventRecord<E>];

    fn deref(&self) -> &Self::Target {
        &self.events
    }
}

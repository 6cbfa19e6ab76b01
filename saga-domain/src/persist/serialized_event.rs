//! 事件持久化模型
//!
//! 定义事件记录与事件流在持久化层的标准形态（载荷为 JSON），
//! 以及与强类型 `EventRecord`/`EventStream` 之间的转换。
//!
use crate::{
    error::{DomainError, DomainResult},
    event::{DomainEvent, EventRecord, EventStream},
    identity::Identity,
    value_object::Version,
};
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct SerializedEventRecord {
    /// 记录唯一标识
    record_id: Uuid,
    /// 事件类型，重放时用于诊断与过滤
    event_type: String,
    /// 事件载荷版本
    event_version: usize,
    /// 流内序号（应用该事件后的实体版本）
    sequence: Version,
    /// 事件发生时间
    occurred_at: DateTime<Utc>,
    /// 事件载荷
    payload: Value,
}

impl SerializedEventRecord {
    pub fn record_id(&self) -> Uuid {
        self.record_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn event_version(&self) -> usize {
        self.event_version
    }

    pub fn sequence(&self) -> Version {
        self.sequence
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// 反序列化为强类型事件记录
    pub fn to_record<E: DomainEvent>(&self) -> DomainResult<EventRecord<E>> {
        let payload: E = serde_json::from_value(self.payload.clone())?;
        Ok(EventRecord::from_parts(
            self.record_id,
            self.sequence,
            self.occurred_at,
            payload,
        ))
    }
}

impl<E> TryFrom<&EventRecord<E>> for SerializedEventRecord
where
    E: DomainEvent,
{
    type Error = serde_json::Error;

    fn try_from(record: &EventRecord<E>) -> Result<Self, Self::Error> {
        Ok(SerializedEventRecord {
            record_id: record.record_id(),
            event_type: record.payload().event_type().to_string(),
            event_version: record.payload().event_version(),
            sequence: record.sequence(),
            occurred_at: record.occurred_at(),
            payload: serde_json::to_value(record.payload())?,
        })
    }
}

/// 持久化层的事件流：流头（标识、创建/关闭时间）+ 事件记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedEventStream {
    identity: Identity,
    created_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    events: Vec<SerializedEventRecord>,
}

impl SerializedEventStream {
    pub fn new(
        identity: Identity,
        created_at: DateTime<Utc>,
        closed_at: Option<DateTime<Utc>>,
        events: Vec<SerializedEventRecord>,
    ) -> Self {
        Self {
            identity,
            created_at,
            closed_at,
            events,
        }
    }

    /// 序列化强类型事件流
    pub fn from_stream<E: DomainEvent>(stream: &EventStream<E>) -> DomainResult<Self> {
        let events = stream
            .iter()
            .map(SerializedEventRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(
            stream.identity().clone(),
            stream.created_at(),
            stream.closed_at(),
            events,
        ))
    }

    /// 反序列化为强类型事件流，并校验序号连续递增
    pub fn into_stream<E: DomainEvent>(self) -> DomainResult<EventStream<E>> {
        let mut previous: Option<Version> = None;
        let mut events = Vec::with_capacity(self.events.len());
        for record in &self.events {
            if let Some(prev) = previous {
                if record.sequence() != prev.next() {
                    return Err(DomainError::CorruptedStream {
                        identity: self.identity.clone(),
                        expected: prev.next().value(),
                        found: record.sequence().value(),
                    });
                }
            }
            previous = Some(record.sequence());
            events.push(record.to_record::<E>()?);
        }
        Ok(EventStream::new(
            self.identity,
            events,
            self.created_at,
            self.closed_at,
        ))
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn entity_type(&self) -> &str {
        self.identity.owner_type()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    pub fn events(&self) -> &[SerializedEventRecord] {
        &self.events
    }

    pub fn into_events(self) -> Vec<SerializedEventRecord> {
        self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn first_sequence(&self) -> Option<Version> {
        self.events.first().map(|e| e.sequence())
    }

    pub fn last_sequence(&self) -> Option<Version> {
        self.events.last().map(|e| e.sequence())
    }
}

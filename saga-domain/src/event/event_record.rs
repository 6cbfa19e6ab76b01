use crate::value_object::Version;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 事件记录：事件载荷 + 在流内的序号 + 发生时间
///
/// 序号等于应用该事件之后实体的版本，在同一条流内严格连续递增。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord<E> {
    record_id: Uuid,
    sequence: Version,
    occurred_at: DateTime<Utc>,
    payload: E,
}

impl<E> EventRecord<E> {
    /// 记录一个刚发生的事件
    pub fn new(sequence: Version, payload: E) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            sequence,
            occurred_at: Utc::now(),
            payload,
        }
    }

    /// 从存储中还原记录
    pub fn from_parts(
        record_id: Uuid,
        sequence: Version,
        occurred_at: DateTime<Utc>,
        payload: E,
    ) -> Self {
        Self {
            record_id,
            sequence,
            occurred_at,
            payload,
        }
    }

    pub fn record_id(&self) -> Uuid {
        self.record_id
    }

    pub fn sequence(&self) -> Version {
        self.sequence
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

use crate::{
    entity::{EntityCore, EventSourced},
    error::{DomainError, DomainResult as Result},
    identity::Identity,
    value_object::Version,
};
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 实体快照：某一版本下实体的完整物化状态
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct SerializedSnapshot {
    identity: Identity,
    version: Version,
    payload: Value,
    created_at: DateTime<Utc>,
}

impl SerializedSnapshot {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn entity_type(&self) -> &str {
        self.identity.owner_type()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// 将快照反序列化为实体，快照版本随之记录在实体上
    pub fn to_entity<T>(&self) -> Result<EntityCore<T>>
    where
        T: EventSourced,
    {
        if T::TYPE != self.entity_type() {
            return Err(DomainError::TypeMismatch {
                expected: T::TYPE.to_string(),
                found: self.entity_type().to_string(),
            });
        }

        let mut entity: EntityCore<T> = serde_json::from_value(self.payload.clone())?;
        if entity.identity() != &self.identity || entity.version() != self.version {
            return Err(DomainError::CorruptedStream {
                identity: self.identity.clone(),
                expected: self.version.value(),
                found: entity.version().value(),
            });
        }
        entity.mark_snapshot(self.version);
        Ok(entity)
    }

    /// 从实体创建快照（不包含未提交事件）
    pub fn from_entity<T>(entity: &EntityCore<T>) -> Result<Self>
    where
        T: EventSourced,
    {
        Ok(Self {
            identity: entity.identity().clone(),
            version: entity.version(),
            payload: serde_json::to_value(entity)?,
            created_at: Utc::now(),
        })
    }
}

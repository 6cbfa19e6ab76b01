use super::SagaStatus;
use crate::entity::EventSourced;
use crate::event::DomainEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Saga 流内事件：状态机事件 + 业务事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum SagaEvent<E> {
    Started {
        expire_at: DateTime<Utc>,
    },
    StatusChanged {
        previous: SagaStatus,
        status: SagaStatus,
        reason: Option<String>,
        changed_at: DateTime<Utc>,
    },
    Applied(E),
}

impl<E: DomainEvent> DomainEvent for SagaEvent<E> {
    fn event_type(&self) -> &'static str {
        match self {
            SagaEvent::Started { .. } => "SagaStarted",
            SagaEvent::StatusChanged { .. } => "SagaStatusChanged",
            SagaEvent::Applied(event) => event.event_type(),
        }
    }

    fn event_version(&self) -> usize {
        match self {
            SagaEvent::Applied(event) => event.event_version(),
            _ => 1,
        }
    }
}

/// Saga 状态：状态机字段 + 业务数据 `S`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SagaState<S> {
    status: SagaStatus,
    expire_at: Option<DateTime<Utc>>,
    status_changed_at: Option<DateTime<Utc>>,
    fail_reason: Option<String>,
    data: S,
}

impl<S> SagaState<S> {
    pub fn status(&self) -> SagaStatus {
        self.status
    }

    pub fn expire_at(&self) -> Option<DateTime<Utc>> {
        self.expire_at
    }

    pub fn status_changed_at(&self) -> Option<DateTime<Utc>> {
        self.status_changed_at
    }

    pub fn fail_reason(&self) -> Option<&str> {
        self.fail_reason.as_deref()
    }

    pub fn data(&self) -> &S {
        &self.data
    }

    /// 截止 `now` 是否已超过过期时间
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expire_at.is_some_and(|expire_at| expire_at <= now)
    }
}

impl<S: EventSourced> EventSourced for SagaState<S> {
    const TYPE: &'static str = S::TYPE;
    type Event = SagaEvent<S::Event>;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SagaEvent::Started { expire_at } => self.expire_at = Some(*expire_at),
            SagaEvent::StatusChanged {
                status,
                reason,
                changed_at,
                ..
            } => {
                self.status = *status;
                self.status_changed_at = Some(*changed_at);
                if *status == SagaStatus::Failed {
                    self.fail_reason = reason.clone();
                }
            }
            SagaEvent::Applied(event) => self.data.apply(event),
        }
    }
}

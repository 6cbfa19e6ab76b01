use super::DomainEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 流内事件：框架生命周期事件 + 业务事件
///
/// 每条流以 `Created` 开始，`Closed` 之后不再接受任何事件。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum StreamEvent<E> {
    Created { created_at: DateTime<Utc> },
    Closed { closed_at: DateTime<Utc> },
    Applied(E),
}

impl<E> StreamEvent<E> {
    /// 是否为框架生命周期事件
    pub fn is_lifecycle(&self) -> bool {
        !matches!(self, StreamEvent::Applied(_))
    }

    /// 业务事件载荷
    pub fn as_applied(&self) -> Option<&E> {
        match self {
            StreamEvent::Applied(event) => Some(event),
            _ => None,
        }
    }
}

impl<E: DomainEvent> DomainEvent for StreamEvent<E> {
    fn event_type(&self) -> &'static str {
        match self {
            StreamEvent::Created { .. } => "EntityCreated",
            StreamEvent::Closed { .. } => "EntityClosed",
            StreamEvent::Applied(event) => event.event_type(),
        }
    }

    fn event_version(&self) -> usize {
        match self {
            StreamEvent::Applied(event) => event.event_version(),
            _ => 1,
        }
    }
}

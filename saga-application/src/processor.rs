//! 消息处理器（MessageProcessor）
//!
//! 声明处理器订阅的消息类型，并对单条入站消息给出处理结果。
//!
use crate::context::Envelope;
use crate::error::ProcessingError;
use async_trait::async_trait;
use saga_domain::identity::Identity;
use saga_domain::message::Message;
use std::any::TypeId;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandledMessages {
    One(TypeId),
    Many(Vec<TypeId>),
    All,
}

impl HandledMessages {
    pub fn of<M: Message>() -> Self {
        HandledMessages::One(TypeId::of::<M>())
    }

    pub fn matches(&self, type_id: TypeId) -> bool {
        match self {
            HandledMessages::One(t) => *t == type_id,
            HandledMessages::Many(ts) => ts.contains(&type_id),
            HandledMessages::All => true,
        }
    }
}

/// 单条消息的处理结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcessingOutcome {
    /// 已处理：提交的事件数与投递的命令数
    Handled { events: usize, commands: usize },
    /// 目标 Saga 不存在，消息按空操作确认
    SagaNotFound { identity: Identity },
    /// 处理器不关心该消息
    Ignored,
}

impl ProcessingOutcome {
    pub fn is_handled(&self) -> bool {
        matches!(self, ProcessingOutcome::Handled { .. })
    }
}

#[async_trait]
pub trait MessageProcessor: Send + Sync {
    /// 处理器名称（用于日志与失败报告）
    fn processor_name(&self) -> &str;
    /// 返回该处理器订阅的消息类型
    fn handled_messages(&self) -> HandledMessages;
    /// 处理消息
    async fn process(&self, envelope: &Envelope) -> Result<ProcessingOutcome, ProcessingError>;
}

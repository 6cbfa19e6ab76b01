//! 消息（Message）
//!
//! 进出系统的命令与事件。`Message` 是带稳定名称的具体类型，
//! `AnyMessage` 是其对象安全的擦除形式，用于在路由与投递环节
//! 以 `Arc<dyn AnyMessage>` 传递，并按 `TypeId` 还原为具体类型。
//!
use serde::Serialize;
use std::any::{Any, TypeId};
use std::fmt::Debug;

/// 可路由、可投递的消息，通常由 `#[message]` 宏生成
pub trait Message: Serialize + Debug + Send + Sync + 'static {
    /// 稳定的消息名称（用于日志与外部传输）
    const NAME: &'static str;
}

/// 类型擦除的消息
pub trait AnyMessage: Debug + Send + Sync + 'static {
    fn message_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    /// 具体消息类型的 TypeId
    fn message_type_id(&self) -> TypeId {
        self.as_any().type_id()
    }

    /// 序列化为 JSON，供标识解析与外部传输使用
    fn to_json(&self) -> serde_json::Result<serde_json::Value>;
}

impl<M: Message> AnyMessage for M {
    fn message_name(&self) -> &'static str {
        M::NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

impl dyn AnyMessage {
    /// 还原为具体消息类型
    pub fn downcast_ref<M: Message>(&self) -> Option<&M> {
        self.as_any().downcast_ref::<M>()
    }

    pub fn is<M: Message>(&self) -> bool {
        self.message_type_id() == TypeId::of::<M>()
    }
}

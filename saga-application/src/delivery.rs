//! 出站投递（OutboundDelivery）
//!
//! Saga 在处理消息时发出的命令，在事件持久化成功之后经由投递端口发送。
//! 投递端口只关心“发出去”，路由、序列化与重试由具体传输实现负责。
//!
use crate::context::MessageContext;
use async_trait::async_trait;
use bon::Builder;
use saga_domain::error::DomainResult as Result;
use saga_domain::message::AnyMessage;
use std::sync::Arc;
use tokio::sync::Mutex;

/// 投递选项
#[derive(Builder, Clone, Debug, Default, PartialEq)]
pub struct DeliveryOptions {
    /// 目标地址（队列/主题），缺省由传输实现按消息类型决定
    destination: Option<String>,
    /// 出站消息的上下文
    #[builder(default)]
    context: MessageContext,
}

impl DeliveryOptions {
    /// 由入站消息引发的投递：继承关联标识并以入站消息为因果
    pub fn caused_by(inbound: &MessageContext) -> Self {
        Self::builder().context(inbound.caused()).build()
    }

    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    pub fn context(&self) -> &MessageContext {
        &self.context
    }
}

#[async_trait]
pub trait OutboundDelivery: Send + Sync {
    async fn send(&self, message: Arc<dyn AnyMessage>, options: DeliveryOptions) -> Result<()>;
}

#[async_trait]
impl<T> OutboundDelivery for Arc<T>
where
    T: OutboundDelivery + ?Sized,
{
    async fn send(&self, message: Arc<dyn AnyMessage>, options: DeliveryOptions) -> Result<()> {
        (**self).send(message, options).await
    }
}

/// 已投递的消息
#[derive(Clone, Debug)]
pub struct DeliveredMessage {
    pub message: Arc<dyn AnyMessage>,
    pub options: DeliveryOptions,
}

/// 记录所有投递的内存实现，用于测试与本地编排
#[derive(Default)]
pub struct InMemoryDelivery {
    sent: Mutex<Vec<DeliveredMessage>>,
}

impl InMemoryDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<DeliveredMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_names(&self) -> Vec<&'static str> {
        self.sent
            .lock()
            .await
            .iter()
            .map(|d| d.message.message_name())
            .collect()
    }

    pub async fn drain(&self) -> Vec<DeliveredMessage> {
        std::mem::take(&mut *self.sent.lock().await)
    }
}

#[async_trait]
impl OutboundDelivery for InMemoryDelivery {
    async fn send(&self, message: Arc<dyn AnyMessage>, options: DeliveryOptions) -> Result<()> {
        self.sent
            .lock()
            .await
            .push(DeliveredMessage { message, options });
        Ok(())
    }
}

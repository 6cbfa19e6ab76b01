//! 入站传输（InboundTransport）
//!
//! 调度循环从传输端订阅消息流，处理完成后确认或拒绝；
//! 重投策略由具体传输实现决定。
//!
use crate::context::Envelope;
use crate::error::AppError;
use async_trait::async_trait;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use saga_domain::message::Message;
use tokio::sync::{Mutex, broadcast};
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

#[async_trait]
pub trait InboundTransport: Send + Sync {
    /// 订阅入站消息流
    async fn subscribe(&self) -> BoxStream<'static, Result<Envelope, AppError>>;
    /// 消息已处理（成功或按空操作处理）
    async fn acknowledge(&self, envelope: &Envelope) -> Result<(), AppError>;
    /// 消息处理失败
    async fn reject(&self, envelope: &Envelope, reason: &str) -> Result<(), AppError>;
}

/// 基于广播通道的内存传输，记录确认与拒绝结果
pub struct InMemoryTransport {
    tx: broadcast::Sender<Envelope>,
    acknowledged: Mutex<Vec<Uuid>>,
    rejected: Mutex<Vec<(Uuid, String)>>,
}

impl InMemoryTransport {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            acknowledged: Mutex::new(Vec::new()),
            rejected: Mutex::new(Vec::new()),
        }
    }

    pub fn publish(&self, envelope: Envelope) -> Result<Uuid, AppError> {
        let message_id = envelope.message_id();
        self.tx.send(envelope).map_err(|_| AppError::Transport {
            reason: "no active subscriber".to_string(),
        })?;
        Ok(message_id)
    }

    pub fn publish_message<M: Message>(&self, message: M) -> Result<Uuid, AppError> {
        self.publish(Envelope::new(message))
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub async fn acknowledged(&self) -> Vec<Uuid> {
        self.acknowledged.lock().await.clone()
    }

    pub async fn rejected(&self) -> Vec<(Uuid, String)> {
        self.rejected.lock().await.clone()
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl InboundTransport for InMemoryTransport {
    async fn subscribe(&self) -> BoxStream<'static, Result<Envelope, AppError>> {
        let rx = self.tx.subscribe();
        Box::pin(BroadcastStream::new(rx).map(|r| {
            r.map_err(|e| AppError::Transport {
                reason: e.to_string(),
            })
        }))
    }

    async fn acknowledge(&self, envelope: &Envelope) -> Result<(), AppError> {
        self.acknowledged.lock().await.push(envelope.message_id());
        Ok(())
    }

    async fn reject(&self, envelope: &Envelope, reason: &str) -> Result<(), AppError> {
        self.rejected
            .lock()
            .await
            .push((envelope.message_id(), reason.to_string()));
        Ok(())
    }
}

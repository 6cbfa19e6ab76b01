use bon::Builder;
use saga_domain::message::{AnyMessage, Message};
use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// 消息上下文（Message Context）
///
/// 承载一条消息在系统内流转时的横切信息：
/// - `message_id`：本条消息的唯一标识；
/// - `correlation_id`：同一业务流程内所有消息共享的关联标识；
/// - `causation_id`：直接导致本条消息产生的上游消息标识；
/// - `headers`：传输层透传的附加信息。
///
/// 由 Saga 发出的命令会继承关联标识，并以当前消息的 `message_id` 作为因果标识。
///
/// ```rust
/// use saga_application::context::MessageContext;
///
/// let inbound = MessageContext::builder()
///     .correlation_id("cor-123".to_string())
///     .build();
/// let outbound = inbound.caused();
///
/// assert_eq!(outbound.correlation_id(), Some("cor-123"));
/// assert_eq!(outbound.causation_id(), Some(inbound.message_id().to_string().as_str()));
/// ```
#[derive(Builder, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageContext {
    #[builder(default = Uuid::new_v4())]
    message_id: Uuid,
    correlation_id: Option<String>,
    causation_id: Option<String>,
    #[builder(default)]
    headers: BTreeMap<String, String>,
}

impl Default for MessageContext {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl MessageContext {
    pub fn message_id(&self) -> Uuid {
        self.message_id
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn causation_id(&self) -> Option<&str> {
        self.causation_id.as_deref()
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// 由本条消息引发的下游消息上下文
    ///
    /// 没有关联标识时以本条消息的标识开启新的关联链。
    pub fn caused(&self) -> MessageContext {
        let message_id = self.message_id.to_string();
        MessageContext::builder()
            .correlation_id(
                self.correlation_id
                    .clone()
                    .unwrap_or_else(|| message_id.clone()),
            )
            .causation_id(message_id)
            .build()
    }
}

/// 消息信封：类型擦除的消息 + 上下文
#[derive(Clone, Debug)]
pub struct Envelope {
    message: Arc<dyn AnyMessage>,
    context: MessageContext,
}

impl Envelope {
    pub fn new<M: Message>(message: M) -> Self {
        Self::with_context(message, MessageContext::default())
    }

    pub fn with_context<M: Message>(message: M, context: MessageContext) -> Self {
        Self::from_arc(Arc::new(message), context)
    }

    pub fn from_arc(message: Arc<dyn AnyMessage>, context: MessageContext) -> Self {
        Self { message, context }
    }

    pub fn message(&self) -> &Arc<dyn AnyMessage> {
        &self.message
    }

    pub fn message_name(&self) -> &'static str {
        self.message.message_name()
    }

    pub fn message_type_id(&self) -> TypeId {
        self.message.message_type_id()
    }

    pub fn context(&self) -> &MessageContext {
        &self.context
    }

    pub fn message_id(&self) -> Uuid {
        self.context.message_id
    }
}

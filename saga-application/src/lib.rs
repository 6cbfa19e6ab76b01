//! Saga 应用层（saga-application）
//!
//! 负责把入站消息驱动到领域层的 Saga 上：
//! - `context`：消息上下文与信封，传递关联/因果标识
//! - `metadata`：Saga 元数据，从消息中解析 Saga 标识并计算过期时间
//! - `processor` / `saga_processor`：单条消息的处理流程与结果
//! - `dispatcher`：按消息类型路由、隔离失败，并作为长驻任务消费传输端
//! - `transport` / `delivery`：入站传输与出站投递端口及其内存实现
//!
pub mod context;
pub mod delivery;
pub mod dispatcher;
pub mod error;
pub mod metadata;
pub mod processor;
pub mod saga_processor;
pub mod transport;

pub use context::{Envelope, MessageContext};
pub use delivery::{DeliveryOptions, InMemoryDelivery, OutboundDelivery};
pub use dispatcher::{DispatchReport, DispatcherConfig, DispatcherHandle, MessageDispatcher};
pub use error::{AppError, ProcessingError, ProcessingStage};
pub use metadata::{IdentityFactories, SagaMetadata, SagaMetadataConfig, SagaMetadataRegistry};
pub use processor::{HandledMessages, MessageProcessor, ProcessingOutcome};
pub use saga_processor::SagaProcessor;
pub use transport::{InMemoryTransport, InboundTransport};

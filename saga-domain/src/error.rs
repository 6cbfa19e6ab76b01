//! 领域层统一错误定义
//!
//! 覆盖实体生命周期、持久化（乐观并发/流唯一性）、消息标识解析与存储适配层，
//! 各实现层统一转换为 `DomainError` 后向上传播，由分发处理器决定消息的最终处置。
//!
use crate::identity::Identity;
use crate::persist::sql::StorageError;
use crate::saga::SagaStatus;
use thiserror::Error;

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DomainError {
    // --- 序列化 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    #[error("type mismatch: expected={expected}, found={found}")]
    TypeMismatch { expected: String, found: String },

    // --- 标识 ---
    #[error("invalid identity: {reason}")]
    InvalidIdentity { reason: String },
    #[error("identity {identity} cannot be used for entity type {expected}")]
    IdentityMismatch { identity: Identity, expected: String },

    // --- 实体生命周期 ---
    #[error("event stream {identity} is closed")]
    ClosedStream { identity: Identity },
    #[error("saga {identity} is closed with status {status}")]
    SagaClosed { identity: Identity, status: SagaStatus },
    #[error("corrupted stream {identity}: expected sequence {expected}, found {found}")]
    CorruptedStream {
        identity: Identity,
        expected: usize,
        found: usize,
    },

    // --- 持久化 ---
    #[error("event stream {identity} not found")]
    StreamNotFound { identity: Identity },
    #[error("event stream {identity} already exists")]
    NonUniqueStreamId { identity: Identity },
    #[error("concurrent modification of {identity}: expected version {expected}")]
    ConcurrentModification { identity: Identity, expected: usize },
    #[error("storage interaction failed: {reason}")]
    StorageInteractingFailed { reason: String },
    #[error("storage connection failed: {reason}")]
    ConnectionFailed { reason: String },

    // --- 消息 ---
    #[error("cannot resolve identifier of {message_type} from property '{property}': {reason}")]
    IdentifierResolution {
        message_type: String,
        property: String,
        reason: String,
    },
}

/// 统一 Result 类型别名
pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// 存储适配层错误的兜底转换。
    /// 唯一约束冲突的业务含义取决于调用点，由事件存储自行映射，这里仅作通用处理。
    pub fn storage(err: StorageError) -> Self {
        match err {
            StorageError::ConnectionFailed { reason } => DomainError::ConnectionFailed { reason },
            StorageError::UniqueConstraintViolation { reason }
            | StorageError::InteractingFailed { reason } => {
                DomainError::StorageInteractingFailed { reason }
            }
        }
    }

    /// 是否为“流不存在”（分发处理器据此把消息视为无操作）
    pub fn is_stream_not_found(&self) -> bool {
        matches!(self, DomainError::StreamNotFound { .. })
    }

    /// 是否为实体已关闭导致的业务拒绝
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            DomainError::ClosedStream { .. } | DomainError::SagaClosed { .. }
        )
    }
}

impl From<StorageError> for DomainError {
    fn from(err: StorageError) -> Self {
        DomainError::storage(err)
    }
}

impl From<uuid::Error> for DomainError {
    fn from(err: uuid::Error) -> Self {
        DomainError::StorageInteractingFailed {
            reason: err.to_string(),
        }
    }
}

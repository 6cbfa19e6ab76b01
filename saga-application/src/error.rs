use saga_domain::error::DomainError;
use saga_domain::identity::Identity;
use std::fmt;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("domain: {0}")]
    Domain(#[from] DomainError),

    #[error("configuration: {0}")]
    Configuration(String),

    #[error("unknown identifier type: {0}")]
    UnknownIdentifierType(String),

    #[error("saga metadata not found: {0}")]
    MetadataNotFound(String),

    #[error("handler already registered: message={message}")]
    AlreadyRegistered { message: &'static str },

    #[error("transport: {reason}")]
    Transport { reason: String },
}

/// 消息处理所处的阶段（出错时用于定位）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessingStage {
    /// 从消息中解析 Saga 标识
    IdentityResolution,
    /// 加载 Saga
    Loading,
    /// 执行处理函数
    Mutation,
    /// 保存事件
    Persistence,
    /// 投递出站命令
    Delivery,
}

impl ProcessingStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStage::IdentityResolution => "identity_resolution",
            ProcessingStage::Loading => "loading",
            ProcessingStage::Mutation => "mutation",
            ProcessingStage::Persistence => "persistence",
            ProcessingStage::Delivery => "delivery",
        }
    }
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单条消息处理失败：阶段 + 消息类型 + Saga 标识（已解析时）+ 原因
#[derive(thiserror::Error, Debug)]
#[error("{stage} of {message_type} failed: {source}")]
pub struct ProcessingError {
    stage: ProcessingStage,
    message_type: &'static str,
    identity: Option<Identity>,
    source: DomainError,
}

impl ProcessingError {
    pub fn new(
        stage: ProcessingStage,
        message_type: &'static str,
        identity: Option<Identity>,
        source: DomainError,
    ) -> Self {
        Self {
            stage,
            message_type,
            identity,
            source,
        }
    }

    pub fn stage(&self) -> ProcessingStage {
        self.stage
    }

    pub fn message_type(&self) -> &'static str {
        self.message_type
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn domain_error(&self) -> &DomainError {
        &self.source
    }

    pub fn into_domain_error(self) -> DomainError {
        self.source
    }
}

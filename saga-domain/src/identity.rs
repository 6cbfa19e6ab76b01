//! 实体标识
//!
//! `Identity` 是存储层使用的弱类型标识（值 + 所属实体类型），
//! `EntityId` 是业务代码使用的强类型标识，通常由 `#[entity_id(owner = ...)]` 生成。
//!
use crate::entity::EventSourced;
use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 实体标识：值 + 所属实体类型
///
/// 同一个值在不同实体类型下代表不同的流，存储层以二者共同作为主键。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    value: String,
    owner_type: String,
}

impl Identity {
    /// 创建标识，拒绝空值
    pub fn new(value: impl Into<String>, owner_type: impl Into<String>) -> DomainResult<Self> {
        let identity = Self {
            value: value.into(),
            owner_type: owner_type.into(),
        };
        identity.validate()?;
        Ok(identity)
    }

    /// 为指定实体类型创建标识
    pub fn of<T: EventSourced>(value: impl Into<String>) -> DomainResult<Self> {
        Self::new(value, T::TYPE)
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn owner_type(&self) -> &str {
        &self.owner_type
    }

    /// 是否属于实体类型 `T`
    pub fn is_owned_by<T: EventSourced>(&self) -> bool {
        self.owner_type == T::TYPE
    }

    /// 校验标识属于实体类型 `T`，否则返回 `IdentityMismatch`
    pub fn ensure_owned_by<T: EventSourced>(&self) -> DomainResult<()> {
        if self.is_owned_by::<T>() {
            Ok(())
        } else {
            Err(DomainError::IdentityMismatch {
                identity: self.clone(),
                expected: T::TYPE.to_string(),
            })
        }
    }
}

impl ValueObject for Identity {
    type Error = DomainError;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.value.trim().is_empty() {
            return Err(DomainError::InvalidIdentity {
                reason: "identity value must not be empty".to_string(),
            });
        }
        if self.owner_type.trim().is_empty() {
            return Err(DomainError::InvalidIdentity {
                reason: format!("owner type of '{}' must not be empty", self.value),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner_type, self.value)
    }
}

/// 强类型实体标识
///
/// 每种标识绑定唯一的实体类型，转换为 `Identity` 时自动带上实体类型名。
pub trait EntityId: Clone + fmt::Display + Send + Sync + 'static {
    /// 标识所属的实体类型
    type Owner: EventSourced;

    fn from_value(value: String) -> Self;

    fn as_str(&self) -> &str;

    fn identity(&self) -> DomainResult<Identity> {
        Identity::new(self.as_str(), <Self::Owner as EventSourced>::TYPE)
    }
}

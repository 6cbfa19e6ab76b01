//! Saga 元数据
//!
//! 描述一类 Saga 如何从入站消息中找到自己的实例：
//! 消息中哪个属性携带标识、标识属于哪种类型、实例多久过期。
//! 元数据在启动时由配置加载并登记到注册表，处理期间只读。
//!
use crate::error::AppError;
use chrono::{DateTime, TimeDelta, Utc};
use saga_domain::entity::EventSourced;
use saga_domain::error::{DomainError, DomainResult};
use saga_domain::identity::{EntityId, Identity};
use saga_domain::message::AnyMessage;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// 由原始标识值构造 Saga 标识
pub type IdentityFactory = fn(&str) -> DomainResult<Identity>;

fn build_identity<I: EntityId>(value: &str) -> DomainResult<Identity> {
    I::from_value(value.to_owned()).identity()
}

/// 类型名的最后一段，例如 `app::ids::OrderSagaId` -> `OrderSagaId`
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

#[derive(Clone, Debug)]
pub struct SagaMetadata {
    saga_type: String,
    identifier_type: String,
    containing_identifier_property: String,
    expire_after: TimeDelta,
    identity_factory: IdentityFactory,
}

impl SagaMetadata {
    /// 以强类型标识 `I` 描述其所属的 Saga
    pub fn for_id<I: EntityId>(
        containing_identifier_property: impl Into<String>,
        expire_after: TimeDelta,
    ) -> Self {
        Self {
            saga_type: <I::Owner as EventSourced>::TYPE.to_string(),
            identifier_type: short_type_name::<I>().to_string(),
            containing_identifier_property: containing_identifier_property.into(),
            expire_after,
            identity_factory: build_identity::<I>,
        }
    }

    pub fn saga_type(&self) -> &str {
        &self.saga_type
    }

    pub fn identifier_type(&self) -> &str {
        &self.identifier_type
    }

    pub fn containing_identifier_property(&self) -> &str {
        &self.containing_identifier_property
    }

    pub fn expire_after(&self) -> TimeDelta {
        self.expire_after
    }

    /// 新实例的过期时间
    pub fn expire_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.expire_after)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// 从消息中解析 Saga 标识
    ///
    /// 属性支持以 `.` 分隔的嵌套路径；属性缺失、为空或不是字符串/数字时
    /// 返回 `IdentifierResolution`。
    pub fn resolve_identity(&self, message: &dyn AnyMessage) -> DomainResult<Identity> {
        let property = self.containing_identifier_property.as_str();
        let failure = |reason: String| DomainError::IdentifierResolution {
            message_type: message.message_name().to_string(),
            property: property.to_string(),
            reason,
        };

        let payload = message
            .to_json()
            .map_err(|err| failure(format!("message is not serializable: {err}")))?;

        let value = property
            .split('.')
            .try_fold(&payload, |current, key| current.get(key))
            .ok_or_else(|| failure("property is absent".to_string()))?;

        let raw = match value {
            Value::String(s) if s.trim().is_empty() => {
                return Err(failure("property is empty".to_string()));
            }
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Null => return Err(failure("property is null".to_string())),
            other => return Err(failure(format!("unsupported identifier value {other}"))),
        };

        (self.identity_factory)(&raw).map_err(|err| failure(err.to_string()))
    }
}

/// 解析形如 `+1 day`、`2 hours`、`+30 minutes` 的过期时间修饰
pub fn parse_expire_modifier(modifier: &str) -> Result<TimeDelta, AppError> {
    let invalid = || AppError::Configuration(format!("invalid expire modifier '{modifier}'"));

    let mut parts = modifier.split_whitespace();
    let (Some(amount), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };
    let amount: i64 = amount
        .strip_prefix('+')
        .unwrap_or(amount)
        .parse()
        .map_err(|_| invalid())?;
    if amount <= 0 {
        return Err(invalid());
    }

    let delta = match unit.to_ascii_lowercase().trim_end_matches('s') {
        "second" | "sec" => TimeDelta::try_seconds(amount),
        "minute" | "min" => TimeDelta::try_minutes(amount),
        "hour" => TimeDelta::try_hours(amount),
        "day" => TimeDelta::try_days(amount),
        "week" => TimeDelta::try_weeks(amount),
        _ => None,
    };
    delta.ok_or_else(invalid)
}

/// 配置中的一条 Saga 元数据
#[derive(Clone, Debug, Deserialize)]
pub struct SagaMetadataConfig {
    pub saga_type: String,
    pub identifier_type: String,
    pub containing_identifier_property: String,
    #[serde(default = "default_expire_modifier")]
    pub expire_date_modifier: String,
}

fn default_expire_modifier() -> String {
    "+1 day".to_string()
}

/// 标识类型名 -> 标识构造函数
#[derive(Clone, Debug, Default)]
pub struct IdentityFactories {
    by_type: HashMap<String, (String, IdentityFactory)>,
}

impl IdentityFactories {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以类型名（最后一段）登记强类型标识
    pub fn register<I: EntityId>(mut self) -> Self {
        self.by_type.insert(
            short_type_name::<I>().to_string(),
            (
                <I::Owner as EventSourced>::TYPE.to_string(),
                build_identity::<I>,
            ),
        );
        self
    }

    fn get(&self, identifier_type: &str) -> Option<&(String, IdentityFactory)> {
        self.by_type.get(identifier_type)
    }
}

/// Saga 类型 -> 元数据
#[derive(Clone, Debug, Default)]
pub struct SagaMetadataRegistry {
    by_saga: HashMap<String, SagaMetadata>,
}

impl SagaMetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 由配置构建注册表，标识类型必须已在 `factories` 中登记且与 Saga 类型一致
    pub fn from_config(
        configs: &[SagaMetadataConfig],
        factories: &IdentityFactories,
    ) -> Result<Self, AppError> {
        let mut registry = Self::new();
        for config in configs {
            let Some((owner_type, factory)) = factories.get(&config.identifier_type) else {
                return Err(AppError::UnknownIdentifierType(
                    config.identifier_type.clone(),
                ));
            };
            if owner_type != &config.saga_type {
                return Err(AppError::Configuration(format!(
                    "identifier type {} belongs to {owner_type}, not {}",
                    config.identifier_type, config.saga_type
                )));
            }
            registry.insert(SagaMetadata {
                saga_type: config.saga_type.clone(),
                identifier_type: config.identifier_type.clone(),
                containing_identifier_property: config.containing_identifier_property.clone(),
                expire_after: parse_expire_modifier(&config.expire_date_modifier)?,
                identity_factory: *factory,
            })?;
        }
        Ok(registry)
    }

    pub fn insert(&mut self, metadata: SagaMetadata) -> Result<(), AppError> {
        if self.by_saga.contains_key(metadata.saga_type()) {
            return Err(AppError::Configuration(format!(
                "duplicate metadata for saga {}",
                metadata.saga_type()
            )));
        }
        self.by_saga
            .insert(metadata.saga_type().to_string(), metadata);
        Ok(())
    }

    pub fn get(&self, saga_type: &str) -> Option<&SagaMetadata> {
        self.by_saga.get(saga_type)
    }

    pub fn for_saga<S: EventSourced>(&self) -> Result<&SagaMetadata, AppError> {
        self.get(S::TYPE)
            .ok_or_else(|| AppError::MetadataNotFound(S::TYPE.to_string()))
    }

    pub fn len(&self) -> usize {
        self.by_saga.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_saga.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saga_macros::{domain_event, entity_id, message};
    use serde::{Deserialize, Serialize};

    #[domain_event]
    enum CheckoutEvent {
        Opened,
    }

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    struct CheckoutSaga;

    impl EventSourced for CheckoutSaga {
        const TYPE: &'static str = "checkout_saga";
        type Event = CheckoutEvent;

        fn apply(&mut self, _event: &Self::Event) {}
    }

    #[entity_id(owner = CheckoutSaga)]
    struct CheckoutId(String);

    #[message]
    struct CartSubmitted {
        key: String,
    }

    #[message]
    struct PaymentCaptured {
        payment: Payment,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Payment {
        checkout: Option<String>,
        attempt: u32,
    }

    fn metadata(property: &str) -> SagaMetadata {
        SagaMetadata::for_id::<CheckoutId>(property, TimeDelta::days(1))
    }

    #[test]
    fn resolves_identity_from_top_level_property() {
        let message = CartSubmitted { key: "abc".into() };

        let identity = metadata("key").resolve_identity(&message).unwrap();
        assert_eq!(identity.value(), "abc");
        assert_eq!(identity.owner_type(), "checkout_saga");
    }

    #[test]
    fn resolves_identity_from_nested_property() {
        let message = PaymentCaptured {
            payment: Payment {
                checkout: Some("c-9".into()),
                attempt: 2,
            },
        };

        let identity = metadata("payment.checkout")
            .resolve_identity(&message)
            .unwrap();
        assert_eq!(identity.value(), "c-9");

        let by_number = metadata("payment.attempt")
            .resolve_identity(&message)
            .unwrap();
        assert_eq!(by_number.value(), "2");
    }

    #[test]
    fn missing_or_empty_property_fails_resolution() {
        let message = CartSubmitted { key: " ".into() };
        for property in ["key", "unknown", "key.inner"] {
            let err = metadata(property).resolve_identity(&message).unwrap_err();
            assert!(
                matches!(err, DomainError::IdentifierResolution { ref message_type, .. } if message_type == "CartSubmitted"),
                "{property}: {err}"
            );
        }

        let absent = PaymentCaptured {
            payment: Payment {
                checkout: None,
                attempt: 1,
            },
        };
        assert!(
            metadata("payment.checkout")
                .resolve_identity(&absent)
                .is_err()
        );
    }

    #[test]
    fn parses_expire_modifiers() {
        assert_eq!(parse_expire_modifier("+1 day").unwrap(), TimeDelta::days(1));
        assert_eq!(parse_expire_modifier("2 hours").unwrap(), TimeDelta::hours(2));
        assert_eq!(
            parse_expire_modifier("+30 Minutes").unwrap(),
            TimeDelta::minutes(30)
        );
        assert_eq!(parse_expire_modifier("+1 week").unwrap(), TimeDelta::weeks(1));

        for invalid in ["", "tomorrow", "+0 day", "-1 day", "+1 fortnight", "+1 day later"] {
            assert!(parse_expire_modifier(invalid).is_err(), "{invalid}");
        }
    }

    #[test]
    fn registry_from_config() {
        let configs: Vec<SagaMetadataConfig> = serde_json::from_value(serde_json::json!([
            {
                "saga_type": "checkout_saga",
                "identifier_type": "CheckoutId",
                "containing_identifier_property": "key",
                "expire_date_modifier": "+2 days"
            }
        ]))
        .unwrap();
        let factories = IdentityFactories::new().register::<CheckoutId>();

        let registry = SagaMetadataRegistry::from_config(&configs, &factories).unwrap();
        let metadata = registry.for_saga::<CheckoutSaga>().unwrap();
        assert_eq!(metadata.identifier_type(), "CheckoutId");
        assert_eq!(metadata.expire_after(), TimeDelta::days(2));

        let identity = metadata
            .resolve_identity(&CartSubmitted { key: "k-1".into() })
            .unwrap();
        assert_eq!(identity, CheckoutId::new("k-1").identity().unwrap());
    }

    #[test]
    fn registry_rejects_unknown_identifier_type() {
        let configs = vec![SagaMetadataConfig {
            saga_type: "checkout_saga".into(),
            identifier_type: "OrderId".into(),
            containing_identifier_property: "key".into(),
            expire_date_modifier: default_expire_modifier(),
        }];

        let err = SagaMetadataRegistry::from_config(&configs, &IdentityFactories::new())
            .unwrap_err();
        assert!(matches!(err, AppError::UnknownIdentifierType(t) if t == "OrderId"));
    }
}

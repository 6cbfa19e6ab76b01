//! Saga 提供者
//!
//! 在事件溯源提供者之上处理 Saga 的开启、获取与保存。
//!
use crate::{
    entity::{EntityRecord, EventSourced},
    error::DomainResult as Result,
    identity::Identity,
    persist::EventSourcingProvider,
    saga::{SagaInstance, SagaState},
};
use chrono::{DateTime, Utc};

#[derive(Clone)]
pub struct SagaProvider {
    provider: EventSourcingProvider,
}

impl SagaProvider {
    pub fn new(provider: EventSourcingProvider) -> Self {
        Self { provider }
    }

    pub fn entities(&self) -> &EventSourcingProvider {
        &self.provider
    }

    /// 开启并持久化一个新 Saga
    ///
    /// `init` 在首次保存之前执行，用于记录初始业务事件或发出首批命令；
    /// 返回的实例中仍保留这些待投递命令。
    #[tracing::instrument(level = "debug", skip(self, init), fields(saga_type = S::TYPE))]
    pub async fn start<S, F>(
        &self,
        identity: Identity,
        expire_at: DateTime<Utc>,
        init: F,
    ) -> Result<SagaInstance<S>>
    where
        S: EventSourced,
        F: FnOnce(&mut SagaInstance<S>) -> Result<()> + Send,
    {
        let mut saga = SagaInstance::start(identity, expire_at)?;
        init(&mut saga)?;
        self.provider.save(saga.core_mut()).await?;
        Ok(saga)
    }

    /// 加载 Saga；不存在时返回 `StreamNotFound`
    pub async fn obtain<S: EventSourced>(&self, identity: &Identity) -> Result<SagaInstance<S>> {
        let core = self.provider.load::<SagaState<S>>(identity).await?;
        Ok(SagaInstance::from_core(core))
    }

    /// 保存 Saga 的未提交事件（出站命令保持不动）
    pub async fn save<S: EventSourced>(
        &self,
        saga: &mut SagaInstance<S>,
    ) -> Result<Vec<EntityRecord<SagaState<S>>>> {
        self.provider.save(saga.core_mut()).await
    }
}

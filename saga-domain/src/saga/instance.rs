use super::{SagaEvent, SagaState, SagaStatus};
use crate::entity::{EntityCore, EntityStream, EventSourced};
use crate::error::{DomainError, DomainResult};
use crate::identity::Identity;
use crate::message::{AnyMessage, Message};
use crate::value_object::Version;
use chrono::{DateTime, Utc};
use std::mem;
use std::sync::Arc;

/// Saga 实例：事件溯源的 Saga 状态 + 待投递的出站命令
///
/// 进入终态（完成/失败/过期）时记录状态变更并关闭事件流，
/// 此后任何变更（包括发出命令）都会返回 `SagaClosed`。
/// 出站命令不参与持久化，保存成功后由调用方取出并投递。
#[derive(Debug)]
pub struct SagaInstance<S: EventSourced> {
    core: EntityCore<SagaState<S>>,
    commands: Vec<Arc<dyn AnyMessage>>,
}

impl<S: EventSourced> SagaInstance<S> {
    /// 开启新的 Saga，记录 `Started` 事件
    pub fn start(identity: Identity, expire_at: DateTime<Utc>) -> DomainResult<Self> {
        let mut core = EntityCore::new(identity)?;
        core.raise(SagaEvent::Started { expire_at })?;
        Ok(Self::from_core(core))
    }

    pub fn from_core(core: EntityCore<SagaState<S>>) -> Self {
        Self {
            core,
            commands: Vec::new(),
        }
    }

    /// 记录业务事件
    pub fn raise(&mut self, event: S::Event) -> DomainResult<()> {
        self.assert_open()?;
        self.core.raise(SagaEvent::Applied(event))
    }

    /// 登记一条出站命令，保存成功后投递
    pub fn fire<C: Message>(&mut self, command: C) -> DomainResult<()> {
        self.assert_open()?;
        self.commands.push(Arc::new(command));
        Ok(())
    }

    pub fn complete(&mut self) -> DomainResult<()> {
        self.transit(SagaStatus::Completed, None)
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> DomainResult<()> {
        self.transit(SagaStatus::Failed, Some(reason.into()))
    }

    pub fn expire(&mut self) -> DomainResult<()> {
        self.transit(SagaStatus::Expired, None)
    }

    fn transit(&mut self, status: SagaStatus, reason: Option<String>) -> DomainResult<()> {
        self.assert_open()?;
        self.core.raise(SagaEvent::StatusChanged {
            previous: self.status(),
            status,
            reason,
            changed_at: Utc::now(),
        })?;
        self.core.close()
    }

    fn assert_open(&self) -> DomainResult<()> {
        let status = self.status();
        if status.is_terminal() {
            return Err(DomainError::SagaClosed {
                identity: self.identity().clone(),
                status,
            });
        }
        if self.core.is_closed() {
            return Err(DomainError::ClosedStream {
                identity: self.identity().clone(),
            });
        }
        Ok(())
    }

    /// 取出全部待投递命令
    pub fn drain_commands(&mut self) -> Vec<Arc<dyn AnyMessage>> {
        mem::take(&mut self.commands)
    }

    pub fn pending_commands(&self) -> &[Arc<dyn AnyMessage>] {
        &self.commands
    }

    pub fn extract_stream(&mut self) -> EntityStream<SagaState<S>> {
        self.core.extract_stream()
    }

    pub fn identity(&self) -> &Identity {
        self.core.identity()
    }

    pub fn version(&self) -> Version {
        self.core.version()
    }

    pub fn status(&self) -> SagaStatus {
        self.core.state().status()
    }

    pub fn is_open(&self) -> bool {
        self.assert_open().is_ok()
    }

    pub fn expire_at(&self) -> Option<DateTime<Utc>> {
        self.core.state().expire_at()
    }

    /// 截止 `now` 已过期但仍在进行中
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.status().is_terminal() && self.core.state().is_expired_at(now)
    }

    pub fn fail_reason(&self) -> Option<&str> {
        self.core.state().fail_reason()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.core.created_at()
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.core.closed_at()
    }

    /// 业务数据
    pub fn data(&self) -> &S {
        self.core.state().data()
    }

    pub fn core(&self) -> &EntityCore<SagaState<S>> {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut EntityCore<SagaState<S>> {
        &mut self.core
    }
}

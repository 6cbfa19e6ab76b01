//! 事件存储协议
//!
//! 以流为单位持久化事件，依靠流头版本实现乐观并发控制：
//! 追加事件时必须给出调用方认为的当前版本，与存储中的版本不一致即失败，
//! 失败的追加不会留下任何部分写入。
//!
use crate::{
    error::DomainResult as Result, identity::Identity, persist::SerializedEventStream,
    value_object::Version,
};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait EventStore: Send + Sync {
    /// 保存一条新流；同一标识已存在时返回 `NonUniqueStreamId`
    async fn append(&self, stream: SerializedEventStream) -> Result<()>;

    /// 向已有流追加事件；存储中的版本不等于 `expected_version` 时返回 `ConcurrentModification`
    async fn append_events(
        &self,
        stream: SerializedEventStream,
        expected_version: Version,
    ) -> Result<()>;

    /// 加载序号大于 `from_version` 的事件（连同流头）；流不存在时返回 `StreamNotFound`
    async fn load(&self, identity: &Identity, from_version: Version)
    -> Result<SerializedEventStream>;

    /// 删除整条流
    async fn delete(&self, identity: &Identity) -> Result<()>;

    /// 截断序号大于 `to_version` 的事件，流头版本回退到 `to_version`
    async fn revert(&self, identity: &Identity, to_version: Version) -> Result<()>;
}

#[async_trait]
impl<T> EventStore for Arc<T>
where
    T: EventStore + ?Sized,
{
    async fn append(&self, stream: SerializedEventStream) -> Result<()> {
        (**self).append(stream).await
    }

    async fn append_events(
        &self,
        stream: SerializedEventStream,
        expected_version: Version,
    ) -> Result<()> {
        (**self).append_events(stream, expected_version).await
    }

    async fn load(
        &self,
        identity: &Identity,
        from_version: Version,
    ) -> Result<SerializedEventStream> {
        (**self).load(identity, from_version).await
    }

    async fn delete(&self, identity: &Identity) -> Result<()> {
        (**self).delete(identity).await
    }

    async fn revert(&self, identity: &Identity, to_version: Version) -> Result<()> {
        (**self).revert(identity, to_version).await
    }
}

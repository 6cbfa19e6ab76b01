//! 持久化与事件溯源（persist）
//!
//! 定义事件存储、快照存储及其组合实现，支持：
//! - 以流为单位、带乐观并发控制的事件存储（`EventStore`）；
//! - 快照读写与触发策略（`SnapshotStore`/`SnapshotTrigger`/`Snapshotter`）；
//! - 快照 + 增量重放的实体加载与保存（`EventSourcingProvider`/`SagaProvider`）；
//! - 内存实现与基于 SQL 执行端口的实现（`inmemory`/`sql`）。
//!
mod event_store;
mod inmemory;
mod provider;
mod saga_provider;
mod serialized_event;
mod serialized_snapshot;
mod snapshot;
pub mod sql;

pub use event_store::EventStore;
pub use inmemory::{InMemoryEventStore, InMemorySnapshotStore};
pub use provider::EventSourcingProvider;
pub use saga_provider::SagaProvider;
pub use serialized_event::{SerializedEventRecord, SerializedEventStream};
pub use serialized_snapshot::SerializedSnapshot;
pub use snapshot::{SnapshotPolicy, SnapshotStore, SnapshotTrigger, Snapshotter};

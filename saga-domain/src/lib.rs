//! 事件溯源与 Saga 领域层基础库（saga-domain）
//!
//! 提供消息驱动的事件溯源运行时所需的领域构件：
//! - 标识（`identity`）与值对象（`value_object`）
//! - 领域事件与事件流（`event`）
//! - 事件溯源实体（`entity`）与长流程 Saga（`saga`）
//! - 可路由的消息（`message`）
//! - 事件存储、快照与实体提供者（`persist`）
//!
//! 本 crate 只定义领域层接口与内存/SQL 参考实现，消息接收、路由与
//! 出站投递由应用层（saga-application）负责。
//!
//! 典型用法：
//! 1. 定义业务状态与事件，实现 `EventSourced::apply`；
//! 2. 以 `EventStore` + `Snapshotter` 组装 `EventSourcingProvider`；
//! 3. 通过 `EntityCore::raise` 记录事件，再由提供者保存；
//! 4. Saga 场景使用 `SagaProvider` 开启/获取/保存 `SagaInstance`。
//!
pub mod entity;
pub mod error;
pub mod event;
pub mod identity;
pub mod message;
pub mod persist;
pub mod saga;
pub mod value_object;

// 允许在本 crate 内部通过 ::saga_domain 进行自引用，
// 以便过程宏在本 crate 的单元测试中也能解析到 ::saga_domain 路径。
extern crate self as saga_domain;

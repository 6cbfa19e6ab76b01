//! 长流程（Saga）
//!
//! Saga 是一种特殊的事件溯源实体：在业务状态之外带有状态机
//! （进行中 → 完成/失败/过期）、过期时间，以及处理消息时产生、
//! 等待持久化后投递的出站命令。

mod instance;
mod state;
mod status;

pub use instance::SagaInstance;
pub use state::{SagaEvent, SagaState};
pub use status::SagaStatus;

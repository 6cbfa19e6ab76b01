use serde::{Serialize, de::DeserializeOwned};
use std::fmt::Debug;

/// 领域事件载荷需要实现的最小接口
///
/// 通常由 `#[domain_event]` 宏生成。`event_type` 是持久化后重放时
/// 分派到状态变更逻辑的依据，应保持稳定。
pub trait DomainEvent:
    Clone + PartialEq + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// 事件类型名
    fn event_type(&self) -> &'static str;

    /// 事件载荷版本
    fn event_version(&self) -> usize {
        1
    }
}

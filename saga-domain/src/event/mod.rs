//! 领域事件（Domain Event）与事件流
//!
//! 定义事件载荷需要实现的最小接口（`DomainEvent`），带序号与时间的
//! `EventRecord`，框架自身的生命周期事件 `StreamEvent`，以及一个实体
//! 全部（或部分）事件组成的 `EventStream`。

mod domain_event_trait;
mod event_record;
mod event_stream;
mod stream_event;

pub use domain_event_trait::DomainEvent;
pub use event_record::EventRecord;
pub use event_stream::EventStream;
pub use stream_event::StreamEvent;

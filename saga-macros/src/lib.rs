//! 领域建模辅助过程宏
//!
//! - `#[domain_event]`：事件枚举，生成 `DomainEvent` 实现
//! - `#[entity_id]`：绑定到单一实体类型的强类型标识
//! - `#[message]`：可被投递/路由的消息
//! - `#[value_object]`：值对象的常用派生
//!
use proc_macro::TokenStream;

mod domain_event;
mod entity_id;
mod message;
mod utils;
mod value_object;

/// 领域事件宏
/// - 变体可为具名、元组或单元形式
/// - `#[domain_event(version = N)]` 指定默认载荷版本（缺省 1）
/// - 变体可通过 `#[event(event_type = "...", event_version = N)]` 覆写
#[proc_macro_attribute]
pub fn domain_event(attr: TokenStream, item: TokenStream) -> TokenStream {
    domain_event::expand(attr, item)
}

/// 实体 ID 宏：`#[entity_id(owner = OrderSaga)] struct OrderSagaId(String);`
#[proc_macro_attribute]
pub fn entity_id(attr: TokenStream, item: TokenStream) -> TokenStream {
    entity_id::expand(attr, item)
}

/// 消息宏：`#[message(name = "order.placed")]`
#[proc_macro_attribute]
pub fn message(attr: TokenStream, item: TokenStream) -> TokenStream {
    message::expand(attr, item)
}

/// 值对象宏：`#[value_object(debug = true, copy = false, ordered = false)]`
#[proc_macro_attribute]
pub fn value_object(attr: TokenStream, item: TokenStream) -> TokenStream {
    value_object::expand(attr, item)
}

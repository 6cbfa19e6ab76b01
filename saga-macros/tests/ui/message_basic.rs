use saga_domain::message::{AnyMessage, Message};
use saga_macros::message;
use std::sync::Arc;

#[message]
struct OrderPlaced {
    order_id: String,
}

#[message(name = "billing.charge")]
enum ChargeCommand {
    Card { token: String },
    Voucher,
}

fn main() {
    assert_eq!(OrderPlaced::NAME, "OrderPlaced");
    assert_eq!(ChargeCommand::NAME, "billing.charge");

    let erased: Arc<dyn AnyMessage> = Arc::new(OrderPlaced {
        order_id: "o-1".into(),
    });
    assert_eq!(erased.message_name(), "OrderPlaced");
    assert!(erased.is::<OrderPlaced>());
    assert!(erased.downcast_ref::<ChargeCommand>().is_none());
    assert_eq!(erased.to_json().unwrap()["order_id"], "o-1");

    let _ = ChargeCommand::Card { token: "t".into() }.clone();
    let _ = format!("{:?}", ChargeCommand::Voucher);
}

use saga_application::{
    InMemoryDelivery, InMemoryTransport, MessageDispatcher, MessageProcessor, SagaProcessor,
    metadata::{IdentityFactories, SagaMetadataConfig, SagaMetadataRegistry},
};
use saga_domain::entity::EventSourced;
use saga_domain::identity::EntityId;
use saga_domain::persist::{
    EventSourcingProvider, InMemoryEventStore, InMemorySnapshotStore, SagaProvider,
    SnapshotPolicy, Snapshotter,
};
use saga_macros::{domain_event, entity_id, message};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[domain_event]
enum OrderSagaEvent {
    Placed { amount: u64 },
    StockReserved,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct OrderSaga {
    amount: u64,
    stock_reserved: bool,
}

impl EventSourced for OrderSaga {
    const TYPE: &'static str = "order_saga";
    type Event = OrderSagaEvent;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderSagaEvent::Placed { amount } => self.amount = *amount,
            OrderSagaEvent::StockReserved => self.stock_reserved = true,
        }
    }
}

#[entity_id(owner = OrderSaga)]
struct OrderSagaId(String);

// 入站事件
#[message]
struct OrderPlaced {
    order_id: String,
    amount: u64,
}

#[message]
struct StockReserved {
    order_id: String,
}

#[message]
struct PaymentCaptured {
    payment: PaymentRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PaymentRef {
    order_id: String,
}

// 出站命令
#[message]
struct ReserveStock {
    order_id: String,
}

#[message]
struct ChargePayment {
    order_id: String,
    amount: u64,
}

const CONFIG: &str = r#"[
    {
        "saga_type": "order_saga",
        "identifier_type": "OrderSagaId",
        "containing_identifier_property": "order_id",
        "expire_date_modifier": "+2 hours"
    }
]"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("info,saga_application=debug"))
        .init();

    let configs: Vec<SagaMetadataConfig> = serde_json::from_str(CONFIG)?;
    let factories = IdentityFactories::new().register::<OrderSagaId>();
    let registry = SagaMetadataRegistry::from_config(&configs, &factories)?;

    let store = Arc::new(InMemoryEventStore::new());
    let snapshots = Arc::new(InMemorySnapshotStore::new());
    let provider = SagaProvider::new(EventSourcingProvider::new(
        store.clone(),
        Snapshotter::new(snapshots.clone(), SnapshotPolicy::Every(3)),
    ));
    let delivery = Arc::new(InMemoryDelivery::new());

    let processor = SagaProcessor::<OrderSaga>::from_registry(
        provider.clone(),
        &registry,
        delivery.clone(),
    )?;
    processor.starts_with(|saga, placed: &OrderPlaced| {
        saga.raise(OrderSagaEvent::Placed {
            amount: placed.amount,
        })?;
        saga.fire(ReserveStock {
            order_id: placed.order_id.clone(),
        })
    })?;
    processor.handles(|saga, reserved: &StockReserved| {
        saga.raise(OrderSagaEvent::StockReserved)?;
        let amount = saga.data().amount;
        saga.fire(ChargePayment {
            order_id: reserved.order_id.clone(),
            amount,
        })
    })?;
    // 支付事件的订单号嵌套在 payment 下，按 order_id 解析会失败
    processor.handles(|saga, _: &PaymentCaptured| saga.complete())?;

    let processors: Vec<Arc<dyn MessageProcessor>> = vec![Arc::new(processor)];
    let dispatcher = Arc::new(MessageDispatcher::builder().processors(processors).build());
    let transport = Arc::new(InMemoryTransport::default());
    let handle = dispatcher.start(transport.clone());
    while transport.subscriber_count() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    transport.publish_message(OrderPlaced {
        order_id: "o-1001".into(),
        amount: 4200,
    })?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    transport.publish_message(StockReserved {
        order_id: "o-1001".into(),
    })?;
    // 未开启的订单：按空操作确认
    transport.publish_message(StockReserved {
        order_id: "o-9999".into(),
    })?;
    // 标识属性缺失：解析失败，消息被拒绝
    transport.publish_message(PaymentCaptured {
        payment: PaymentRef {
            order_id: "o-1001".into(),
        },
    })?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    handle.shutdown();
    handle.join().await;

    for delivered in delivery.sent().await {
        println!(
            "delivered {} (correlation={:?}, causation={:?})",
            delivered.message.message_name(),
            delivered.options.context().correlation_id(),
            delivered.options.context().causation_id(),
        );
    }
    println!("acknowledged: {}", transport.acknowledged().await.len());
    for (message_id, reason) in transport.rejected().await {
        println!("rejected {message_id}: {reason}");
    }

    let saga = provider
        .obtain::<OrderSaga>(&OrderSagaId::new("o-1001").identity()?)
        .await?;
    println!(
        "saga {} status={} version={} amount={} stock_reserved={}",
        saga.identity(),
        saga.status(),
        saga.version(),
        saga.data().amount,
        saga.data().stock_reserved
    );
    println!("snapshots stored: {}", snapshots.len());

    Ok(())
}

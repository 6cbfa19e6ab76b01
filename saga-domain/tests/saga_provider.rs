use anyhow::Result as AnyResult;
use chrono::{TimeDelta, Utc};
use saga_domain::entity::EventSourced;
use saga_domain::error::DomainError;
use saga_domain::identity::EntityId;
use saga_domain::persist::{
    EventSourcingProvider, InMemoryEventStore, InMemorySnapshotStore, SagaProvider,
    SnapshotPolicy, Snapshotter,
};
use saga_domain::saga::{SagaInstance, SagaStatus};
use saga_domain::value_object::Version;
use saga_macros::{domain_event, entity_id, message};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[domain_event]
enum ShipmentEvent {
    Requested { order_id: String },
    Dispatched,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct ShipmentSaga {
    order_id: String,
    dispatched: bool,
}

impl EventSourced for ShipmentSaga {
    const TYPE: &'static str = "shipment_saga";
    type Event = ShipmentEvent;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ShipmentEvent::Requested { order_id } => self.order_id = order_id.clone(),
            ShipmentEvent::Dispatched => self.dispatched = true,
        }
    }
}

#[entity_id(owner = ShipmentSaga)]
struct ShipmentSagaId(String);

#[message]
struct ReserveCourier {
    order_id: String,
}

fn provider(policy: SnapshotPolicy) -> (Arc<InMemoryEventStore>, SagaProvider) {
    let events = Arc::new(InMemoryEventStore::new());
    let snapshots = Arc::new(InMemorySnapshotStore::new());
    let provider = SagaProvider::new(EventSourcingProvider::new(
        events.clone(),
        Snapshotter::new(snapshots, policy),
    ));
    (events, provider)
}

#[tokio::test]
async fn start_persists_and_keeps_commands() -> AnyResult<()> {
    let (events, sagas) = provider(SnapshotPolicy::Never);
    let identity = ShipmentSagaId::new("o-1").identity()?;
    let expire_at = Utc::now() + TimeDelta::days(1);

    let mut saga: SagaInstance<ShipmentSaga> = sagas
        .start(identity.clone(), expire_at, |saga| {
            saga.raise(ShipmentEvent::Requested {
                order_id: "o-1".into(),
            })?;
            saga.fire(ReserveCourier {
                order_id: "o-1".into(),
            })
        })
        .await?;

    assert_eq!(saga.version(), Version::from_value(3));
    assert_eq!(events.version_of(&identity), Some(Version::from_value(3)));
    assert_eq!(saga.drain_commands().len(), 1);

    let obtained = sagas.obtain::<ShipmentSaga>(&identity).await?;
    assert_eq!(obtained.data().order_id, "o-1");
    assert_eq!(obtained.expire_at(), Some(expire_at));
    assert_eq!(obtained.status(), SagaStatus::InProgress);
    assert!(obtained.pending_commands().is_empty());
    Ok(())
}

#[tokio::test]
async fn obtain_missing_saga_is_not_found() -> AnyResult<()> {
    let (_, sagas) = provider(SnapshotPolicy::Never);
    let identity = ShipmentSagaId::new("ghost").identity()?;

    let err = sagas.obtain::<ShipmentSaga>(&identity).await.unwrap_err();
    assert!(err.is_stream_not_found());
    Ok(())
}

#[tokio::test]
async fn completed_saga_is_closed_after_reload() -> AnyResult<()> {
    let (_, sagas) = provider(SnapshotPolicy::Every(1));
    let identity = ShipmentSagaId::new("o-2").identity()?;
    sagas
        .start::<ShipmentSaga, _>(identity.clone(), Utc::now() + TimeDelta::hours(2), |_| Ok(()))
        .await?;

    let mut saga = sagas.obtain::<ShipmentSaga>(&identity).await?;
    saga.raise(ShipmentEvent::Dispatched)?;
    saga.complete()?;
    let committed = sagas.save(&mut saga).await?;
    assert_eq!(committed.len(), 3);

    let reloaded = sagas.obtain::<ShipmentSaga>(&identity).await?;
    assert_eq!(reloaded.status(), SagaStatus::Completed);
    assert!(reloaded.data().dispatched);
    assert!(reloaded.closed_at().is_some());

    let mut reloaded = reloaded;
    let err = reloaded
        .fire(ReserveCourier {
            order_id: "o-2".into(),
        })
        .unwrap_err();
    assert!(matches!(err, DomainError::SagaClosed { .. }));
    Ok(())
}

#[tokio::test]
async fn starting_twice_fails_with_non_unique_stream() -> AnyResult<()> {
    let (_, sagas) = provider(SnapshotPolicy::Never);
    let identity = ShipmentSagaId::new("o-3").identity()?;
    let expire_at = Utc::now() + TimeDelta::days(1);

    sagas
        .start::<ShipmentSaga, _>(identity.clone(), expire_at, |_| Ok(()))
        .await?;
    let err = sagas
        .start::<ShipmentSaga, _>(identity, expire_at, |_| Ok(()))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NonUniqueStreamId { .. }));
    Ok(())
}

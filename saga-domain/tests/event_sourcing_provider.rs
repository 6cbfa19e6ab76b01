use anyhow::Result as AnyResult;
use saga_domain::entity::{EntityCore, EventSourced};
use saga_domain::error::DomainError;
use saga_domain::event::DomainEvent;
use saga_domain::identity::{EntityId, Identity};
use saga_domain::persist::{
    EventSourcingProvider, EventStore, InMemoryEventStore, InMemorySnapshotStore,
    SnapshotPolicy, Snapshotter,
};
use saga_domain::value_object::Version;
use saga_macros::{domain_event, entity_id};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[domain_event]
enum WalletEvent {
    Deposited { minor_units: i64 },
    Withdrawn { minor_units: i64 },
    Frozen,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct Wallet {
    balance_minor_units: i64,
    frozen: bool,
}

impl EventSourced for Wallet {
    const TYPE: &'static str = "wallet";
    type Event = WalletEvent;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            WalletEvent::Deposited { minor_units } => self.balance_minor_units += minor_units,
            WalletEvent::Withdrawn { minor_units } => self.balance_minor_units -= minor_units,
            WalletEvent::Frozen => self.frozen = true,
        }
    }
}

#[entity_id(owner = Wallet)]
struct WalletId(String);

struct Fixture {
    events: Arc<InMemoryEventStore>,
    snapshots: Arc<InMemorySnapshotStore>,
    provider: EventSourcingProvider,
}

fn fixture(policy: SnapshotPolicy) -> Fixture {
    let events = Arc::new(InMemoryEventStore::new());
    let snapshots = Arc::new(InMemorySnapshotStore::new());
    let provider = EventSourcingProvider::new(
        events.clone(),
        Snapshotter::new(snapshots.clone(), policy),
    );
    Fixture {
        events,
        snapshots,
        provider,
    }
}

fn wallet(id: &str) -> AnyResult<EntityCore<Wallet>> {
    Ok(EntityCore::new(WalletId::new(id).identity()?)?)
}

#[tokio::test]
async fn save_then_load_reproduces_entity() -> AnyResult<()> {
    let f = fixture(SnapshotPolicy::Never);
    let mut entity = wallet("w-1")?;
    entity.raise(WalletEvent::Deposited { minor_units: 500 })?;
    entity.raise(WalletEvent::Withdrawn { minor_units: 120 })?;

    let committed = f.provider.save(&mut entity).await?;
    assert_eq!(committed.len(), 3);
    assert_eq!(committed[0].payload().event_type(), "EntityCreated");
    assert!(!entity.has_uncommitted());

    let loaded = f.provider.load::<Wallet>(entity.identity()).await?;
    assert_eq!(loaded.version(), entity.version());
    assert_eq!(loaded.state(), entity.state());
    assert_eq!(loaded.created_at(), entity.created_at());
    assert_eq!(loaded.state().balance_minor_units, 380);
    Ok(())
}

#[tokio::test]
async fn load_missing_stream_is_not_found() -> AnyResult<()> {
    let f = fixture(SnapshotPolicy::Never);
    let identity = WalletId::new("missing").identity()?;

    let err = f.provider.load::<Wallet>(&identity).await.unwrap_err();
    assert!(err.is_stream_not_found());
    Ok(())
}

#[tokio::test]
async fn saving_same_identity_twice_fails() -> AnyResult<()> {
    let f = fixture(SnapshotPolicy::Never);
    let mut first = wallet("w-dup")?;
    f.provider.save(&mut first).await?;

    let mut second = wallet("w-dup")?;
    let err = f.provider.save(&mut second).await.unwrap_err();
    assert!(matches!(err, DomainError::NonUniqueStreamId { .. }));
    // 失败的保存不丢弃未提交事件
    assert!(second.has_uncommitted());

    let stored = f.provider.load::<Wallet>(first.identity()).await?;
    assert_eq!(stored.version(), Version::from_value(1));
    Ok(())
}

#[tokio::test]
async fn stale_copy_loses_optimistic_race() -> AnyResult<()> {
    let f = fixture(SnapshotPolicy::Never);
    let mut entity = wallet("w-race")?;
    entity.raise(WalletEvent::Deposited { minor_units: 100 })?;
    f.provider.save(&mut entity).await?;

    let mut a = f.provider.load::<Wallet>(entity.identity()).await?;
    let mut b = f.provider.load::<Wallet>(entity.identity()).await?;

    a.raise(WalletEvent::Withdrawn { minor_units: 30 })?;
    b.raise(WalletEvent::Withdrawn { minor_units: 80 })?;

    f.provider.save(&mut a).await?;
    let err = f.provider.save(&mut b).await.unwrap_err();
    assert!(matches!(
        err,
        DomainError::ConcurrentModification { expected: 2, .. }
    ));

    let stored = f.provider.load::<Wallet>(entity.identity()).await?;
    assert_eq!(stored.version(), Version::from_value(3));
    assert_eq!(stored.state().balance_minor_units, 70);
    Ok(())
}

#[tokio::test]
async fn snapshot_load_matches_full_replay() -> AnyResult<()> {
    let with_snapshots = fixture(SnapshotPolicy::Every(2));
    let without = fixture(SnapshotPolicy::Never);

    for f in [&with_snapshots, &without] {
        let mut entity = wallet("w-snap")?;
        f.provider.save(&mut entity).await?;
        for amount in [10, 20, 30, 40, 50] {
            let mut loaded = f.provider.load::<Wallet>(entity.identity()).await?;
            loaded.raise(WalletEvent::Deposited { minor_units: amount })?;
            f.provider.save(&mut loaded).await?;
        }
    }

    let identity = WalletId::new("w-snap").identity()?;
    let snapshot = with_snapshots
        .snapshots
        .get(&identity)
        .expect("snapshot stored");
    assert!(snapshot.version() > Version::new());
    assert!(without.snapshots.is_empty());

    let from_snapshot = with_snapshots.provider.load::<Wallet>(&identity).await?;
    let replayed = without.provider.load::<Wallet>(&identity).await?;
    assert_eq!(from_snapshot.version(), replayed.version());
    assert_eq!(from_snapshot.state(), replayed.state());
    assert_eq!(from_snapshot.state().balance_minor_units, 150);
    assert_eq!(from_snapshot.snapshot_version(), snapshot.version());
    Ok(())
}

#[tokio::test]
async fn snapshot_every_save_tracks_committed_version() -> AnyResult<()> {
    let f = fixture(SnapshotPolicy::Every(1));
    let mut entity = wallet("w-every")?;
    entity.raise(WalletEvent::Deposited { minor_units: 5 })?;

    for amount in [0, 11, 13, 17] {
        if amount > 0 {
            entity.raise(WalletEvent::Deposited {
                minor_units: amount,
            })?;
        }
        f.provider.save(&mut entity).await?;

        let snapshot = f.snapshots.get(entity.identity()).expect("snapshot stored");
        assert_eq!(snapshot.version(), entity.committed_version());
        assert_eq!(
            f.events.version_of(entity.identity()),
            Some(snapshot.version())
        );

        let loaded = f.provider.load::<Wallet>(entity.identity()).await?;
        assert_eq!(loaded.snapshot_version(), snapshot.version());
        assert_eq!(loaded.version(), entity.version());
        assert_eq!(loaded.state(), entity.state());
    }
    assert_eq!(entity.state().balance_minor_units, 46);
    Ok(())
}

#[tokio::test]
async fn snapshot_failure_does_not_fail_save() -> AnyResult<()> {
    let f = fixture(SnapshotPolicy::Every(1));
    f.snapshots.fail_writes(true);

    let mut entity = wallet("w-flaky")?;
    entity.raise(WalletEvent::Frozen)?;
    f.provider.save(&mut entity).await?;

    assert!(f.snapshots.is_empty());
    assert_eq!(
        f.events.version_of(entity.identity()),
        Some(Version::from_value(2))
    );
    Ok(())
}

#[tokio::test]
async fn unusable_snapshot_falls_back_to_replay() -> AnyResult<()> {
    let f = fixture(SnapshotPolicy::Every(1));
    let mut entity = wallet("w-legacy")?;
    entity.raise(WalletEvent::Deposited { minor_units: 7 })?;
    f.provider.save(&mut entity).await?;

    // 以不兼容的载荷覆盖快照
    let identity = entity.identity().clone();
    let stale = saga_domain::persist::SerializedSnapshot::builder()
        .identity(identity.clone())
        .version(Version::from_value(2))
        .payload(serde_json::json!({ "unexpected": true }))
        .created_at(chrono::Utc::now())
        .build();
    saga_domain::persist::SnapshotStore::save(f.snapshots.as_ref(), stale).await?;

    let loaded = f.provider.load::<Wallet>(&identity).await?;
    assert_eq!(loaded.state().balance_minor_units, 7);
    assert_eq!(loaded.version(), Version::from_value(2));
    Ok(())
}

#[tokio::test]
async fn closed_entity_cannot_be_extended() -> AnyResult<()> {
    let f = fixture(SnapshotPolicy::Never);
    let mut entity = wallet("w-closed")?;
    entity.close()?;
    f.provider.save(&mut entity).await?;

    let mut loaded = f.provider.load::<Wallet>(entity.identity()).await?;
    assert!(loaded.is_closed());
    let err = loaded.raise(WalletEvent::Frozen).unwrap_err();
    assert!(matches!(err, DomainError::ClosedStream { .. }));
    Ok(())
}

#[tokio::test]
async fn revert_truncates_history() -> AnyResult<()> {
    let f = fixture(SnapshotPolicy::Every(1));
    let mut entity = wallet("w-revert")?;
    entity.raise(WalletEvent::Deposited { minor_units: 10 })?;
    entity.raise(WalletEvent::Deposited { minor_units: 20 })?;
    entity.close()?;
    f.provider.save(&mut entity).await?;

    let reverted = f
        .provider
        .revert::<Wallet>(entity.identity(), Version::from_value(2))
        .await?;
    assert_eq!(reverted.version(), Version::from_value(2));
    assert_eq!(reverted.state().balance_minor_units, 10);
    assert!(!reverted.is_closed());
    assert!(f.snapshots.get(entity.identity()).is_none());

    // 回退后的实体可以继续追加
    let mut reverted = reverted;
    reverted.raise(WalletEvent::Withdrawn { minor_units: 4 })?;
    f.provider.save(&mut reverted).await?;
    let loaded = f.provider.load::<Wallet>(entity.identity()).await?;
    assert_eq!(loaded.state().balance_minor_units, 6);
    Ok(())
}

#[tokio::test]
async fn remove_deletes_stream_and_snapshot() -> AnyResult<()> {
    let f = fixture(SnapshotPolicy::Every(1));
    let mut entity = wallet("w-gone")?;
    f.provider.save(&mut entity).await?;
    assert_eq!(f.snapshots.len(), 1);

    f.provider.remove(entity.identity()).await?;
    assert!(f.snapshots.is_empty());
    assert_eq!(f.events.stream_count(), 0);
    assert!(
        f.provider
            .load::<Wallet>(entity.identity())
            .await
            .unwrap_err()
            .is_stream_not_found()
    );
    Ok(())
}

#[tokio::test]
async fn load_rejects_foreign_identity() -> AnyResult<()> {
    let f = fixture(SnapshotPolicy::Never);
    let identity = Identity::new("w-1", "invoice")?;

    let err = f.provider.load::<Wallet>(&identity).await.unwrap_err();
    assert!(matches!(err, DomainError::IdentityMismatch { .. }));
    assert_eq!(f.events.read_count(), 0);
    Ok(())
}

#[tokio::test]
async fn store_load_from_version_returns_tail() -> AnyResult<()> {
    let f = fixture(SnapshotPolicy::Never);
    let mut entity = wallet("w-tail")?;
    for minor_units in [1, 2, 3] {
        entity.raise(WalletEvent::Deposited { minor_units })?;
    }
    f.provider.save(&mut entity).await?;

    let tail = f
        .events
        .load(entity.identity(), Version::from_value(2))
        .await?;
    let sequences: Vec<usize> = tail.events().iter().map(|e| e.sequence().value()).collect();
    assert_eq!(sequences, vec![3, 4]);
    assert_eq!(tail.events()[0].event_type(), "WalletEvent.Deposited");
    Ok(())
}

//! Saga 处理器（SagaProcessor）
//!
//! 把入站消息路由到一类 Saga 的实例上：
//! 解析标识 → 加载（或开启）→ 执行处理函数 → 保存 → 投递出站命令。
//! 每一步的失败都带上阶段、消息类型与已解析的标识返回给调度器。
//!
use crate::context::Envelope;
use crate::delivery::{DeliveryOptions, OutboundDelivery};
use crate::error::{AppError, ProcessingError, ProcessingStage};
use crate::metadata::{SagaMetadata, SagaMetadataRegistry};
use crate::processor::{HandledMessages, MessageProcessor, ProcessingOutcome};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use saga_domain::entity::EventSourced;
use saga_domain::error::{DomainError, DomainResult};
use saga_domain::identity::Identity;
use saga_domain::message::{AnyMessage, Message};
use saga_domain::persist::SagaProvider;
use saga_domain::saga::SagaInstance;
use std::any::TypeId;
use std::sync::Arc;
use tracing::field;

type SagaHandler<S> =
    Arc<dyn Fn(&mut SagaInstance<S>, &dyn AnyMessage) -> DomainResult<()> + Send + Sync>;

#[derive(Clone)]
enum Route<S: EventSourced> {
    /// 开启新实例后执行
    Start(SagaHandler<S>),
    /// 加载已有实例后执行
    Handle(SagaHandler<S>),
}

pub struct SagaProcessor<S: EventSourced> {
    name: String,
    provider: SagaProvider,
    metadata: SagaMetadata,
    delivery: Arc<dyn OutboundDelivery>,
    routes: DashMap<TypeId, (&'static str, Route<S>)>,
}

impl<S: EventSourced> SagaProcessor<S> {
    pub fn new(
        provider: SagaProvider,
        metadata: SagaMetadata,
        delivery: Arc<dyn OutboundDelivery>,
    ) -> Result<Self, AppError> {
        if metadata.saga_type() != S::TYPE {
            return Err(AppError::Configuration(format!(
                "metadata for {} cannot drive saga {}",
                metadata.saga_type(),
                S::TYPE
            )));
        }
        Ok(Self {
            name: format!("{}_processor", S::TYPE),
            provider,
            metadata,
            delivery,
            routes: DashMap::new(),
        })
    }

    /// 从注册表中取出 `S` 的元数据构建处理器
    pub fn from_registry(
        provider: SagaProvider,
        registry: &SagaMetadataRegistry,
        delivery: Arc<dyn OutboundDelivery>,
    ) -> Result<Self, AppError> {
        let metadata = registry.for_saga::<S>()?.clone();
        Self::new(provider, metadata, delivery)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn metadata(&self) -> &SagaMetadata {
        &self.metadata
    }

    /// 登记开启 Saga 的消息：开启新实例后以该消息初始化
    pub fn starts_with<M, F>(&self, init: F) -> Result<(), AppError>
    where
        M: Message,
        F: Fn(&mut SagaInstance<S>, &M) -> DomainResult<()> + Send + Sync + 'static,
    {
        self.insert::<M>(Route::Start(Self::erase(init)))
    }

    /// 登记由已有 Saga 处理的消息
    ///
    /// 路由需在处理器交给调度器之前登记完毕，调度器按构建时的订阅建立路由表。
    pub fn handles<M, F>(&self, handler: F) -> Result<(), AppError>
    where
        M: Message,
        F: Fn(&mut SagaInstance<S>, &M) -> DomainResult<()> + Send + Sync + 'static,
    {
        self.insert::<M>(Route::Handle(Self::erase(handler)))
    }

    fn insert<M: Message>(&self, route: Route<S>) -> Result<(), AppError> {
        match self.routes.entry(TypeId::of::<M>()) {
            Entry::Occupied(_) => Err(AppError::AlreadyRegistered { message: M::NAME }),
            Entry::Vacant(entry) => {
                entry.insert((M::NAME, route));
                Ok(())
            }
        }
    }

    fn erase<M, F>(handler: F) -> SagaHandler<S>
    where
        M: Message,
        F: Fn(&mut SagaInstance<S>, &M) -> DomainResult<()> + Send + Sync + 'static,
    {
        Arc::new(move |saga, message| match message.downcast_ref::<M>() {
            Some(message) => handler(saga, message),
            None => Err(DomainError::TypeMismatch {
                expected: M::NAME.to_string(),
                found: message.message_name().to_string(),
            }),
        })
    }

    async fn run(
        &self,
        route: Route<S>,
        envelope: &Envelope,
    ) -> Result<ProcessingOutcome, ProcessingError> {
        let message = envelope.message().as_ref();
        let failed = |stage, identity: Option<&Identity>, source| {
            ProcessingError::new(stage, message.message_name(), identity.cloned(), source)
        };

        let identity = self
            .metadata
            .resolve_identity(message)
            .map_err(|err| failed(ProcessingStage::IdentityResolution, None, err))?;
        tracing::Span::current().record("identity", field::display(&identity));

        let (mut saga, handler) = match route {
            Route::Start(init) => {
                let expire_at = self.metadata.expire_at(Utc::now());
                let saga = SagaInstance::<S>::start(identity.clone(), expire_at)
                    .map_err(|err| failed(ProcessingStage::Loading, Some(&identity), err))?;
                (saga, init)
            }
            Route::Handle(handler) => match self.provider.obtain::<S>(&identity).await {
                Ok(saga) => (saga, handler),
                Err(err) if err.is_stream_not_found() => {
                    tracing::info!(%identity, "saga not found, message acknowledged as no-op");
                    return Ok(ProcessingOutcome::SagaNotFound { identity });
                }
                Err(err) => return Err(failed(ProcessingStage::Loading, Some(&identity), err)),
            },
        };

        handler(&mut saga, message)
            .map_err(|err| failed(ProcessingStage::Mutation, Some(&identity), err))?;

        let committed = self
            .provider
            .save(&mut saga)
            .await
            .map_err(|err| failed(ProcessingStage::Persistence, Some(&identity), err))?;

        let commands = saga.drain_commands();
        let fired = commands.len();
        for command in commands {
            let options = DeliveryOptions::caused_by(envelope.context());
            self.delivery
                .send(command, options)
                .await
                .map_err(|err| failed(ProcessingStage::Delivery, Some(&identity), err))?;
        }

        tracing::debug!(
            events = committed.len(),
            commands = fired,
            version = saga.version().value(),
            "saga message handled"
        );
        Ok(ProcessingOutcome::Handled {
            events: committed.len(),
            commands: fired,
        })
    }
}

#[async_trait]
impl<S: EventSourced> MessageProcessor for SagaProcessor<S> {
    fn processor_name(&self) -> &str {
        &self.name
    }

    fn handled_messages(&self) -> HandledMessages {
        HandledMessages::Many(self.routes.iter().map(|entry| *entry.key()).collect())
    }

    #[tracing::instrument(
        skip_all,
        fields(
            processor = %self.name,
            message_type = envelope.message_name(),
            message_id = %envelope.message_id(),
            identity = field::Empty,
        )
    )]
    async fn process(&self, envelope: &Envelope) -> Result<ProcessingOutcome, ProcessingError> {
        let route = self
            .routes
            .get(&envelope.message_type_id())
            .map(|entry| entry.value().1.clone());

        match route {
            Some(route) => self.run(route, envelope).await,
            None => Ok(ProcessingOutcome::Ignored),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MessageContext;
    use crate::delivery::InMemoryDelivery;
    use chrono::TimeDelta;
    use saga_domain::identity::EntityId;
    use saga_domain::persist::{
        EventSourcingProvider, InMemoryEventStore, InMemorySnapshotStore, Snapshotter,
    };
    use saga_domain::saga::SagaStatus;
    use saga_macros::{domain_event, entity_id, message};
    use serde::{Deserialize, Serialize};

    #[domain_event]
    enum TripEvent {
        Booked { seats: u32 },
        Boarded,
    }

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    struct TripSaga {
        seats: u32,
        boarded: bool,
    }

    impl EventSourced for TripSaga {
        const TYPE: &'static str = "trip_saga";
        type Event = TripEvent;

        fn apply(&mut self, event: &Self::Event) {
            match event {
                TripEvent::Booked { seats } => self.seats = *seats,
                TripEvent::Boarded => self.boarded = true,
            }
        }
    }

    #[entity_id(owner = TripSaga)]
    struct TripId(String);

    #[message]
    struct TripBooked {
        trip: String,
        seats: u32,
    }

    #[message]
    struct PassengerBoarded {
        trip: String,
    }

    #[message]
    struct IssueTicket {
        trip: String,
    }

    #[message]
    struct Unrelated {
        trip: String,
    }

    struct Fixture {
        store: Arc<InMemoryEventStore>,
        delivery: Arc<InMemoryDelivery>,
        processor: SagaProcessor<TripSaga>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryEventStore::new());
        let snapshots = Arc::new(InMemorySnapshotStore::new());
        let provider = EventSourcingProvider::new(store.clone(), Snapshotter::disabled(snapshots));
        let delivery = Arc::new(InMemoryDelivery::new());
        let processor = SagaProcessor::<TripSaga>::new(
            SagaProvider::new(provider),
            SagaMetadata::for_id::<TripId>("trip", TimeDelta::hours(6)),
            delivery.clone(),
        )
        .unwrap();

        processor
            .starts_with(|saga, booked: &TripBooked| {
                saga.raise(TripEvent::Booked { seats: booked.seats })?;
                saga.fire(IssueTicket {
                    trip: booked.trip.clone(),
                })
            })
            .unwrap();
        processor
            .handles(|saga, _: &PassengerBoarded| {
                saga.raise(TripEvent::Boarded)?;
                saga.complete()
            })
            .unwrap();

        Fixture {
            store,
            delivery,
            processor,
        }
    }

    #[tokio::test]
    async fn starting_message_opens_saga_and_delivers_commands() {
        let f = fixture();
        let context = MessageContext::builder()
            .correlation_id("cor-1".to_string())
            .build();
        let envelope = Envelope::with_context(
            TripBooked {
                trip: "t-1".into(),
                seats: 3,
            },
            context.clone(),
        );

        let outcome = f.processor.process(&envelope).await.unwrap();
        assert_eq!(
            outcome,
            ProcessingOutcome::Handled {
                events: 3,
                commands: 1
            }
        );

        let sent = f.delivery.sent().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].message.is::<IssueTicket>());
        assert_eq!(sent[0].options.context().correlation_id(), Some("cor-1"));
        assert_eq!(
            sent[0].options.context().causation_id(),
            Some(context.message_id().to_string().as_str())
        );

        let identity = TripId::new("t-1").identity().unwrap();
        assert_eq!(f.store.version_of(&identity).map(|v| v.value()), Some(3));
    }

    #[tokio::test]
    async fn handling_message_completes_saga() {
        let f = fixture();
        f.processor
            .process(&Envelope::new(TripBooked {
                trip: "t-2".into(),
                seats: 1,
            }))
            .await
            .unwrap();

        let outcome = f
            .processor
            .process(&Envelope::new(PassengerBoarded { trip: "t-2".into() }))
            .await
            .unwrap();
        assert!(outcome.is_handled());

        let identity = TripId::new("t-2").identity().unwrap();
        let provider = SagaProvider::new(EventSourcingProvider::new(
            f.store.clone(),
            Snapshotter::disabled(Arc::new(InMemorySnapshotStore::new())),
        ));
        let saga = provider.obtain::<TripSaga>(&identity).await.unwrap();
        assert_eq!(saga.status(), SagaStatus::Completed);
        assert!(saga.data().boarded);
    }

    #[tokio::test]
    async fn missing_saga_is_a_no_op() {
        let f = fixture();

        let outcome = f
            .processor
            .process(&Envelope::new(PassengerBoarded {
                trip: "ghost".into(),
            }))
            .await
            .unwrap();

        assert!(matches!(outcome, ProcessingOutcome::SagaNotFound { .. }));
        assert_eq!(f.store.write_count(), 0);
        assert!(f.delivery.sent().await.is_empty());
    }

    #[tokio::test]
    async fn unresolvable_identity_never_touches_storage() {
        let f = fixture();

        let err = f
            .processor
            .process(&Envelope::new(PassengerBoarded { trip: "".into() }))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), ProcessingStage::IdentityResolution);
        assert_eq!(err.message_type(), "PassengerBoarded");
        assert!(err.identity().is_none());
        assert!(matches!(
            err.domain_error(),
            DomainError::IdentifierResolution { .. }
        ));
        assert_eq!(f.store.read_count(), 0);
        assert_eq!(f.store.write_count(), 0);
    }

    #[tokio::test]
    async fn closed_saga_rejects_further_messages() {
        let f = fixture();
        f.processor
            .process(&Envelope::new(TripBooked {
                trip: "t-3".into(),
                seats: 2,
            }))
            .await
            .unwrap();
        let boarded = Envelope::new(PassengerBoarded { trip: "t-3".into() });
        f.processor.process(&boarded).await.unwrap();
        let writes = f.store.write_count();

        let err = f.processor.process(&boarded).await.unwrap_err();
        assert_eq!(err.stage(), ProcessingStage::Mutation);
        assert!(matches!(err.domain_error(), DomainError::SagaClosed { .. }));
        assert_eq!(
            err.identity().map(|i| i.value().to_string()),
            Some("t-3".to_string())
        );
        assert_eq!(f.store.write_count(), writes);
    }

    #[tokio::test]
    async fn starting_twice_fails_at_persistence() {
        let f = fixture();
        let booked = Envelope::new(TripBooked {
            trip: "t-4".into(),
            seats: 1,
        });
        f.processor.process(&booked).await.unwrap();

        let err = f.processor.process(&booked).await.unwrap_err();
        assert_eq!(err.stage(), ProcessingStage::Persistence);
        assert!(matches!(
            err.domain_error(),
            DomainError::NonUniqueStreamId { .. }
        ));
        assert_eq!(f.delivery.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn unregistered_message_is_ignored() {
        let f = fixture();

        let outcome = f
            .processor
            .process(&Envelope::new(Unrelated { trip: "t-5".into() }))
            .await
            .unwrap();

        assert_eq!(outcome, ProcessingOutcome::Ignored);
        assert!(!f.processor.handled_messages().matches(TypeId::of::<Unrelated>()));
        assert!(f.processor.handled_messages().matches(TypeId::of::<TripBooked>()));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let f = fixture();

        let err = f
            .processor
            .handles(|_, _: &TripBooked| Ok(()))
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::AlreadyRegistered {
                message: "TripBooked"
            }
        ));
    }

    #[test]
    fn metadata_must_belong_to_saga() {
        let store = Arc::new(InMemoryEventStore::new());
        let provider = EventSourcingProvider::new(
            store,
            Snapshotter::disabled(Arc::new(InMemorySnapshotStore::new())),
        );
        let mut registry = SagaMetadataRegistry::new();
        registry
            .insert(SagaMetadata::for_id::<TripId>("trip", TimeDelta::hours(1)))
            .unwrap();

        let built = SagaProcessor::<TripSaga>::from_registry(
            SagaProvider::new(provider),
            &registry,
            Arc::new(InMemoryDelivery::new()),
        )
        .unwrap();
        assert_eq!(built.processor_name(), "trip_saga_processor");
        assert_eq!(built.metadata().containing_identifier_property(), "trip");
    }
}

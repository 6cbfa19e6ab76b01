use saga_domain::entity::EventSourced;
use saga_domain::event::DomainEvent;
use saga_domain::identity::EntityId;
use saga_macros::{domain_event, entity_id};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[domain_event]
enum ParcelEvent {
    Labelled,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Parcel;

impl EventSourced for Parcel {
    const TYPE: &'static str = "parcel";
    type Event = ParcelEvent;

    fn apply(&mut self, _event: &Self::Event) {}
}

#[entity_id(owner = Parcel)]
struct ParcelId(String);

fn main() {
    let id = ParcelId::new("p-1");
    let identity = id.identity().unwrap();
    assert_eq!(identity.owner_type(), "parcel");
    assert_eq!(identity.value(), "p-1");
    assert_eq!(id.to_string(), "p-1");
    assert_eq!(AsRef::<str>::as_ref(&id), "p-1");

    assert!(ParcelId::from_str("").is_err());
    let parsed = ParcelId::from_str("p-2").unwrap();
    let raw: String = parsed.clone().into();
    assert_eq!(raw, "p-2");
    assert_ne!(parsed, id);

    assert_eq!(ParcelEvent::Labelled.event_version(), 1);
}

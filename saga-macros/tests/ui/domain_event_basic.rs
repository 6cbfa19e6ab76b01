use saga_domain::event::DomainEvent;
use saga_macros::domain_event;

#[domain_event(version = 2)]
enum InvoiceEvent {
    Issued { number: String, total: u64 },
    Adjusted(i64),
    #[event(event_type = "invoice.voided", event_version = 3)]
    Voided,
}

fn main() {
    let issued = InvoiceEvent::Issued {
        number: "INV-1".into(),
        total: 120,
    };
    assert_eq!(issued.event_version(), 2);
    assert_eq!(InvoiceEvent::Adjusted(-5).event_version(), 2);
    assert_eq!(InvoiceEvent::Voided.event_type(), "invoice.voided");
    assert_eq!(InvoiceEvent::Voided.event_version(), 3);
    assert_ne!(issued.event_type(), InvoiceEvent::Adjusted(1).event_type());

    let json = serde_json::to_string(&issued).unwrap();
    let back: InvoiceEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back, issued);
}

use saga_macros::value_object;

#[value_object]
struct Money {
    amount: i64,
    currency: String,
}

#[value_object(copy = true, ordered = true)]
struct Priority(u8);

#[value_object(debug = false)]
enum Channel {
    #[default]
    Email,
    Sms,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Channel(..)")
    }
}

fn main() {
    let a = Money {
        amount: 10,
        currency: "EUR".into(),
    };
    assert_eq!(a.clone(), a);
    assert_eq!(Money::default().amount, 0);

    let low = Priority(1);
    let high = low;
    assert!(Priority(3) > high);

    assert_eq!(Channel::default(), Channel::Email);
    assert_ne!(Channel::Sms, Channel::Email);
    let _ = format!("{:?}", Channel::Sms);
}

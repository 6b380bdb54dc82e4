use axevent::record::{from_record, to_record};
use axevent::{ErrorKind, Event, EventRecord, KeyValueSet};

#[derive(Debug, Default, PartialEq, EventRecord)]
struct Person {
    #[event(key = "age")]
    years: i32,
    name: String,
}

#[allow(non_snake_case)]
#[derive(Debug, Default, PartialEq, EventRecord)]
struct Reading {
    #[event(key = "level")]
    value: f64,
    Active: bool,
    samples: Vec<f64>,
    #[event(skip)]
    label: String,
}

fn alice() -> KeyValueSet {
    let mut kvs = KeyValueSet::new();
    kvs.insert("age", None, 42).unwrap();
    kvs.insert("name", None, "Alice").unwrap();
    kvs
}

#[test]
fn derived_record_reads_event_payload() {
    let event = Event::new(1, alice());
    let person: Person = event.to_record().unwrap();
    assert_eq!(
        person,
        Person {
            years: 42,
            name: "Alice".into()
        }
    );
}

#[test]
fn missing_override_key_is_reported() {
    let mut kvs = KeyValueSet::new();
    kvs.insert("name", None, "Alice").unwrap();

    let err = to_record(&kvs, &mut Person::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::KeyNotFound);
    assert_eq!(err.entry().map(|e| e.key()), Some("age"));
}

#[test]
fn field_table_follows_declaration_order() {
    let fields = Reading::event_fields();
    let table: Vec<(&str, &str, bool)> = fields
        .iter()
        .map(|f| (f.name(), f.key(), f.is_supported()))
        .collect();
    assert_eq!(
        table,
        [
            ("value", "level", true),
            ("Active", "active", true),
            ("samples", "samples", false),
            ("label", "label", false),
        ]
    );
    // Built once, then shared.
    assert!(std::ptr::eq(Reading::event_fields(), Reading::event_fields()));
}

#[test]
fn unsupported_and_skipped_fields_are_left_alone() {
    let mut kvs = KeyValueSet::new();
    kvs.insert("level", None, 0.75).unwrap();
    kvs.insert("active", None, true).unwrap();

    let mut reading = Reading {
        samples: vec![1.0],
        label: "kept".into(),
        ..Reading::default()
    };
    to_record(&kvs, &mut reading).unwrap();

    assert_eq!(reading.value, 0.75);
    assert!(reading.Active);
    assert_eq!(reading.samples, [1.0]);
    assert_eq!(reading.label, "kept");
}

#[test]
fn from_record_mirrors_to_record() {
    let person = Person {
        years: 42,
        name: "Alice".into(),
    };
    let kvs = from_record(&person).unwrap();
    assert_eq!(kvs, alice());

    let reading = Reading {
        value: 1.5,
        Active: false,
        samples: vec![2.0],
        label: "ignored".into(),
    };
    let kvs = from_record(&reading).unwrap();
    let keys: Vec<&str> = kvs.keys().map(|k| k.key()).collect();
    assert_eq!(keys, ["level", "active"]);
}

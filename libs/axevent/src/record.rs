//! Mapping between application records and key-value sets.
//!
//! A record type describes its fields once, as a table of [`FieldSpec`]s,
//! usually generated by `#[derive(EventRecord)]`:
//!
//! ```ignore
//! #[derive(EventRecord, Default)]
//! struct PortState {
//!     #[event(key = "port")]
//!     index: i32,
//!     active: bool,
//!     #[event(skip)]
//!     seen: u64,
//! }
//! ```
//!
//! A field's key is its override label, or else its name lower-cased.
//! Supported kinds are `i32`, `f64`, `String` and `bool`; anything else is
//! an unsupported field and is skipped in both directions.

use crate::error::EventError;
use crate::kvs::KeyValueSet;
use crate::value::TypedValue;

/// Typed accessors of one record field.
pub enum FieldAccess<R> {
    Integer {
        get: fn(&R) -> i32,
        set: fn(&mut R, i32),
    },
    Double {
        get: fn(&R) -> f64,
        set: fn(&mut R, f64),
    },
    String {
        get: fn(&R) -> &str,
        set: fn(&mut R, String),
    },
    Boolean {
        get: fn(&R) -> bool,
        set: fn(&mut R, bool),
    },
    Unsupported,
}

/// One row of a record's field table.
pub struct FieldSpec<R> {
    name: &'static str,
    key: String,
    access: FieldAccess<R>,
}

impl<R> FieldSpec<R> {
    fn new(name: &'static str, access: FieldAccess<R>) -> Self {
        Self {
            name,
            key: name.to_lowercase(),
            access,
        }
    }

    pub fn integer(name: &'static str, get: fn(&R) -> i32, set: fn(&mut R, i32)) -> Self {
        Self::new(name, FieldAccess::Integer { get, set })
    }

    pub fn double(name: &'static str, get: fn(&R) -> f64, set: fn(&mut R, f64)) -> Self {
        Self::new(name, FieldAccess::Double { get, set })
    }

    pub fn string(name: &'static str, get: fn(&R) -> &str, set: fn(&mut R, String)) -> Self {
        Self::new(name, FieldAccess::String { get, set })
    }

    pub fn boolean(name: &'static str, get: fn(&R) -> bool, set: fn(&mut R, bool)) -> Self {
        Self::new(name, FieldAccess::Boolean { get, set })
    }

    /// Field the marshaller does not handle.
    pub fn unsupported(name: &'static str) -> Self {
        Self::new(name, FieldAccess::Unsupported)
    }

    /// Override the derived key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self.access, FieldAccess::Unsupported)
    }
}

/// Record type with a static field table.
///
/// The table is built once per type, usually in a `OnceLock`:
///
/// ```ignore
/// fn event_fields() -> &'static [FieldSpec<Self>] {
///     static FIELDS: OnceLock<Vec<FieldSpec<Port>>> = OnceLock::new();
///     FIELDS.get_or_init(|| vec![FieldSpec::integer("Index", |r| r.index, |r, v| r.index = v)])
/// }
/// ```
pub trait EventRecord: Sized + 'static {
    fn event_fields() -> &'static [FieldSpec<Self>];
}

fn validate<R>(field: &FieldSpec<R>) -> Result<(), EventError> {
    if field.is_supported() && field.key.is_empty() {
        return Err(EventError::InvalidTarget {
            record: std::any::type_name::<R>(),
            reason: format!("field '{}' maps to an empty key", field.name),
        });
    }
    Ok(())
}

/// Fill `target` from the default-namespace entries of `kvs`.
///
/// Aborts at the first field whose key is missing or holds another kind;
/// the error is wrapped with that key.
pub fn to_record<R: EventRecord>(kvs: &KeyValueSet, target: &mut R) -> Result<(), EventError> {
    for field in R::event_fields() {
        validate(field)?;
        let key = field.key.as_str();
        let ctx = |e: EventError| e.with_context(key);
        match field.access {
            FieldAccess::Integer { set, .. } => set(target, kvs.get_integer(key, None).map_err(ctx)?),
            FieldAccess::Double { set, .. } => set(target, kvs.get_double(key, None).map_err(ctx)?),
            FieldAccess::String { set, .. } => {
                set(target, kvs.get_string(key, None).map_err(ctx)?.to_string())
            }
            FieldAccess::Boolean { set, .. } => set(target, kvs.get_boolean(key, None).map_err(ctx)?),
            FieldAccess::Unsupported => {
                tracing::trace!(field = field.name, "skipping unsupported field");
            }
        }
    }
    Ok(())
}

/// Append the supported fields of `record` to `kvs` under `namespace`.
pub fn append_record<R: EventRecord>(
    kvs: &mut KeyValueSet,
    record: &R,
    namespace: Option<&str>,
) -> Result<(), EventError> {
    for field in R::event_fields() {
        validate(field)?;
        let value = match field.access {
            FieldAccess::Integer { get, .. } => TypedValue::Integer(get(record)),
            FieldAccess::Double { get, .. } => TypedValue::Double(get(record)),
            FieldAccess::String { get, .. } => TypedValue::String(get(record).to_string()),
            FieldAccess::Boolean { get, .. } => TypedValue::Boolean(get(record)),
            FieldAccess::Unsupported => continue,
        };
        let value_type = value.value_type();
        kvs.add_key_value(&field.key, namespace, value, value_type)
            .map_err(|e| e.with_context(&field.key))?;
    }
    Ok(())
}

/// Build a new set from the supported fields of `record`, in field order.
pub fn from_record<R: EventRecord>(record: &R) -> Result<KeyValueSet, EventError> {
    let mut kvs = KeyValueSet::new();
    append_record(&mut kvs, record, None)?;
    Ok(kvs)
}

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;

    use super::*;
    use crate::error::ErrorKind;

    #[derive(Debug, Default, PartialEq)]
    struct Person {
        age: i32,
        name: String,
        score: f64,
        admin: bool,
        tags: Vec<String>,
    }

    impl EventRecord for Person {
        fn event_fields() -> &'static [FieldSpec<Self>] {
            static FIELDS: OnceLock<Vec<FieldSpec<Person>>> = OnceLock::new();
            FIELDS.get_or_init(|| {
                vec![
                    FieldSpec::<Person>::integer("Age", |r| r.age, |r, v| r.age = v).with_key("age"),
                    FieldSpec::<Person>::string("Name", |r| r.name.as_str(), |r, v| r.name = v),
                    FieldSpec::<Person>::double("Score", |r| r.score, |r, v| r.score = v),
                    FieldSpec::<Person>::boolean("Admin", |r| r.admin, |r, v| r.admin = v)
                        .with_key("is_admin"),
                    FieldSpec::<Person>::unsupported("Tags"),
                ]
            })
        }
    }

    struct Broken;

    impl EventRecord for Broken {
        fn event_fields() -> &'static [FieldSpec<Self>] {
            static FIELDS: OnceLock<Vec<FieldSpec<Broken>>> = OnceLock::new();
            FIELDS.get_or_init(|| vec![FieldSpec::<Broken>::integer("Value", |_| 0, |_, _| {}).with_key("")])
        }
    }

    fn person_kvs() -> KeyValueSet {
        let mut kvs = KeyValueSet::new();
        kvs.insert("age", None, 42).unwrap();
        kvs.insert("name", None, "Alice").unwrap();
        kvs.insert("score", None, 9.5).unwrap();
        kvs.insert("is_admin", None, true).unwrap();
        kvs
    }

    #[test]
    fn key_is_override_or_lowercased_name() {
        let keys: Vec<String> = Person::event_fields()
            .iter()
            .map(|f| f.key().to_string())
            .collect();
        assert_eq!(keys, ["age", "name", "score", "is_admin", "tags"]);
        assert!(std::ptr::eq(Person::event_fields(), Person::event_fields()));
    }

    #[test]
    fn to_record_fills_supported_fields() {
        let mut person = Person {
            tags: vec!["kept".into()],
            ..Person::default()
        };
        to_record(&person_kvs(), &mut person).unwrap();

        assert_eq!(
            person,
            Person {
                age: 42,
                name: "Alice".into(),
                score: 9.5,
                admin: true,
                tags: vec!["kept".into()],
            }
        );
    }

    #[test]
    fn missing_key_aborts_and_names_the_key() {
        let mut kvs = KeyValueSet::new();
        kvs.insert("name", None, "Alice").unwrap();

        let mut person = Person::default();
        let err = to_record(&kvs, &mut person).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::KeyNotFound);
        assert_eq!(err.entry().map(|e| e.key()), Some("age"));
        assert_eq!(err.to_string(), "age: key age not found (requested int)");
        // Aborted before reaching `name`.
        assert_eq!(person.name, "");
    }

    #[test]
    fn wrong_kind_is_a_type_mismatch() {
        let mut kvs = KeyValueSet::new();
        kvs.insert("age", None, 42).unwrap();
        kvs.insert("name", None, "Alice").unwrap();
        kvs.insert("score", None, 9).unwrap();
        kvs.insert("is_admin", None, true).unwrap();

        let err = to_record(&kvs, &mut Person::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(err.entry().map(|e| e.key()), Some("score"));
    }

    #[test]
    fn from_record_uses_same_keys_in_field_order() {
        let person = Person {
            age: 7,
            name: "Bob".into(),
            score: 1.5,
            admin: false,
            tags: Vec::new(),
        };
        let kvs = from_record(&person).unwrap();

        let keys: Vec<&str> = kvs.iter().map(|e| e.key()).collect();
        assert_eq!(keys, ["age", "name", "score", "is_admin"]);

        let mut back = Person::default();
        to_record(&kvs, &mut back).unwrap();
        assert_eq!(back, person);
    }

    #[test]
    fn append_record_fails_on_existing_key() {
        let mut kvs = KeyValueSet::new();
        kvs.insert("name", None, "taken").unwrap();

        let err = append_record(&mut kvs, &Person::default(), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateKey);
        assert_eq!(err.entry().map(|e| e.key()), Some("name"));
    }

    #[test]
    fn empty_key_is_an_invalid_target() {
        let err = to_record(&KeyValueSet::new(), &mut Broken).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTarget);
        assert_eq!(from_record(&Broken).unwrap_err().kind(), ErrorKind::InvalidTarget);
    }
}

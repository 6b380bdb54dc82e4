use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EventError;
use crate::marker::{Marker, NiceNames};
use crate::value::{TypedValue, ValueType};

/// Identity of an entry: key plus optional namespace.
///
/// `namespace = None` is the default (unqualified) namespace and is distinct
/// from every named namespace, so `("port", None)` and `("port", "tnsaxis")`
/// can coexist in one set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct KeyEntry {
    key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
}

impl KeyEntry {
    pub fn new(key: impl Into<String>, namespace: Option<&str>) -> Self {
        Self {
            key: key.into(),
            namespace: namespace.map(str::to_string),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    fn matches(&self, key: &str, namespace: Option<&str>) -> bool {
        self.key == key && self.namespace.as_deref() == namespace
    }
}

impl fmt::Display for KeyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}:{}", self.key),
            None => f.write_str(&self.key),
        }
    }
}

/// A payload entry as written in an event declaration: the value plus the
/// type the author declared for it.
///
/// Config form: `{ key = "port", namespace = "tnsaxis", type = "int", value = 1 }`.
/// A declared type that disagrees with the value is only reported when the
/// entry is inserted into a set. An `int` value outside the `i32` range is
/// rejected while deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawKeyValueEntry")]
pub struct KeyValueEntry {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    pub value: TypedValue,
}

impl KeyValueEntry {
    /// Entry in the default namespace, typed after its value.
    pub fn new(key: impl Into<String>, value: impl Into<TypedValue>) -> Self {
        let value = value.into();
        Self {
            key: key.into(),
            namespace: None,
            value_type: value.value_type(),
            value,
        }
    }

    /// Entry with an explicitly declared type.
    pub fn declared(key: impl Into<String>, value: impl Into<TypedValue>, value_type: ValueType) -> Self {
        Self {
            key: key.into(),
            namespace: None,
            value_type,
            value: value.into(),
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

#[derive(Deserialize)]
struct RawKeyValueEntry {
    key: String,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(rename = "type")]
    value_type: ValueType,
    value: TypedValue,
}

impl TryFrom<RawKeyValueEntry> for KeyValueEntry {
    type Error = String;

    fn try_from(raw: RawKeyValueEntry) -> Result<Self, Self::Error> {
        // Integers beyond i32 only fit the Double variant.
        if let (ValueType::Integer, TypedValue::Double(v)) = (raw.value_type, &raw.value) {
            if v.fract() == 0.0 && (*v < f64::from(i32::MIN) || *v > f64::from(i32::MAX)) {
                return Err(format!("value {v} of key {} is out of range for int", raw.key));
            }
        }
        Ok(Self {
            key: raw.key,
            namespace: raw.namespace,
            value_type: raw.value_type,
            value: raw.value,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct Binding {
    #[serde(flatten)]
    pub(crate) entry: KeyEntry,
    #[serde(rename = "type")]
    value_type: ValueType,
    pub(crate) value: TypedValue,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) markers: Vec<Marker>,
    #[serde(skip_serializing_if = "NiceNames::is_empty")]
    pub(crate) nice_names: NiceNames,
}

/// One entry of a [`KeyValueSet`] as seen during enumeration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryRef<'a> {
    pub entry: &'a KeyEntry,
    pub value: &'a TypedValue,
    pub markers: &'a [Marker],
    pub nice_names: &'a NiceNames,
}

impl<'a> EntryRef<'a> {
    pub fn key(&self) -> &'a str {
        self.entry.key()
    }

    pub fn namespace(&self) -> Option<&'a str> {
        self.entry.namespace()
    }
}

/// Ordered, typed, namespace-qualified event payload.
///
/// Insertion order is the wire order: topic0 must be enumerated before
/// topic1 and so on. Lookups are linear, sets hold a handful of entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct KeyValueSet {
    bindings: Vec<Binding>,
}

impl KeyValueSet {
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    /// Insert a new binding. `value_type` is the declared type and must
    /// match the value's own tag.
    pub fn add_key_value(
        &mut self,
        key: &str,
        namespace: Option<&str>,
        value: TypedValue,
        value_type: ValueType,
    ) -> Result<(), EventError> {
        if self.position(key, namespace).is_some() {
            return Err(EventError::DuplicateKey {
                entry: KeyEntry::new(key, namespace),
            });
        }
        if value.value_type() != value_type {
            return Err(EventError::TypeMismatch {
                entry: KeyEntry::new(key, namespace),
                expected: value_type,
                actual: value.value_type(),
            });
        }
        tracing::trace!(key, namespace, %value_type, "add key value");
        self.bindings.push(Binding {
            entry: KeyEntry::new(key, namespace),
            value_type,
            value,
            markers: Vec::new(),
            nice_names: NiceNames::default(),
        });
        Ok(())
    }

    /// Insert a binding typed after its value.
    pub fn insert(
        &mut self,
        key: &str,
        namespace: Option<&str>,
        value: impl Into<TypedValue>,
    ) -> Result<(), EventError> {
        let value = value.into();
        let value_type = value.value_type();
        self.add_key_value(key, namespace, value, value_type)
    }

    /// Insert a declaration entry.
    pub fn add_entry(&mut self, entry: &KeyValueEntry) -> Result<(), EventError> {
        self.add_key_value(
            &entry.key,
            entry.namespace.as_deref(),
            entry.value.clone(),
            entry.value_type,
        )
    }

    pub fn get(&self, key: &str, namespace: Option<&str>) -> Option<&TypedValue> {
        self.position(key, namespace).map(|i| &self.bindings[i].value)
    }

    pub fn contains(&self, key: &str, namespace: Option<&str>) -> bool {
        self.position(key, namespace).is_some()
    }

    pub fn get_integer(&self, key: &str, namespace: Option<&str>) -> Result<i32, EventError> {
        let value = self.lookup(key, namespace, ValueType::Integer)?;
        value
            .as_integer()
            .ok_or_else(|| mismatch(key, namespace, ValueType::Integer, value))
    }

    pub fn get_double(&self, key: &str, namespace: Option<&str>) -> Result<f64, EventError> {
        let value = self.lookup(key, namespace, ValueType::Double)?;
        value
            .as_double()
            .ok_or_else(|| mismatch(key, namespace, ValueType::Double, value))
    }

    pub fn get_string(&self, key: &str, namespace: Option<&str>) -> Result<&str, EventError> {
        let value = self.lookup(key, namespace, ValueType::String)?;
        value
            .as_str()
            .ok_or_else(|| mismatch(key, namespace, ValueType::String, value))
    }

    pub fn get_boolean(&self, key: &str, namespace: Option<&str>) -> Result<bool, EventError> {
        let value = self.lookup(key, namespace, ValueType::Boolean)?;
        value
            .as_boolean()
            .ok_or_else(|| mismatch(key, namespace, ValueType::Boolean, value))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Enumerate entries in insertion order. Each call starts from the
    /// first entry.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            bindings: self.bindings.iter(),
        }
    }

    /// Entry identities in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &KeyEntry> + '_ {
        self.bindings.iter().map(|b| &b.entry)
    }

    pub(crate) fn binding_mut(
        &mut self,
        key: &str,
        namespace: Option<&str>,
    ) -> Result<&mut Binding, EventError> {
        match self.position(key, namespace) {
            Some(i) => Ok(&mut self.bindings[i]),
            None => Err(EventError::KeyNotFound {
                entry: KeyEntry::new(key, namespace),
                requested: None,
            }),
        }
    }

    /// Replace the value of an existing entry with one of the same type.
    pub(crate) fn update_value(
        &mut self,
        key: &str,
        namespace: Option<&str>,
        value: TypedValue,
    ) -> Result<(), EventError> {
        let binding = self.binding_mut(key, namespace)?;
        if binding.value_type != value.value_type() {
            return Err(EventError::TypeMismatch {
                entry: KeyEntry::new(key, namespace),
                expected: binding.value_type,
                actual: value.value_type(),
            });
        }
        binding.value = value;
        Ok(())
    }

    pub(crate) fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    fn position(&self, key: &str, namespace: Option<&str>) -> Option<usize> {
        self.bindings.iter().position(|b| b.entry.matches(key, namespace))
    }

    fn lookup(
        &self,
        key: &str,
        namespace: Option<&str>,
        requested: ValueType,
    ) -> Result<&TypedValue, EventError> {
        self.get(key, namespace).ok_or_else(|| {
            tracing::trace!(key, namespace, %requested, "key not found");
            EventError::KeyNotFound {
                entry: KeyEntry::new(key, namespace),
                requested: Some(requested),
            }
        })
    }
}

fn mismatch(key: &str, namespace: Option<&str>, expected: ValueType, found: &TypedValue) -> EventError {
    EventError::TypeMismatch {
        entry: KeyEntry::new(key, namespace),
        expected,
        actual: found.value_type(),
    }
}

/// Iterator over the entries of a [`KeyValueSet`], in insertion order.
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    bindings: std::slice::Iter<'a, Binding>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = EntryRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.bindings.next().map(|b| EntryRef {
            entry: &b.entry,
            value: &b.value,
            markers: &b.markers,
            nice_names: &b.nice_names,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.bindings.size_hint()
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a KeyValueSet {
    type Item = EntryRef<'a>;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

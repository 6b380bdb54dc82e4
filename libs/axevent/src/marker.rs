//! Semantic annotations on entries of a [`KeyValueSet`].
//!
//! A *source* key distinguishes between instances of the same declaration
//! (which I/O port), a *data* key carries the state the event reports (high
//! or low). Only declarations with at most one source key and exactly one
//! data key can trigger actions. Any combination can be built; use
//! [`KeyValueSet::check_trigger_eligible`] to verify a declaration meant for
//! triggering.

use serde::{Deserialize, Serialize};

use crate::error::EventError;
use crate::kvs::{KeyEntry, KeyValueSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "marker", content = "tag")]
pub enum Marker {
    Source,
    Data,
    UserDefined(String),
}

/// Human readable labels for a key and its value. Display only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NiceNames {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl NiceNames {
    pub fn is_empty(&self) -> bool {
        self.key.is_none() && self.value.is_none()
    }
}

/// Source and data key counts of a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerConformance {
    pub source_keys: usize,
    pub data_keys: usize,
}

impl TriggerConformance {
    pub fn is_trigger_eligible(&self) -> bool {
        self.source_keys <= 1 && self.data_keys == 1
    }
}

impl KeyValueSet {
    pub fn mark_as_source(&mut self, key: &str, namespace: Option<&str>) -> Result<(), EventError> {
        self.mark(key, namespace, Marker::Source)
    }

    pub fn mark_as_data(&mut self, key: &str, namespace: Option<&str>) -> Result<(), EventError> {
        self.mark(key, namespace, Marker::Data)
    }

    pub fn mark_as_user_defined(
        &mut self,
        key: &str,
        namespace: Option<&str>,
        tag: &str,
    ) -> Result<(), EventError> {
        self.mark(key, namespace, Marker::UserDefined(tag.to_string()))
    }

    /// Set the key and/or value nice name of an entry.
    ///
    /// A label can be set once: supplying a label that is already present
    /// fails with `NiceNameAlreadySet` and leaves the entry unchanged.
    pub fn add_nice_names(
        &mut self,
        key: &str,
        namespace: Option<&str>,
        key_nice_name: Option<&str>,
        value_nice_name: Option<&str>,
    ) -> Result<(), EventError> {
        let binding = self.binding_mut(key, namespace)?;
        let names = &mut binding.nice_names;
        if (key_nice_name.is_some() && names.key.is_some())
            || (value_nice_name.is_some() && names.value.is_some())
        {
            return Err(EventError::NiceNameAlreadySet {
                entry: KeyEntry::new(key, namespace),
            });
        }
        if let Some(label) = key_nice_name {
            names.key = Some(label.to_string());
        }
        if let Some(label) = value_nice_name {
            names.value = Some(label.to_string());
        }
        Ok(())
    }

    /// Markers of an entry, `None` if the entry does not exist.
    pub fn markers(&self, key: &str, namespace: Option<&str>) -> Option<&[Marker]> {
        self.iter()
            .find(|e| e.key() == key && e.namespace() == namespace)
            .map(|e| e.markers)
    }

    pub fn nice_names(&self, key: &str, namespace: Option<&str>) -> Option<&NiceNames> {
        self.iter()
            .find(|e| e.key() == key && e.namespace() == namespace)
            .map(|e| e.nice_names)
    }

    pub fn source_entries(&self) -> impl Iterator<Item = &KeyEntry> + '_ {
        self.marked_with(Marker::Source)
    }

    pub fn data_entries(&self) -> impl Iterator<Item = &KeyEntry> + '_ {
        self.marked_with(Marker::Data)
    }

    pub fn trigger_conformance(&self) -> TriggerConformance {
        TriggerConformance {
            source_keys: self.source_entries().count(),
            data_keys: self.data_entries().count(),
        }
    }

    pub fn check_trigger_eligible(&self) -> Result<(), EventError> {
        let conformance = self.trigger_conformance();
        if conformance.is_trigger_eligible() {
            Ok(())
        } else {
            Err(EventError::NotTriggerEligible {
                source_keys: conformance.source_keys,
                data_keys: conformance.data_keys,
            })
        }
    }

    fn mark(&mut self, key: &str, namespace: Option<&str>, marker: Marker) -> Result<(), EventError> {
        let binding = self.binding_mut(key, namespace)?;
        if !binding.markers.contains(&marker) {
            binding.markers.push(marker);
        }
        Ok(())
    }

    fn marked_with(&self, marker: Marker) -> impl Iterator<Item = &KeyEntry> + '_ {
        self.bindings()
            .iter()
            .filter(move |b| b.markers.contains(&marker))
            .map(|b| &b.entry)
    }
}

// ---------------------------------------------------------------------------
// Declaration-side marks, as listed by an event author or a config file.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMark {
    pub key: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

impl SourceMark {
    pub fn new(key: impl Into<String>, namespace: Option<&str>) -> Self {
        Self {
            key: key.into(),
            namespace: namespace.map(str::to_string),
        }
    }

    pub fn apply(&self, kvs: &mut KeyValueSet) -> Result<(), EventError> {
        kvs.mark_as_source(&self.key, self.namespace.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataMark {
    pub key: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

impl DataMark {
    pub fn new(key: impl Into<String>, namespace: Option<&str>) -> Self {
        Self {
            key: key.into(),
            namespace: namespace.map(str::to_string),
        }
    }

    pub fn apply(&self, kvs: &mut KeyValueSet) -> Result<(), EventError> {
        kvs.mark_as_data(&self.key, self.namespace.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDefinedMark {
    pub key: String,
    #[serde(default)]
    pub namespace: Option<String>,
    pub tag: String,
}

impl UserDefinedMark {
    pub fn new(key: impl Into<String>, namespace: Option<&str>, tag: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            namespace: namespace.map(str::to_string),
            tag: tag.into(),
        }
    }

    pub fn apply(&self, kvs: &mut KeyValueSet) -> Result<(), EventError> {
        kvs.mark_as_user_defined(&self.key, self.namespace.as_deref(), &self.tag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NiceNameMark {
    pub key: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub key_nice_name: Option<String>,
    #[serde(default)]
    pub value_nice_name: Option<String>,
}

impl NiceNameMark {
    pub fn new(key: impl Into<String>, namespace: Option<&str>) -> Self {
        Self {
            key: key.into(),
            namespace: namespace.map(str::to_string),
            key_nice_name: None,
            value_nice_name: None,
        }
    }

    pub fn key_nice_name(mut self, label: impl Into<String>) -> Self {
        self.key_nice_name = Some(label.into());
        self
    }

    pub fn value_nice_name(mut self, label: impl Into<String>) -> Self {
        self.value_nice_name = Some(label.into());
        self
    }

    pub fn apply(&self, kvs: &mut KeyValueSet) -> Result<(), EventError> {
        kvs.add_nice_names(
            &self.key,
            self.namespace.as_deref(),
            self.key_nice_name.as_deref(),
            self.value_nice_name.as_deref(),
        )
    }
}

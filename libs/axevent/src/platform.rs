use serde::{Deserialize, Serialize};

use crate::error::EventError;
use crate::kvs::{KeyValueEntry, KeyValueSet};
use crate::marker::{DataMark, NiceNameMark, SourceMark, UserDefinedMark};
use crate::setup::AppSetup;
use crate::topic::{NAMESPACE_TNSAXIS, new_tnsaxis_event};

/// topic0 of every custom application event.
pub const PLATFORM_TOPIC: &str = "CameraApplicationPlatform";

/// Custom application event under
/// `tnsaxis:CameraApplicationPlatform/<app name>/<event>[/<subtopic>]`.
///
/// The nice name of topic2 is generated by [`PlatformEvent::build`] as
/// `"<friendly name>: <nice name or event name>"`; listing a value nice
/// name for topic2 in `nice_names` makes the build fail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformEvent {
    /// Event name, topic2 unless `topic` is set.
    pub name: String,
    #[serde(default)]
    pub nice_name: Option<String>,
    /// Explicit topic2.
    #[serde(default)]
    pub topic: Option<String>,
    /// Optional topic3.
    #[serde(default)]
    pub subtopic: Option<String>,
    /// Stateless events are pulses; stateful ones report a property whose
    /// last value is kept by the bus.
    #[serde(default)]
    pub stateless: bool,
    #[serde(default)]
    pub entries: Vec<KeyValueEntry>,
    #[serde(default)]
    pub source: Vec<SourceMark>,
    #[serde(default)]
    pub data: Vec<DataMark>,
    #[serde(default)]
    pub user_defined: Vec<UserDefinedMark>,
    #[serde(default)]
    pub nice_names: Vec<NiceNameMark>,
}

impl PlatformEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn nice_name(mut self, nice_name: impl Into<String>) -> Self {
        self.nice_name = Some(nice_name.into());
        self
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn subtopic(mut self, subtopic: impl Into<String>) -> Self {
        self.subtopic = Some(subtopic.into());
        self
    }

    pub fn stateless(mut self, stateless: bool) -> Self {
        self.stateless = stateless;
        self
    }

    pub fn entry(mut self, entry: KeyValueEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn source(mut self, mark: SourceMark) -> Self {
        self.source.push(mark);
        self
    }

    pub fn data(mut self, mark: DataMark) -> Self {
        self.data.push(mark);
        self
    }

    pub fn user_defined(mut self, mark: UserDefinedMark) -> Self {
        self.user_defined.push(mark);
        self
    }

    pub fn with_nice_names(mut self, mark: NiceNameMark) -> Self {
        self.nice_names.push(mark);
        self
    }

    /// topic2 of the built declaration.
    pub fn topic2(&self) -> &str {
        self.topic.as_deref().unwrap_or(&self.name)
    }

    /// Generated value nice name of topic2.
    pub fn topic2_nice_name(&self, setup: &AppSetup) -> String {
        let label = self.nice_name.as_deref().unwrap_or(&self.name);
        format!("{}: {}", setup.friendly_name, label)
    }

    /// Compose topics and payload, then apply source, data and user-defined
    /// markers and the nice names, stopping at the first error.
    pub fn build(&self, setup: &AppSetup) -> Result<KeyValueSet, EventError> {
        let mut kvs = new_tnsaxis_event(
            PLATFORM_TOPIC,
            &setup.app_name,
            Some(self.topic2()),
            self.subtopic.as_deref(),
            &self.entries,
        )?;

        for mark in &self.source {
            mark.apply(&mut kvs)
                .map_err(|e| e.with_context(format!("source marker '{}'", mark.key)))?;
        }
        for mark in &self.data {
            mark.apply(&mut kvs)
                .map_err(|e| e.with_context(format!("data marker '{}'", mark.key)))?;
        }
        for mark in &self.user_defined {
            mark.apply(&mut kvs)
                .map_err(|e| e.with_context(format!("user defined marker '{}'", mark.key)))?;
        }

        let topic2 = NiceNameMark::new("topic2", Some(NAMESPACE_TNSAXIS))
            .value_nice_name(self.topic2_nice_name(setup));
        for mark in self.nice_names.iter().chain(std::iter::once(&topic2)) {
            mark.apply(&mut kvs)
                .map_err(|e| e.with_context(format!("nice name '{}'", mark.key)))?;
        }

        tracing::debug!(
            app = %setup.app_name,
            event = %self.name,
            entries = kvs.len(),
            "built platform event"
        );
        Ok(kvs)
    }
}

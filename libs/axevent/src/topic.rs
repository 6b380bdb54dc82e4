//! Topic composition.
//!
//! A topic is two to four string entries `topic0..topic3` at the head of a
//! declaration. topic0 lives in the ONVIF namespace (`tns1`) for
//! standards-conformant events or in the vendor namespace (`tnsaxis`);
//! topic1..topic3 are always vendor-qualified.

use crate::error::EventError;
use crate::kvs::{KeyValueEntry, KeyValueSet};
use crate::value::{TypedValue, ValueType};

/// ONVIF topic namespace.
pub const NAMESPACE_TNS1: &str = "tns1";
/// Vendor topic namespace.
pub const NAMESPACE_TNSAXIS: &str = "tnsaxis";

const TOPIC_KEYS: [&str; 4] = ["topic0", "topic1", "topic2", "topic3"];

/// Namespace governing topic0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicRoot {
    Onvif,
    Vendor,
}

impl TopicRoot {
    pub fn namespace(self) -> &'static str {
        match self {
            TopicRoot::Onvif => NAMESPACE_TNS1,
            TopicRoot::Vendor => NAMESPACE_TNSAXIS,
        }
    }
}

/// Declaration rooted in the ONVIF namespace.
pub fn new_tns1_event(
    topic0: &str,
    topic1: &str,
    topic2: Option<&str>,
    topic3: Option<&str>,
    entries: &[KeyValueEntry],
) -> Result<KeyValueSet, EventError> {
    compose(TopicRoot::Onvif, [Some(topic0), Some(topic1), topic2, topic3], entries)
}

/// Declaration rooted in the vendor namespace.
pub fn new_tnsaxis_event(
    topic0: &str,
    topic1: &str,
    topic2: Option<&str>,
    topic3: Option<&str>,
    entries: &[KeyValueEntry],
) -> Result<KeyValueSet, EventError> {
    compose(TopicRoot::Vendor, [Some(topic0), Some(topic1), topic2, topic3], entries)
}

/// Insert the topic levels in order, then the payload entries in the order
/// given. Stops at the first failing insertion; the error names the payload
/// key, which is the topic slot when a payload entry reuses one.
pub fn compose(
    root: TopicRoot,
    topics: [Option<&str>; 4],
    entries: &[KeyValueEntry],
) -> Result<KeyValueSet, EventError> {
    let mut kvs = KeyValueSet::new();

    // Slots are distinct keys in an empty set; only the payload can clash.
    for (level, (key, topic)) in TOPIC_KEYS.iter().zip(topics).enumerate() {
        let Some(topic) = topic else { continue };
        let namespace = if level == 0 {
            root.namespace()
        } else {
            NAMESPACE_TNSAXIS
        };
        kvs.add_key_value(
            key,
            Some(namespace),
            TypedValue::String(topic.to_string()),
            ValueType::String,
        )
        .map_err(|e| e.with_context(key))?;
    }

    for entry in entries {
        kvs.add_entry(entry)
            .map_err(|e| e.with_context(&entry.key))?;
    }

    tracing::debug!(
        namespace = root.namespace(),
        entries = kvs.len(),
        "composed topic event"
    );
    Ok(kvs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn keys(kvs: &KeyValueSet) -> Vec<String> {
        kvs.iter().map(|e| e.entry.to_string()).collect()
    }

    #[test]
    fn skipped_levels_leave_no_entries() {
        let kvs = new_tnsaxis_event(
            "Device",
            "IO",
            None,
            None,
            &[KeyValueEntry::new("port", 3)],
        )
        .unwrap();

        let plain: Vec<&str> = kvs.iter().map(|e| e.key()).collect();
        assert_eq!(plain, ["topic0", "topic1", "port"]);
        assert_eq!(kvs.get_integer("port", None).unwrap(), 3);
    }

    #[test]
    fn tns1_roots_only_topic0_in_onvif_namespace() {
        let kvs = new_tns1_event("Device", "IO", Some("Port"), Some("State"), &[]).unwrap();
        assert_eq!(
            keys(&kvs),
            [
                "tns1:topic0",
                "tnsaxis:topic1",
                "tnsaxis:topic2",
                "tnsaxis:topic3"
            ]
        );
        assert_eq!(kvs.get_string("topic0", Some(NAMESPACE_TNS1)).unwrap(), "Device");
        assert_eq!(kvs.get_string("topic3", Some(NAMESPACE_TNSAXIS)).unwrap(), "State");
    }

    #[test]
    fn tnsaxis_roots_everything_in_vendor_namespace() {
        let kvs = new_tnsaxis_event("CameraApplicationPlatform", "MyApp", Some("Active"), None, &[])
            .unwrap();
        assert_eq!(
            keys(&kvs),
            ["tnsaxis:topic0", "tnsaxis:topic1", "tnsaxis:topic2"]
        );
    }

    #[test]
    fn payload_entries_follow_topics_in_given_order() {
        let entries = [
            KeyValueEntry::new("state", false),
            KeyValueEntry::new("port", 1),
            KeyValueEntry::new("label", "door").in_namespace("tnsaxis"),
        ];
        let kvs = new_tns1_event("Device", "IO", None, None, &entries).unwrap();
        assert_eq!(
            keys(&kvs),
            ["tns1:topic0", "tnsaxis:topic1", "state", "port", "tnsaxis:label"]
        );
    }

    #[test]
    fn payload_clashing_with_topic_names_the_payload_key() {
        let entries = [KeyValueEntry::new("topic1", "x").in_namespace("tnsaxis")];
        let err = new_tnsaxis_event("Device", "IO", None, None, &entries).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DuplicateKey);
        assert!(matches!(&err, EventError::Composition { field, .. } if field == "topic1"));
    }

    #[test]
    fn payload_reusing_topic3_is_labelled_topic3() {
        let entries = [KeyValueEntry::new("topic3", "Zone2").in_namespace(NAMESPACE_TNSAXIS)];
        let err = new_tnsaxis_event("Device", "IO", Some("Port"), Some("Zone1"), &entries)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DuplicateKey);
        assert_eq!(err.to_string(), "topic3: key tnsaxis:topic3 already exists");

        // Without a topic3 slot the same entry is an ordinary payload key.
        let kvs = new_tnsaxis_event("Device", "IO", Some("Port"), None, &entries).unwrap();
        assert_eq!(kvs.get_string("topic3", Some(NAMESPACE_TNSAXIS)).unwrap(), "Zone2");
    }

    #[test]
    fn first_failure_stops_composition() {
        let entries = [
            KeyValueEntry::declared("level", 1, ValueType::Double),
            KeyValueEntry::new("level", 2.0),
        ];
        let err = new_tnsaxis_event("Device", "IO", None, None, &entries).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(err.to_string(), "level: key level: expected double, found int");
    }
}

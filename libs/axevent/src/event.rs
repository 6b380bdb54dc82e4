use serde::Serialize;

use crate::error::EventError;
use crate::kvs::KeyValueSet;
use crate::record::{EventRecord, to_record};

/// Identifier of a subscription on the bus.
pub type SubscriptionId = u32;

/// An event as delivered to a subscription callback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub subscription: SubscriptionId,
    /// Delivery time in milliseconds (Unix epoch).
    pub ts_ms: i64,
    pub kvs: KeyValueSet,
}

impl Event {
    pub fn new(subscription: SubscriptionId, kvs: KeyValueSet) -> Self {
        Self {
            subscription,
            ts_ms: now_ms(),
            kvs,
        }
    }

    /// Fill `target` from the event payload. See [`to_record`].
    pub fn unmarshal<R: EventRecord>(&self, target: &mut R) -> Result<(), EventError> {
        to_record(&self.kvs, target)
    }

    /// Build a fresh record from the event payload.
    pub fn to_record<R: EventRecord + Default>(&self) -> Result<R, EventError> {
        let mut record = R::default();
        self.unmarshal(&mut record)?;
        Ok(record)
    }
}

/// Current Unix time in milliseconds.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

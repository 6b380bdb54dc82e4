//! Typed, topic-addressed event key-value sets.

extern crate self as axevent;

pub mod bus;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod kvs;
pub mod marker;
pub mod param;
pub mod platform;
pub mod record;
pub mod setup;
pub mod topic;
pub mod value;

pub use axevent_derive::EventRecord;

pub use bus::{BusError, EventPublisher, EventSubscriber, LocalBus};
pub use dispatch::Dispatcher;
pub use error::{ErrorKind, EventError};
pub use event::Event;
pub use kvs::{KeyEntry, KeyValueEntry, KeyValueSet};
pub use marker::{DataMark, Marker, NiceNameMark, SourceMark, UserDefinedMark};
pub use param::{MemoryParameters, ParamError, ParameterStore};
pub use platform::PlatformEvent;
pub use record::{EventRecord, FieldSpec};
pub use setup::AppSetup;
pub use topic::{NAMESPACE_TNS1, NAMESPACE_TNSAXIS};
pub use value::{TypedValue, ValueType};

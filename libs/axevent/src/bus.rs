//! Boundary to the event bus.
//!
//! [`EventPublisher`] and [`EventSubscriber`] are the surfaces the rest of
//! an application talks to. [`LocalBus`] implements both in-process, with
//! callbacks delivered through a [`Dispatcher`].

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::dispatch::{DispatchClosed, Dispatcher};
use crate::error::EventError;
use crate::event::{Event, SubscriptionId};
use crate::kvs::KeyValueSet;

/// Identifier of a declaration on the bus.
pub type DeclarationId = u32;

/// Subscription callback. Runs on the dispatch task.
pub type EventCallback = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("declaration {0} not found")]
    UnknownDeclaration(DeclarationId),

    #[error("subscription {0} not found")]
    UnknownSubscription(SubscriptionId),

    #[error(transparent)]
    Closed(#[from] DispatchClosed),

    #[error("event: {0}")]
    Event(#[from] EventError),
}

pub trait EventPublisher: Send + Sync {
    /// Declare an event. The set carries topics, payload entries with their
    /// initial values, markers and nice names.
    fn declare(&self, declaration: &KeyValueSet, stateless: bool) -> Result<DeclarationId, BusError>;

    fn undeclare(&self, id: DeclarationId) -> Result<(), BusError>;

    /// Send an instance of a declared event. `payload` holds new values
    /// for declared keys; topics come from the declaration.
    fn send(&self, id: DeclarationId, payload: &KeyValueSet) -> Result<(), BusError>;
}

pub trait EventSubscriber: Send + Sync {
    /// Subscribe to events containing every entry of `filter` with an
    /// equal value.
    fn subscribe(&self, filter: KeyValueSet, callback: EventCallback) -> Result<SubscriptionId, BusError>;

    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), BusError>;
}

struct Declaration {
    kvs: KeyValueSet,
    stateless: bool,
    /// Last sent state of a stateful declaration.
    last: Option<KeyValueSet>,
}

struct Subscription {
    filter: KeyValueSet,
    callback: EventCallback,
}

#[derive(Default)]
struct BusState {
    next_declaration: DeclarationId,
    next_subscription: SubscriptionId,
    declarations: BTreeMap<DeclarationId, Declaration>,
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
}

/// In-process bus.
pub struct LocalBus {
    state: Mutex<BusState>,
    dispatcher: Dispatcher,
}

impl LocalBus {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            state: Mutex::new(BusState::default()),
            dispatcher,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, subscription: SubscriptionId, callback: &EventCallback, kvs: &KeyValueSet) -> Result<(), BusError> {
        let callback = Arc::clone(callback);
        let event = Event::new(subscription, kvs.clone());
        self.dispatcher.dispatch(move || callback(&event))?;
        Ok(())
    }
}

/// Every filter entry is present in `kvs` with the same value.
pub fn matches(filter: &KeyValueSet, kvs: &KeyValueSet) -> bool {
    filter
        .iter()
        .all(|f| kvs.get(f.key(), f.namespace()) == Some(f.value))
}

/// Merge sent values into a copy of the declaration.
fn instantiate(declaration: &KeyValueSet, payload: &KeyValueSet) -> Result<KeyValueSet, EventError> {
    let mut kvs = declaration.clone();
    for entry in payload.iter() {
        kvs.update_value(entry.key(), entry.namespace(), entry.value.clone())
            .map_err(|e| e.with_context(entry.entry))?;
    }
    Ok(kvs)
}

impl EventPublisher for LocalBus {
    fn declare(&self, declaration: &KeyValueSet, stateless: bool) -> Result<DeclarationId, BusError> {
        let mut state = self.lock();
        state.next_declaration += 1;
        let id = state.next_declaration;
        state.declarations.insert(
            id,
            Declaration {
                kvs: declaration.clone(),
                stateless,
                last: None,
            },
        );
        tracing::debug!(declaration = id, stateless, entries = declaration.len(), "declared event");
        Ok(id)
    }

    fn undeclare(&self, id: DeclarationId) -> Result<(), BusError> {
        self.lock()
            .declarations
            .remove(&id)
            .map(|_| ())
            .ok_or(BusError::UnknownDeclaration(id))
    }

    fn send(&self, id: DeclarationId, payload: &KeyValueSet) -> Result<(), BusError> {
        let mut state = self.lock();
        let declaration = state
            .declarations
            .get_mut(&id)
            .ok_or(BusError::UnknownDeclaration(id))?;
        let kvs = instantiate(&declaration.kvs, payload)?;
        if !declaration.stateless {
            declaration.last = Some(kvs.clone());
        }

        let mut delivered = 0;
        for (sub_id, sub) in &state.subscriptions {
            if matches(&sub.filter, &kvs) {
                self.deliver(*sub_id, &sub.callback, &kvs)?;
                delivered += 1;
            }
        }
        tracing::trace!(declaration = id, delivered, "sent event");
        Ok(())
    }
}

impl EventSubscriber for LocalBus {
    fn subscribe(&self, filter: KeyValueSet, callback: EventCallback) -> Result<SubscriptionId, BusError> {
        let mut state = self.lock();
        state.next_subscription += 1;
        let id = state.next_subscription;

        // New subscribers learn the current state of stateful events.
        for declaration in state.declarations.values() {
            if let Some(last) = &declaration.last {
                if matches(&filter, last) {
                    self.deliver(id, &callback, last)?;
                }
            }
        }

        state.subscriptions.insert(id, Subscription { filter, callback });
        tracing::debug!(subscription = id, "subscribed");
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), BusError> {
        self.lock()
            .subscriptions
            .remove(&id)
            .map(|_| ())
            .ok_or(BusError::UnknownSubscription(id))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use super::*;
    use crate::error::ErrorKind;
    use crate::kvs::KeyValueEntry;
    use crate::marker::DataMark;
    use crate::platform::PlatformEvent;
    use crate::setup::AppSetup;
    use crate::topic::NAMESPACE_TNSAXIS;

    const RECV_TIMEOUT: Duration = Duration::from_secs(1);

    fn port_declaration(name: &str, stateless: bool) -> KeyValueSet {
        PlatformEvent::new(name)
            .stateless(stateless)
            .entry(KeyValueEntry::new("active", false))
            .data(DataMark::new("active", None))
            .build(&AppSetup::new("MyApp", "My Application"))
            .unwrap()
    }

    fn topic_filter(topic2: &str) -> KeyValueSet {
        let mut filter = KeyValueSet::new();
        filter.insert("topic1", Some(NAMESPACE_TNSAXIS), "MyApp").unwrap();
        filter.insert("topic2", Some(NAMESPACE_TNSAXIS), topic2).unwrap();
        filter
    }

    fn collector() -> (EventCallback, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback: EventCallback = Arc::new(move |event: &Event| {
            let _ = tx.send(event.clone());
        });
        (callback, rx)
    }

    fn active(value: bool) -> KeyValueSet {
        let mut payload = KeyValueSet::new();
        payload.insert("active", None, value).unwrap();
        payload
    }

    #[tokio::test]
    async fn delivers_to_matching_subscriptions_only() {
        let (dispatcher, _handle) = Dispatcher::spawn();
        let bus = LocalBus::new(dispatcher);
        let door = bus.declare(&port_declaration("Door", true), true).unwrap();
        let window = bus.declare(&port_declaration("Window", true), true).unwrap();

        let (callback, mut rx) = collector();
        let sub = bus.subscribe(topic_filter("Door"), callback).unwrap();

        bus.send(window, &active(true)).unwrap();
        bus.send(door, &active(true)).unwrap();

        let event = timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(event.subscription, sub);
        assert_eq!(event.kvs.get_string("topic2", Some(NAMESPACE_TNSAXIS)).unwrap(), "Door");
        assert!(event.kvs.get_boolean("active", None).unwrap());
        // Markers travel with the declaration.
        assert_eq!(event.kvs.trigger_conformance().data_keys, 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stateful_state_is_replayed_to_new_subscribers() {
        let (dispatcher, _handle) = Dispatcher::spawn();
        let bus = LocalBus::new(dispatcher);
        let stateful = bus.declare(&port_declaration("Door", false), false).unwrap();
        let pulse = bus.declare(&port_declaration("Bell", true), true).unwrap();
        bus.send(stateful, &active(true)).unwrap();
        bus.send(pulse, &active(true)).unwrap();

        let (callback, mut rx) = collector();
        bus.subscribe(KeyValueSet::new(), callback).unwrap();

        let event = timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(event.kvs.get_string("topic2", Some(NAMESPACE_TNSAXIS)).unwrap(), "Door");
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_rejects_undeclared_keys_and_wrong_types() {
        let (dispatcher, _handle) = Dispatcher::spawn();
        let bus = LocalBus::new(dispatcher);
        let id = bus.declare(&port_declaration("Door", true), true).unwrap();

        let mut unknown = KeyValueSet::new();
        unknown.insert("level", None, 1).unwrap();
        let err = bus.send(id, &unknown).unwrap_err();
        assert!(matches!(err, BusError::Event(ref e) if e.kind() == ErrorKind::KeyNotFound));

        let mut wrong = KeyValueSet::new();
        wrong.insert("active", None, 1).unwrap();
        let err = bus.send(id, &wrong).unwrap_err();
        assert!(matches!(err, BusError::Event(ref e) if e.kind() == ErrorKind::TypeMismatch));

        assert!(matches!(bus.send(99, &active(true)), Err(BusError::UnknownDeclaration(99))));
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let (dispatcher, _handle) = Dispatcher::spawn();
        let bus = LocalBus::new(dispatcher);
        let id = bus.declare(&port_declaration("Door", true), true).unwrap();

        let (callback, mut rx) = collector();
        let sub = bus.subscribe(KeyValueSet::new(), callback).unwrap();
        bus.unsubscribe(sub).unwrap();
        bus.send(id, &active(true)).unwrap();

        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
        assert!(matches!(bus.unsubscribe(sub), Err(BusError::UnknownSubscription(_))));
        bus.undeclare(id).unwrap();
        assert!(matches!(bus.undeclare(id), Err(BusError::UnknownDeclaration(_))));
    }
}

use std::sync::Arc;

use axevent::bus::{DeclarationId, EventCallback};
use axevent::param::{ParamCallback, UserContext};
use axevent::{
    Dispatcher, Event, EventPublisher, EventSubscriber, KeyValueSet, LocalBus, MemoryParameters,
    NAMESPACE_TNSAXIS, ParameterStore,
};

use crate::config::{AppConfig, RunArgs};
use crate::error::CliError;

pub async fn run(args: RunArgs) -> Result<(), CliError> {
    tracing::info!("axevent starting");

    // --- Load config ---
    let config = AppConfig::load(&args.config.config)?;
    let setup = config.app_setup()?;
    let declarations = config.declarations(&setup)?;
    tracing::info!(config = %args.config.config, app = %setup.app_name, "loaded config");

    let (dispatcher, dispatch_task) = Dispatcher::spawn();
    let bus = LocalBus::new(dispatcher.clone());

    // --- Subscribe to everything this application publishes ---
    let mut filter = KeyValueSet::new();
    filter
        .insert("topic1", Some(NAMESPACE_TNSAXIS), setup.app_name.as_str())
        .map_err(|source| CliError::Event {
            name: "subscription filter".into(),
            source,
        })?;
    let on_event: EventCallback = Arc::new(|event: &Event| {
        let payload = serde_json::to_string(&event.kvs).unwrap_or_default();
        tracing::info!(
            subscription = event.subscription,
            ts_ms = event.ts_ms,
            %payload,
            "event received"
        );
    });
    let subscription = bus.subscribe(filter, on_event)?;

    // --- Declare events; stateful ones publish their initial state ---
    let mut declared: Vec<DeclarationId> = Vec::new();
    for (event, kvs) in &declarations {
        let id = bus.declare(kvs, event.stateless)?;
        tracing::info!(declaration = id, event = %event.name, stateless = event.stateless, "declared event");
        if !event.stateless {
            bus.send(id, &KeyValueSet::new())?;
        }
        declared.push(id);
    }

    // --- Parameters ---
    let params = MemoryParameters::new(&setup.app_name, dispatcher.clone(), config.parameters.clone());
    let on_change: ParamCallback = Arc::new(|name: &str, value: &str, context: &UserContext| {
        let app = context.downcast_ref::<String>().map(String::as_str).unwrap_or("?");
        tracing::info!(%app, parameter = %name, %value, "parameter changed");
    });
    let context: UserContext = Arc::new(setup.app_name.clone());
    for name in params.names() {
        params.register_callback(&name, Arc::clone(&on_change), Arc::clone(&context))?;
    }
    for (name, value) in &args.set {
        params.set(name, value)?;
    }

    // --- Wait for shutdown signal ---
    tracing::info!(events = declared.len(), "running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    bus.unsubscribe(subscription)?;
    for id in declared {
        bus.undeclare(id)?;
    }

    // The dispatch task ends once every handle is gone.
    drop(params);
    drop(bus);
    drop(dispatcher);
    if let Err(e) = dispatch_task.await {
        tracing::warn!(error = %e, "dispatcher task failed");
    }

    tracing::info!("shutdown complete");
    Ok(())
}

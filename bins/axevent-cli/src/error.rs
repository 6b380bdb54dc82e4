use axevent::setup::ManifestError;
use axevent::{BusError, EventError, ParamError};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("manifest: {0}")]
    Manifest(#[from] ManifestError),

    #[error("event '{name}': {source}")]
    Event {
        name: String,
        #[source]
        source: EventError,
    },

    #[error("not trigger eligible: {}", .0.join(", "))]
    NotTriggerEligible(Vec<String>),

    #[error("bus: {0}")]
    Bus(#[from] BusError),

    #[error("parameter: {0}")]
    Param(#[from] ParamError),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),
}

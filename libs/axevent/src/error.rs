use crate::kvs::KeyEntry;
use crate::value::ValueType;

/// Error category. Stable across `Composition` layers: a wrapped error
/// reports the kind of the error it wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DuplicateKey,
    KeyNotFound,
    TypeMismatch,
    InvalidTarget,
    NotTriggerEligible,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::DuplicateKey => f.write_str("duplicate key"),
            ErrorKind::KeyNotFound => f.write_str("key not found"),
            ErrorKind::TypeMismatch => f.write_str("type mismatch"),
            ErrorKind::InvalidTarget => f.write_str("invalid target"),
            ErrorKind::NotTriggerEligible => f.write_str("not trigger eligible"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EventError {
    #[error("key {entry} already exists")]
    DuplicateKey { entry: KeyEntry },

    /// `requested` is the kind a typed getter asked for.
    #[error("key {entry} not found{}", requested_suffix(.requested))]
    KeyNotFound {
        entry: KeyEntry,
        requested: Option<ValueType>,
    },

    #[error("key {entry}: expected {expected}, found {actual}")]
    TypeMismatch {
        entry: KeyEntry,
        expected: ValueType,
        actual: ValueType,
    },

    #[error("nice name for key {entry} is already set")]
    NiceNameAlreadySet { entry: KeyEntry },

    #[error("invalid target '{record}': {reason}")]
    InvalidTarget { record: &'static str, reason: String },

    #[error(
        "event is not trigger eligible: {source_keys} source keys (at most 1), {data_keys} data keys (exactly 1)"
    )]
    NotTriggerEligible { source_keys: usize, data_keys: usize },

    #[error("{field}: {source}")]
    Composition {
        field: String,
        source: Box<EventError>,
    },
}

impl EventError {
    /// Wrap the error with the logical field (topic slot, payload key,
    /// record field) that triggered it.
    ///
    /// Produces: `"field: original message"`.
    pub fn with_context(self, field: impl std::fmt::Display) -> Self {
        EventError::Composition {
            field: field.to_string(),
            source: Box::new(self),
        }
    }

    /// Innermost error below any `Composition` layers.
    pub fn root(&self) -> &EventError {
        match self {
            EventError::Composition { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            EventError::DuplicateKey { .. } | EventError::NiceNameAlreadySet { .. } => {
                ErrorKind::DuplicateKey
            }
            EventError::KeyNotFound { .. } => ErrorKind::KeyNotFound,
            EventError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            EventError::InvalidTarget { .. } => ErrorKind::InvalidTarget,
            EventError::NotTriggerEligible { .. } => ErrorKind::NotTriggerEligible,
            // root() never returns a Composition
            EventError::Composition { source, .. } => source.kind(),
        }
    }

    /// Entry the root error refers to, if any.
    pub fn entry(&self) -> Option<&KeyEntry> {
        match self.root() {
            EventError::DuplicateKey { entry }
            | EventError::KeyNotFound { entry, .. }
            | EventError::TypeMismatch { entry, .. }
            | EventError::NiceNameAlreadySet { entry } => Some(entry),
            _ => None,
        }
    }
}

fn requested_suffix(requested: &Option<ValueType>) -> String {
    requested
        .map(|kind| format!(" (requested {kind})"))
        .unwrap_or_default()
}

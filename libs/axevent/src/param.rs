//! Parameter store boundary.
//!
//! Parameters are addressed by dotted path (`"Properties.System.SerialNumber"`).
//! A name without a dot belongs to the application's own group, so for an
//! application `MyApp` the names `IsCustomized` and `MyApp.IsCustomized`
//! are the same parameter.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::dispatch::Dispatcher;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamError {
    #[error("parameter '{0}' not found")]
    NotFound(String),

    #[error("parameter backend: {0}")]
    Backend(String),
}

/// Opaque value handed back to a callback unchanged.
pub type UserContext = Arc<dyn Any + Send + Sync>;

/// Change callback: `(name, new_value, user_context)`. Runs on the
/// dispatch task.
pub type ParamCallback = Arc<dyn Fn(&str, &str, &UserContext) + Send + Sync>;

pub trait ParameterStore: Send + Sync {
    fn get(&self, name: &str) -> Result<String, ParamError>;

    /// Store `value` and notify the callbacks of `name` if it changed.
    ///
    /// Fails with `Backend`, leaving the old value, when callbacks are
    /// registered but the dispatcher has stopped.
    fn set(&self, name: &str, value: &str) -> Result<(), ParamError>;

    fn register_callback(
        &self,
        name: &str,
        callback: ParamCallback,
        context: UserContext,
    ) -> Result<(), ParamError>;
}

struct Registration {
    name: String,
    callback: ParamCallback,
    context: UserContext,
}

/// In-memory parameter store.
pub struct MemoryParameters {
    app_name: String,
    values: RwLock<BTreeMap<String, String>>,
    callbacks: Mutex<Vec<Registration>>,
    dispatcher: Dispatcher,
}

impl MemoryParameters {
    pub fn new<I, K, V>(app_name: impl Into<String>, dispatcher: Dispatcher, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let app_name = app_name.into();
        let values = values
            .into_iter()
            .map(|(k, v)| (qualify(&app_name, &k.into()), v.into()))
            .collect();
        Self {
            app_name,
            values: RwLock::new(values),
            callbacks: Mutex::new(Vec::new()),
            dispatcher,
        }
    }

    /// Fully qualified parameter names.
    pub fn names(&self) -> Vec<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

fn qualify(app_name: &str, name: &str) -> String {
    if name.contains('.') {
        name.to_string()
    } else {
        format!("{app_name}.{name}")
    }
}

impl ParameterStore for MemoryParameters {
    fn get(&self, name: &str) -> Result<String, ParamError> {
        let name = qualify(&self.app_name, name);
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name)
            .cloned()
            .ok_or(ParamError::NotFound(name))
    }

    fn set(&self, name: &str, value: &str) -> Result<(), ParamError> {
        let name = qualify(&self.app_name, name);
        let callbacks = self.callbacks.lock().unwrap_or_else(PoisonError::into_inner);
        let mut registrations = callbacks.iter().filter(|r| r.name == name).peekable();
        {
            let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
            let current = values
                .get_mut(&name)
                .ok_or_else(|| ParamError::NotFound(name.clone()))?;
            if current == value {
                return Ok(());
            }
            if registrations.peek().is_some() && self.dispatcher.is_closed() {
                return Err(ParamError::Backend(format!(
                    "cannot notify change of '{name}': dispatcher closed"
                )));
            }
            *current = value.to_string();
        }
        tracing::debug!(parameter = %name, "parameter changed");

        for registration in registrations {
            let callback = Arc::clone(&registration.callback);
            let context = Arc::clone(&registration.context);
            let name = name.clone();
            let value = value.to_string();
            self.dispatcher
                .dispatch(move || callback(&name, &value, &context))
                .map_err(|e| ParamError::Backend(e.to_string()))?;
        }
        Ok(())
    }

    fn register_callback(
        &self,
        name: &str,
        callback: ParamCallback,
        context: UserContext,
    ) -> Result<(), ParamError> {
        let name = qualify(&self.app_name, name);
        if !self
            .values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&name)
        {
            return Err(ParamError::NotFound(name));
        }
        tracing::debug!(parameter = %name, "registered parameter callback");
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Registration {
                name,
                callback,
                context,
            });
        Ok(())
    }
}

use std::collections::BTreeMap;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use axevent::{AppSetup, KeyValueSet, PlatformEvent};

use crate::error::CliError;

#[derive(Parser)]
#[command(name = "axevent", about = "Declare and exercise application events")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the declaration of every configured event as JSON
    Declare(ConfigArgs),
    /// Report source/data marker counts and fail on events unusable as triggers
    Check(ConfigArgs),
    /// Declare the events on an in-process bus and log traffic until Ctrl-C
    Run(RunArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    /// Path to the TOML application config
    #[arg(long, default_value = "app.toml", env = "AXEVENT_CONFIG")]
    pub config: String,
}

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Parameter change applied after start-up, as NAME=VALUE
    #[arg(long = "set", value_parser = parse_assignment)]
    pub set: Vec<(String, String)>,
}

fn parse_assignment(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(name, value)| (name.trim().to_string(), value.to_string()))
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))
}

// ---- TOML Config ----

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Inline application identity. Takes precedence over `manifest`.
    #[serde(default)]
    pub setup: Option<AppSetup>,
    /// Path to a `manifest.json` holding the application identity.
    #[serde(default)]
    pub manifest: Option<String>,
    /// Initial parameter values. Names without a dot belong to the
    /// application group.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub events: Vec<PlatformEvent>,
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self, CliError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CliError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        Self::parse(&content)
            .map_err(|e| CliError::Config { context: "parse", detail: format!("'{path}': {e}") })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn app_setup(&self) -> Result<AppSetup, CliError> {
        match (&self.setup, &self.manifest) {
            (Some(setup), _) => Ok(setup.clone()),
            (None, Some(path)) => Ok(AppSetup::load_manifest(path)?),
            (None, None) => Err(CliError::Config {
                context: "setup",
                detail: "either [setup] or manifest is required".into(),
            }),
        }
    }

    /// Build every configured event, in config order.
    pub fn declarations(&self, setup: &AppSetup) -> Result<Vec<(&PlatformEvent, KeyValueSet)>, CliError> {
        if self.events.is_empty() {
            return Err(CliError::Config {
                context: "events",
                detail: "no [[events]] configured".into(),
            });
        }
        self.events
            .iter()
            .map(|event| {
                let kvs = event.build(setup).map_err(|source| CliError::Event {
                    name: event.name.clone(),
                    source,
                })?;
                Ok((event, kvs))
            })
            .collect()
    }
}

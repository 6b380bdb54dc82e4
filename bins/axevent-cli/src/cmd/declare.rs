use serde::Serialize;

use axevent::KeyValueSet;

use crate::config::{AppConfig, ConfigArgs};
use crate::error::CliError;

/// What the publish API receives for one event.
#[derive(Serialize)]
struct Declaration<'a> {
    name: &'a str,
    stateless: bool,
    kvs: &'a KeyValueSet,
}

pub fn run(args: ConfigArgs) -> Result<(), CliError> {
    let config = AppConfig::load(&args.config)?;
    let setup = config.app_setup()?;

    let declarations = config.declarations(&setup)?;
    let out: Vec<Declaration<'_>> = declarations
        .iter()
        .map(|(event, kvs)| Declaration {
            name: &event.name,
            stateless: event.stateless,
            kvs,
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&out)?);
    tracing::info!(app = %setup.app_name, events = out.len(), "declared events");
    Ok(())
}

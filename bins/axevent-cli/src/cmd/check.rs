use crate::config::{AppConfig, ConfigArgs};
use crate::error::CliError;

pub fn run(args: ConfigArgs) -> Result<(), CliError> {
    let config = AppConfig::load(&args.config)?;
    let setup = config.app_setup()?;

    let mut rejected = Vec::new();
    for (event, kvs) in config.declarations(&setup)? {
        let conformance = kvs.trigger_conformance();
        let eligible = conformance.is_trigger_eligible();
        println!(
            "{:<24} source={} data={} {}",
            event.name,
            conformance.source_keys,
            conformance.data_keys,
            if eligible { "ok" } else { "NOT ELIGIBLE" }
        );
        if !eligible {
            tracing::warn!(event = %event.name, "event cannot be used as a trigger");
            rejected.push(event.name.clone());
        }
    }

    if rejected.is_empty() {
        Ok(())
    } else {
        Err(CliError::NotTriggerEligible(rejected))
    }
}

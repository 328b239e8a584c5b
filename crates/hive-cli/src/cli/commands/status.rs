use std::path::Path;

use hive_verify::{build_verifier, VerifierAvailability};
use serde::Serialize;
use tracing::info;

use crate::cli::args::StatusArgs;
use crate::exit_codes::{EXIT_SUCCESS, VERIFIER_UNAVAILABLE};

#[derive(Debug, Serialize)]
struct StatusReport<'a> {
    verifier_url: &'a str,
    container: &'a str,
    availability: VerifierAvailability,
}

pub async fn run(args: StatusArgs, config_path: Option<&Path>) -> anyhow::Result<i32> {
    let mut config = super::load_config(config_path)?;
    if args.no_start {
        config.verifier.auto_start = false;
    }

    let (manager, _client) = build_verifier(&config)?;
    info!(url = %config.verifier.base_url(), "checking verifier");
    let availability = manager.ensure_available().await;

    let report = StatusReport {
        verifier_url: config.verifier.base_url(),
        container: &config.verifier.container_name,
        availability,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(if availability.is_healthy() {
        EXIT_SUCCESS
    } else {
        VERIFIER_UNAVAILABLE
    })
}

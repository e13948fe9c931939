pub mod config;
pub mod daemon;
pub mod register;
pub mod session;
pub mod status;
pub mod sync;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use fieldreg_core::Config;
use fieldreg_sync::{HttpConnectivity, HttpSubmissionClient};

pub(crate) fn home() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// Submission client + probe built from device config, with an optional
/// one-shot endpoint override.
pub(crate) fn transport(
    config: &Config,
    endpoint_override: Option<&str>,
) -> (HttpSubmissionClient, HttpConnectivity) {
    let endpoint = endpoint_override.unwrap_or(&config.endpoint);
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let client = HttpSubmissionClient::new(endpoint, timeout);
    // Probes stay short so the register prompt never feels stuck.
    let probe = HttpConnectivity::new(endpoint, timeout.min(Duration::from_secs(3)));
    (client, probe)
}

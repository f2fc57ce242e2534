// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use falcon_memstats_agent::{
    config::{AgentConfig, DEFAULT_LOG_LEVEL},
    scheduler::Scheduler,
    signals::TerminationSignals,
};
use falcon_push::Pusher;
use memstats_collector::{
    hostname::get_hostname,
    sampler::{ProcessMemStatsReader, Sampler},
};
use tikv_jemallocator::Jemalloc;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[tokio::main(flavor = "current_thread")]
pub async fn main() {
    let config = AgentConfig::from_env();
    let log_level = config
        .as_ref()
        .map(|c| c.log_level.as_str())
        .unwrap_or(DEFAULT_LOG_LEVEL);

    let env_filter = format!("h2=off,hyper=off,hyper_util=off,reqwest=off,{log_level}");

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(true)
        .with_file(true)
        .with_target(false)
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match config {
        Ok(c) => c,
        Err(e) => {
            error!("Error creating config on memstats agent startup: {e}");
            return;
        }
    };

    let pid = std::process::id();
    let hostname = get_hostname();
    debug!("Reporting as endpoint {hostname:?}");

    let reader = ProcessMemStatsReader::new();
    if let Err(e) = reader.probe() {
        error!("Memory stats are unavailable, not starting: {e}");
        return;
    }

    let pusher = match Pusher::new(config.pusher_config()) {
        Ok(p) => p,
        Err(e) => {
            error!("Error creating pusher on memstats agent startup: {e}");
            return;
        }
    };

    let mut signals = match TerminationSignals::register() {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to register signal handlers: {e}");
            return;
        }
    };
    info!("{pid} register signal notify");

    let scheduler = Scheduler::new(Sampler::new(reader, hostname), pusher, config.interval);
    scheduler.run(signals.recv()).await;

    info!("Graceful shutdown");
    info!("{pid} exit");
}

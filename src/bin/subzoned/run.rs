// Copyright 2022 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Implements the `run` command (i.e., running the daemon).

use std::fmt::Write;
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use env_logger::Env;
use log::{error, info};
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tokio::runtime::{self, Runtime};

use subzone::client::Client;
use subzone::reconcile::Reconciler;
use subzone::upstream::Updater;
use subzone::zone::ZoneManager;

use crate::args::RunArgs;
use crate::config::{self, Config};

/// How long background tasks are given to finish when shutting down.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs the daemon.
pub fn run(args: RunArgs) {
    init_logging("info");
    if let Err(e) = try_running(args) {
        exit_with_error("Failed to run", e);
    }
    info!("Exiting with success.");
}

/// Sets up logging, at `default_level` unless `RUST_LOG` says
/// otherwise.
pub fn init_logging(default_level: &str) {
    env_logger::init_from_env(Env::new().default_filter_or(default_level));
}

/// Logs `e` and its chain of causes, and exits with failure.
pub fn exit_with_error(what: &str, e: anyhow::Error) -> ! {
    let mut message = format!("{}:", what);
    for (i, cause) in e.chain().enumerate() {
        write!(message, "\n[{}] {}", i + 1, cause).unwrap();
    }
    message.push_str("\nExiting with failure.");
    error!("{}", message);
    process::exit(1);
}

/// Loads the configuration file at `path`.
pub fn load_config(path: &std::path::Path) -> Result<Config> {
    info!("Loading the configuration from {}.", path.display());
    config::load_from_path(path).context("failed to load the configuration")
}

fn try_running(args: RunArgs) -> Result<()> {
    info!(
        "Subzone daemon v{}.{}.{} starting.",
        env!("CARGO_PKG_VERSION_MAJOR"),
        env!("CARGO_PKG_VERSION_MINOR"),
        env!("CARGO_PKG_VERSION_PATCH"),
    );
    let config = load_config(&args.config)?;

    let runtime = runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the Tokio runtime")?;
    let guard = runtime.enter();

    let api = config.authoritative.build()?;
    let zone_config = config
        .zones
        .to_zone_config()
        .context("invalid zone configuration")?;
    let manager = Arc::new(ZoneManager::new(api, zone_config));
    let store = config.store.build();

    // Fail fast on a broken policy (such as a script that does not
    // compile), even though no request is served here.
    let policy = config
        .policy
        .provider
        .build()
        .context("failed to set up the zone access policy")?;
    info!("Using the {} zone access policy.", config.policy.provider.name());

    let mut signals = set_up_signal_handling().context("failed to set up signal handling")?;

    if config.reconcile.enabled {
        let interval = Duration::from_secs(config.reconcile.interval);
        let reconciler = Reconciler::new(manager, store, interval);
        runtime.spawn(async move { reconciler.run().await });
        info!("Started reconciliation every {} s.", config.reconcile.interval);
    }
    if let Some(ref upstream) = config.upstream {
        start_updater(&runtime, upstream)?;
    }

    info!("Set-up is complete.");
    if let Some(signal) = signals.forever().next() {
        let name = match signal {
            SIGINT => "SIGINT",
            _ => "SIGTERM",
        };
        info!("Received {}; shutting down.", name);
    }

    drop(policy);
    drop(guard);
    runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
    info!("Shutdown complete.");
    Ok(())
}

fn start_updater(runtime: &Runtime, upstream: &config::UpstreamConfig) -> Result<()> {
    let updater_config = upstream
        .to_updater_config()
        .context("invalid upstream configuration")?;
    let updater = Updater::new(Client::new(upstream.server.clone()), updater_config);
    runtime.spawn(async move { updater.run().await });
    info!("Started the upstream updater for {}.", upstream.server);
    Ok(())
}

fn set_up_signal_handling() -> Result<Signals> {
    let term_signals = &[SIGINT, SIGTERM];
    let already_terminating = Arc::new(AtomicBool::new(false));

    // This sets up signal handlers to exit immediately if a second
    // termination signal arrives before the process finishes shutting
    // down gracefully.
    for sig in term_signals {
        signal_hook::flag::register_conditional_shutdown(*sig, 1, already_terminating.clone())?;
        signal_hook::flag::register(*sig, already_terminating.clone())?;
    }

    Signals::new(term_signals).map_err(Into::into)
}

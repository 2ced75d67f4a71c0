// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// plotforged — the print-orchestration daemon.
//
// Wires the engine together: configuration, IPP spooler gateway, device
// directory, and the job queue, then keeps the fleet view fresh with a
// periodic rediscovery loop.  The HTTP/WebSocket façade consumes the queue
// and directory through their public operations and is not part of this
// binary.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use plotforge_core::config::EngineConfig;
use plotforge_print::directory::DeviceDirectory;
use plotforge_print::ipp_gateway::IppGateway;
use plotforge_print::queue::JobQueue;

/// Interval between fleet status refreshes.
const MONITOR_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(name = "plotforged", about = "Plotforge print orchestration daemon")]
struct Args {
    /// Path to a JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sweep the configured subnet for IPP devices at startup.
    #[arg(long)]
    scan: bool,

    /// Override the subnet to sweep (e.g. "10.0.0").
    #[arg(long)]
    subnet: Option<String>,
}

fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match EngineConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to load configuration");
                return std::process::ExitCode::FAILURE;
            }
        },
        None => EngineConfig::default(),
    };
    if let Some(subnet) = args.subnet {
        config.discovery.subnet = subnet;
    }

    if config.spooler.printers.is_empty() {
        warn!("no printers configured under spooler.printers; the fleet starts empty");
    }

    let gateway = match IppGateway::new(config.spooler.printers.clone()) {
        Ok(gateway) => Arc::new(gateway),
        Err(e) => {
            error!(error = %e, "failed to initialise IPP gateway");
            return std::process::ExitCode::FAILURE;
        }
    };

    let directory = Arc::new(DeviceDirectory::new(gateway.clone(), &config));

    match directory.discover_advanced() {
        Ok(plotters) => {
            for info in &plotters {
                info!(
                    uri = %info.device.uri,
                    vendor = %info.vendor,
                    protocol = %info.recommended,
                    online = info.device.is_online,
                    "plotter ready"
                );
            }
        }
        Err(e) => warn!(error = %e, "initial discovery failed"),
    }
    for device in directory.devices() {
        info!(
            uri = %device.uri,
            name = %device.name,
            online = device.is_online,
            "device enumerated"
        );
    }

    if args.scan {
        let found = directory.scan_subnet();
        for device in &found {
            info!(uri = %device.uri, name = %device.name, "subnet sweep found device");
        }
        info!(count = found.len(), subnet = %config.discovery.subnet, "subnet sweep done");
    }

    let queue = JobQueue::new(gateway, directory.clone(), &config);
    queue.start();
    info!("plotforged running");

    // Keep the fleet view fresh until the process is terminated.
    loop {
        std::thread::sleep(MONITOR_INTERVAL);
        if let Err(e) = directory.discover() {
            warn!(error = %e, "periodic discovery failed");
        }
    }
}

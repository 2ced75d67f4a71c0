// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Parallel subnet sweep for IPP devices.
//
// Splits the 1–254 host range across the machine's available parallelism;
// each worker dials IPP port 631 with a short per-host timeout and fetches
// printer attributes for responders.  The whole sweep observes an overall
// deadline.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use plotforge_core::types::DeviceRecord;

use crate::probe;
use crate::spooler::SpoolerGateway;

/// IPP service port probed on every host.
const IPP_PORT: u16 = 631;

/// Per-host dial timeout during a sweep.  Short: the sweep covers 254 hosts
/// and most of them do not exist.
const HOST_DIAL_TIMEOUT: Duration = Duration::from_millis(100);

/// Sweep a /24 subnet ("192.168.1" probes 192.168.1.1–254) for IPP devices.
///
/// Responders are resolved to device records through the gateway's
/// attribute query; hosts that answer the dial but not the query are still
/// reported, with a minimal record.
#[instrument(skip(gateway), fields(subnet = %subnet))]
pub fn scan_subnet(
    gateway: &dyn SpoolerGateway,
    subnet: &str,
    overall_timeout: Duration,
) -> Vec<DeviceRecord> {
    let deadline = Instant::now() + overall_timeout;
    let threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    let results: Mutex<Vec<DeviceRecord>> = Mutex::new(Vec::new());

    std::thread::scope(|scope| {
        for (index, (start, end)) in split_range(threads).into_iter().enumerate() {
            let results = &results;
            let builder = std::thread::Builder::new().name(format!("subnet-scan-{index}"));
            builder
                .spawn_scoped(scope, move || {
                    for host in start..=end {
                        if Instant::now() >= deadline {
                            debug!(start, end, host, "sweep deadline reached");
                            break;
                        }
                        let ip = format!("{subnet}.{host}");
                        if !probe::dial(&ip, IPP_PORT, HOST_DIAL_TIMEOUT) {
                            continue;
                        }

                        let uri = format!("ipp://{ip}:{IPP_PORT}/ipp/print");
                        let record = match gateway.printer_attributes(&uri) {
                            Ok(record) => record,
                            Err(e) => {
                                warn!(uri = %uri, error = %e, "responder rejected attribute query");
                                DeviceRecord::unknown(uri)
                            }
                        };
                        info!(uri = %record.uri, name = %record.name, "subnet sweep found device");
                        results
                            .lock()
                            .expect("scan results lock poisoned")
                            .push(record);
                    }
                })
                .expect("failed to spawn subnet scan thread");
        }
    });

    let mut found = results.into_inner().expect("scan results lock poisoned");
    found.sort_by(|a, b| a.uri.cmp(&b.uri));
    info!(count = found.len(), "subnet sweep finished");
    found
}

/// Split the 1–254 host range into `threads` contiguous chunks.
fn split_range(threads: usize) -> Vec<(u8, u8)> {
    let threads = threads.max(1).min(254);
    let per_thread = 254 / threads;
    let mut chunks = Vec::with_capacity(threads);
    for t in 0..threads {
        let start = (t * per_thread + 1) as u8;
        let end = if t == threads - 1 {
            254
        } else {
            ((t + 1) * per_thread) as u8
        };
        chunks.push((start, end));
    }
    chunks
}

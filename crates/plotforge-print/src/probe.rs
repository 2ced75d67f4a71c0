// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Two-tier device reachability probing.
//
// Spoolers happily report a stale "idle" for a networked printer that was
// powered off hours ago.  The fix is to trust the spooler only for devices
// it can physically see (USB, local files) and to verify network devices
// with a real TCP dial:
//
//   1. spooler readiness — reported state is operational and no state
//      reason says offline/shutdown/paused;
//   2. network reachability — for network URI schemes, dial host:port with
//      a short timeout.  `is_online` requires both.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use plotforge_core::types::DeviceRecord;

/// Parse the host and port out of a network device URI.
///
/// Returns `None` for local schemes (usb, file, cups, ...) — those devices
/// cannot be dialed and trust spooler readiness instead.
pub fn parse_network_endpoint(uri: &str) -> Option<(String, u16)> {
    let (scheme, rest) = uri.split_once("://")?;
    let default_port = match scheme.to_ascii_lowercase().as_str() {
        "ipp" | "ipps" => 631,
        "http" => 80,
        "https" => 443,
        "socket" => 9100,
        "lpd" => 515,
        _ => return None,
    };

    let authority = rest.split('/').next().unwrap_or(rest);
    if authority.is_empty() {
        return None;
    }

    match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse().ok()?;
            Some((host.to_string(), port))
        }
        None => Some((authority.to_string(), default_port)),
    }
}

/// Attempt a TCP connection with a timeout.  Resolution failures count as
/// unreachable.
pub fn dial(host: &str, port: u16, timeout: Duration) -> bool {
    let addrs = match (host, port).to_socket_addrs() {
        Ok(addrs) => addrs,
        Err(e) => {
            debug!(host, port, error = %e, "address resolution failed");
            return false;
        }
    };

    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(_) => return true,
            Err(e) => {
                debug!(%addr, error = %e, "dial failed");
            }
        }
    }
    false
}

/// Run the two-tier reachability check and update the record in place.
///
/// Sets `is_online` and `last_probe`.  A network device whose dial times out
/// is marked offline regardless of what the spooler claims.
pub fn probe_device(device: &mut DeviceRecord, dial_timeout: Duration) {
    let spooler_ready = device.spooler_ready();

    device.is_online = match parse_network_endpoint(&device.uri) {
        Some((host, port)) => {
            // Only pay for the dial when the spooler thinks the device is
            // usable at all.
            if spooler_ready {
                let reachable = dial(&host, port, dial_timeout);
                if !reachable {
                    warn!(
                        uri = %device.uri,
                        host,
                        port,
                        "spooler reports ready but device is unreachable"
                    );
                }
                reachable
            } else {
                false
            }
        }
        // Local URI (USB, file): the spooler is the authority.
        None => spooler_ready,
    };
    device.last_probe = Utc::now();

    debug!(
        uri = %device.uri,
        state = device.state,
        spooler_ready,
        online = device.is_online,
        "device probed"
    );
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine configuration.
//
// Loaded from a JSON file; every field carries a serde default so partial
// configs (or none at all) are always valid.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PlotforgeError, Result};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub spooler: SpoolerConfig,
}

/// Job queue and worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Number of concurrent worker threads.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Optional queue depth cap; submissions beyond it are rejected.
    #[serde(default)]
    pub max_depth: Option<usize>,
}

/// Device discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Subnet prefix swept for IPP devices ("192.168.1" probes .1–.254).
    #[serde(default = "default_subnet")]
    pub subnet: String,
    /// Overall deadline for a discovery sweep, in milliseconds.
    #[serde(default = "default_discovery_timeout_ms")]
    pub timeout_ms: u64,
}

/// Network probing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Per-device TCP dial timeout for reachability checks, in milliseconds.
    #[serde(default = "default_dial_timeout_ms")]
    pub dial_timeout_ms: u64,
}

/// Spooler gateway settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpoolerConfig {
    /// Printer endpoint URIs served by the IPP gateway.
    #[serde(default)]
    pub printers: Vec<String>,
}

fn default_max_workers() -> usize {
    4
}

fn default_subnet() -> String {
    "192.168.1".into()
}

fn default_discovery_timeout_ms() -> u64 {
    5000
}

fn default_dial_timeout_ms() -> u64 {
    2000
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            max_depth: None,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            subnet: default_subnet(),
            timeout_ms: default_discovery_timeout_ms(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            dial_timeout_ms: default_dial_timeout_ms(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PlotforgeError::Config(format!("read {}: {e}", path.display()))
        })?;
        let config = serde_json::from_str(&raw).map_err(|e| {
            PlotforgeError::Config(format!("parse {}: {e}", path.display()))
        })?;
        Ok(config)
    }

    /// TCP dial timeout as a [`Duration`].
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.network.dial_timeout_ms)
    }

    /// Discovery sweep deadline as a [`Duration`].
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery.timeout_ms)
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The device directory: discovery, classification, and per-device protocol
// knowledge.
//
// Devices come from the spooler gateway's enumeration and pass the two-tier
// reachability check in `probe`.  Wide-format devices additionally get an
// advanced record — detected vendor, ordered protocol list, recommended
// protocol, capabilities, quirks — derived from the compatibility registry
// and cached by URI.  A cache entry never outlives the most recent
// discovery pass in which its URI was present.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use plotforge_core::config::EngineConfig;
use plotforge_core::error::{PlotforgeError, Result};
use plotforge_core::types::{
    AdvancedDeviceInfo, ColorMode, DeviceRecord, MediaSize, PrintOptions, ProtocolCapabilities,
    ProtocolId, Vendor,
};

use crate::matrix;
use crate::probe;
use crate::protocol;
use crate::scanner;
use crate::spooler::SpoolerGateway;

/// Make-model keywords identifying wide-format devices.
const PLOTTER_KEYWORDS: &[&str] = &[
    "designjet",
    "imageprograf",
    "surecolor",
    "plotter",
    "wide format",
    "large format",
];

/// Fleet directory of printing devices.
pub struct DeviceDirectory {
    gateway: Arc<dyn SpoolerGateway>,
    /// Devices from the most recent discovery pass.
    devices: Mutex<Vec<DeviceRecord>>,
    /// Advanced info cache keyed by device URI.
    cache: Mutex<HashMap<String, AdvancedDeviceInfo>>,
    dial_timeout: Duration,
    discovery_timeout: Duration,
    subnet: String,
}

impl DeviceDirectory {
    pub fn new(gateway: Arc<dyn SpoolerGateway>, config: &EngineConfig) -> Self {
        Self {
            gateway,
            devices: Mutex::new(Vec::new()),
            cache: Mutex::new(HashMap::new()),
            dial_timeout: config.dial_timeout(),
            discovery_timeout: config.discovery_timeout(),
            subnet: config.discovery.subnet.clone(),
        }
    }

    /// Run a discovery pass: enumerate devices from the spooler, probe each
    /// for reachability, and prune cache entries for URIs that vanished.
    #[instrument(skip(self))]
    pub fn discover(&self) -> Result<Vec<DeviceRecord>> {
        let mut discovered = self.gateway.enumerate()?;
        for device in &mut discovered {
            probe::probe_device(device, self.dial_timeout);
        }

        let seen: HashSet<String> = discovered.iter().map(|d| d.uri.clone()).collect();
        {
            let mut cache = self.cache.lock().expect("advanced cache lock poisoned");
            cache.retain(|uri, _| seen.contains(uri));
        }
        {
            let mut devices = self.devices.lock().expect("device list lock poisoned");
            *devices = discovered.clone();
        }

        info!(count = discovered.len(), "discovery pass complete");
        Ok(discovered)
    }

    /// Discovery pass plus advanced-info resolution for every plotter found.
    #[instrument(skip(self))]
    pub fn discover_advanced(&self) -> Result<Vec<AdvancedDeviceInfo>> {
        let devices = self.discover()?;
        let mut advanced = Vec::new();

        for device in devices {
            if !is_plotter_model(&device.make_model) {
                continue;
            }
            let info = build_advanced(device);
            info!(
                uri = %info.device.uri,
                vendor = %info.vendor,
                protocol = %info.recommended,
                "discovered plotter"
            );
            self.cache
                .lock()
                .expect("advanced cache lock poisoned")
                .insert(info.device.uri.clone(), info.clone());
            advanced.push(info);
        }

        Ok(advanced)
    }

    /// Sweep the configured subnet for IPP devices not registered with the
    /// spooler.
    pub fn scan_subnet(&self) -> Vec<DeviceRecord> {
        scanner::scan_subnet(self.gateway.as_ref(), &self.subnet, self.discovery_timeout)
    }

    /// Snapshot of the most recent discovery pass.
    pub fn devices(&self) -> Vec<DeviceRecord> {
        self.devices
            .lock()
            .expect("device list lock poisoned")
            .clone()
    }

    /// Look up a single device by URI.
    pub fn device(&self, uri: &str) -> Option<DeviceRecord> {
        self.devices
            .lock()
            .expect("device list lock poisoned")
            .iter()
            .find(|d| d.uri == uri)
            .cloned()
    }

    /// Administratively evict a device and its cached advanced info.
    pub fn remove_device(&self, uri: &str) -> bool {
        let removed = {
            let mut devices = self.devices.lock().expect("device list lock poisoned");
            let before = devices.len();
            devices.retain(|d| d.uri != uri);
            devices.len() != before
        };
        self.cache
            .lock()
            .expect("advanced cache lock poisoned")
            .remove(uri);
        if removed {
            info!(uri, "device removed");
        }
        removed
    }

    /// Whether the device at `uri` is classified as a wide-format plotter.
    pub fn is_plotter(&self, uri: &str) -> bool {
        self.device(uri)
            .map(|d| is_plotter_model(&d.make_model))
            .unwrap_or(false)
    }

    /// Resolve the advanced record for a device.
    ///
    /// Cache hit returns immediately.  A miss triggers a discovery pass (the
    /// device may be new); a device that still cannot be resolved yields an
    /// uncached generic record so callers always get an answer.
    #[instrument(skip(self), fields(uri = %uri))]
    pub fn advanced_info(&self, uri: &str) -> Result<AdvancedDeviceInfo> {
        if let Some(info) = self
            .cache
            .lock()
            .expect("advanced cache lock poisoned")
            .get(uri)
        {
            debug!("advanced info served from cache");
            return Ok(info.clone());
        }

        self.discover_advanced()?;

        if let Some(info) = self
            .cache
            .lock()
            .expect("advanced cache lock poisoned")
            .get(uri)
        {
            return Ok(info.clone());
        }

        // Not a known plotter: synthesize a generic record without caching
        // it (the next discovery pass may know better).
        let device = self
            .device(uri)
            .unwrap_or_else(|| DeviceRecord::unknown(uri));
        warn!(uri, "no advanced info available, using generic defaults");
        Ok(build_advanced(device))
    }

    /// Pick the wire protocol for a job targeting `uri`.
    ///
    /// The advanced record's recommended protocol wins; an unresolvable
    /// device falls back to the vendor dispatch (HP → HP-GL/2, everything
    /// else → PostScript).
    pub fn select_protocol(&self, uri: &str) -> ProtocolId {
        match self.advanced_info(uri) {
            Ok(info) => {
                debug!(uri, protocol = %info.recommended, "selected recommended protocol");
                info.recommended
            }
            Err(e) => {
                warn!(uri, error = %e, "advanced info unavailable, defaulting");
                ProtocolId::PostScript
            }
        }
    }

    /// Validate a job's options against the target plotter.
    ///
    /// Unknown media/color tags and generator-unsupported sizes or color
    /// modes are fatal.  A resolution the generator cannot serve exactly is
    /// only a warning — the device quantizes to the closest step.
    #[instrument(skip(self, options), fields(uri = %uri))]
    pub fn validate_document(&self, uri: &str, options: &PrintOptions) -> Result<()> {
        let info = self.advanced_info(uri)?;
        let generator = protocol::create_generator(info.recommended, info.vendor)?;

        let media = MediaSize::from_tag(&options.media_size).ok_or_else(|| {
            PlotforgeError::Validation(format!("unknown media size \"{}\"", options.media_size))
        })?;
        if !generator.validate_media_size(media) {
            return Err(PlotforgeError::Validation(format!(
                "media size {media} not supported by {uri}"
            )));
        }

        let color = ColorMode::from_tag(&options.color_mode).ok_or_else(|| {
            PlotforgeError::Validation(format!("unknown color mode \"{}\"", options.color_mode))
        })?;
        if !generator.validate_color_mode(color) {
            return Err(PlotforgeError::Validation(format!(
                "color mode {} not supported by {uri}",
                options.color_mode
            )));
        }

        let dpi = options.dpi();
        if !generator.validate_resolution(dpi) {
            warn!(uri, dpi, "resolution not native to device, closest will be used");
        }

        debug!(uri, "document validation passed");
        Ok(())
    }
}

/// Whether a make-and-model string identifies a wide-format device.
pub fn is_plotter_model(make_model: &str) -> bool {
    let lower = make_model.to_ascii_lowercase();
    PLOTTER_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Derive the advanced record for a device from the compatibility registry.
fn build_advanced(device: DeviceRecord) -> AdvancedDeviceInfo {
    let vendor = Vendor::detect(&device.make_model);
    let recommended = matrix::recommended_protocol(vendor, &device.make_model);
    let protocols = protocol::available_protocols(vendor, &device.make_model);
    let quirks = matrix::quirks(vendor, &device.make_model);

    let capabilities = match protocol::create_generator(recommended, vendor) {
        Ok(generator) => {
            let mut caps = generator.capabilities();
            if !device.make_model.is_empty() {
                caps.model = device.make_model.clone();
            }
            caps
        }
        Err(e) => {
            warn!(uri = %device.uri, error = %e, "no generator for recommended protocol");
            ProtocolCapabilities::unknown(vendor, device.make_model.clone())
        }
    };

    AdvancedDeviceInfo {
        device,
        vendor,
        protocols,
        recommended,
        capabilities,
        quirks,
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Plotforge print orchestrator.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a print job.
///
/// Ids are assigned by the job queue, strictly increasing within a process
/// lifetime.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Plotter vendor families with dedicated protocol handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vendor {
    Hp,
    Canon,
    Epson,
    Generic,
}

impl Vendor {
    /// Detect the vendor from a make-and-model string.
    ///
    /// Case-insensitive substring match; the device-family keywords
    /// (`designjet`, `imageprograf`, `surecolor`) also identify the vendor
    /// when the brand name itself is absent.
    pub fn detect(make_model: &str) -> Self {
        let lower = make_model.to_ascii_lowercase();
        if lower.contains("hp") || lower.contains("hewlett") || lower.contains("designjet") {
            Self::Hp
        } else if lower.contains("canon") || lower.contains("imageprograf") {
            Self::Canon
        } else if lower.contains("epson") || lower.contains("surecolor") {
            Self::Epson
        } else {
            Self::Generic
        }
    }
}

impl std::fmt::Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Hp => "HP",
            Self::Canon => "Canon",
            Self::Epson => "Epson",
            Self::Generic => "Generic",
        };
        write!(f, "{name}")
    }
}

/// Wire protocols a device may accept for print payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolId {
    /// HP-GL pen-plotter dialect (no escape-envelope extensions).
    Hpgl,
    /// HP-GL/2 with the escape-prefixed setup envelope.
    Hpgl2,
    PostScript,
    Pdf,
    /// Epson ESC/P.
    EscP,
}

impl ProtocolId {
    /// Parse a protocol tag as found in registry entries and device metadata.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "HPGL" => Some(Self::Hpgl),
            "HPGL2" | "HP-GL/2" => Some(Self::Hpgl2),
            "POSTSCRIPT" | "PS" => Some(Self::PostScript),
            "PDF" => Some(Self::Pdf),
            "ESC/P" | "ESCP" => Some(Self::EscP),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Hpgl => "HPGL",
            Self::Hpgl2 => "HPGL2",
            Self::PostScript => "PostScript",
            Self::Pdf => "PDF",
            Self::EscP => "ESC/P",
        };
        write!(f, "{name}")
    }
}

/// Standard media sizes, ISO A/B series plus North-American cut sheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaSize {
    A0,
    A1,
    A2,
    A3,
    A4,
    A5,
    B0,
    B1,
    B2,
    B3,
    B4,
    B5,
    Letter,
    Legal,
    Tabloid,
}

impl MediaSize {
    /// Parse a media-size tag as submitted with a print request.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "A0" => Some(Self::A0),
            "A1" => Some(Self::A1),
            "A2" => Some(Self::A2),
            "A3" => Some(Self::A3),
            "A4" => Some(Self::A4),
            "A5" => Some(Self::A5),
            "B0" => Some(Self::B0),
            "B1" => Some(Self::B1),
            "B2" => Some(Self::B2),
            "B3" => Some(Self::B3),
            "B4" => Some(Self::B4),
            "B5" => Some(Self::B5),
            "LETTER" => Some(Self::Letter),
            "LEGAL" => Some(Self::Legal),
            "TABLOID" | "LEDGER" | "11X17" => Some(Self::Tabloid),
            _ => None,
        }
    }

    /// Dimensions in millimetres (width, height), portrait orientation.
    pub fn dimensions_mm(&self) -> (u32, u32) {
        match self {
            Self::A0 => (841, 1189),
            Self::A1 => (594, 841),
            Self::A2 => (420, 594),
            Self::A3 => (297, 420),
            Self::A4 => (210, 297),
            Self::A5 => (148, 210),
            Self::B0 => (1000, 1414),
            Self::B1 => (707, 1000),
            Self::B2 => (500, 707),
            Self::B3 => (353, 500),
            Self::B4 => (250, 353),
            Self::B5 => (176, 250),
            Self::Letter => (216, 279),
            Self::Legal => (216, 356),
            Self::Tabloid => (279, 432),
        }
    }
}

impl std::fmt::Display for MediaSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Self::A0 => "A0",
            Self::A1 => "A1",
            Self::A2 => "A2",
            Self::A3 => "A3",
            Self::A4 => "A4",
            Self::A5 => "A5",
            Self::B0 => "B0",
            Self::B1 => "B1",
            Self::B2 => "B2",
            Self::B3 => "B3",
            Self::B4 => "B4",
            Self::B5 => "B5",
            Self::Letter => "Letter",
            Self::Legal => "Legal",
            Self::Tabloid => "Tabloid",
        };
        write!(f, "{tag}")
    }
}

/// Output color mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorMode {
    Monochrome,
    Color,
}

impl ColorMode {
    /// Parse a color-mode tag as submitted with a print request.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "color" | "colour" | "rgb" | "cmyk" => Some(Self::Color),
            "monochrome" | "mono" | "gray" | "grayscale" | "greyscale" | "bw" => {
                Some(Self::Monochrome)
            }
            _ => None,
        }
    }
}

/// Duplex printing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplexPolicy {
    Off,
    LongEdge,
    ShortEdge,
}

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Print settings attached to a job at submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintOptions {
    /// Media-size tag, e.g. "A1" or "Letter". Mapped to [`MediaSize`] at
    /// validation time; unknown tags fail validation.
    pub media_size: String,
    /// Color-mode tag, e.g. "color" or "monochrome".
    pub color_mode: String,
    pub duplex: DuplexPolicy,
    pub copies: u32,
    /// Quality level 1–5, mapped to DPI by [`PrintOptions::dpi`].
    pub quality: u8,
    pub orientation: Orientation,
    pub collate: bool,
}

impl PrintOptions {
    /// Resolution implied by the quality level: 1,2 → 300; 3,4 → 600;
    /// 5 → 1200 DPI.
    pub fn dpi(&self) -> u32 {
        match self.quality {
            5.. => 1200,
            3 | 4 => 600,
            _ => 300,
        }
    }
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            media_size: "A4".into(),
            color_mode: "monochrome".into(),
            duplex: DuplexPolicy::Off,
            copies: 1,
            quality: 3,
            orientation: Orientation::Portrait,
            collate: false,
        }
    }
}

/// Lifecycle states of a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Queued, waiting for a worker.
    Pending,
    /// Claimed by a worker; validation and payload preparation.
    Processing,
    /// Handed (or being handed) to the spooler.
    Printing,
    /// Spooler acknowledged dispatch.
    Completed,
    /// Execution failed — see the job's error field.
    Failed,
    /// User cancelled the job.
    Cancelled,
    /// Held back by the user; resumable to Pending.
    Paused,
}

impl JobStatus {
    /// Whether the job is currently being worked on.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Processing | Self::Printing)
    }

    /// Whether `retry_job` may re-enqueue a job in this state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled)
    }
}

/// A print job as tracked by the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: JobId,
    /// Target device URI.
    pub printer_uri: String,
    /// Path of the source document on disk.
    pub file_path: PathBuf,
    /// Display name shown in job listings.
    pub file_name: String,
    pub options: PrintOptions,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Id assigned by the spooler; 0 until dispatch is acknowledged.
    pub spooler_id: i64,
    /// Progress in [0, 1].
    pub progress: f32,
    pub error_message: Option<String>,
    pub file_size: u64,
    pub page_estimate: u32,
}

impl PrintJob {
    /// Build a new Pending job. The id is a placeholder until the queue
    /// assigns the real one under its lock.
    pub fn new(
        printer_uri: impl Into<String>,
        file_path: impl Into<PathBuf>,
        options: PrintOptions,
    ) -> Self {
        let file_path = file_path.into();
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_path.to_string_lossy().into_owned());
        Self {
            id: JobId(0),
            printer_uri: printer_uri.into(),
            file_path,
            file_name,
            options,
            status: JobStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            spooler_id: 0,
            progress: 0.0,
            error_message: None,
            file_size: 0,
            page_estimate: 1,
        }
    }
}

/// A printing device as enumerated from the spooler.
///
/// Created on discovery, mutated only by the device directory, evicted when
/// removed administratively. `is_online` is authoritative only as of
/// `last_probe`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Stable device URI (e.g. `ipp://10.0.0.5:631/ipp/print`).
    pub uri: String,
    /// Human-readable printer name.
    pub name: String,
    /// Vendor-model string as reported by the device.
    pub make_model: String,
    /// Geographic tag ("2nd floor, plot room").
    pub location: String,
    /// Result of the most recent two-tier reachability check.
    pub is_online: bool,
    pub last_probe: DateTime<Utc>,
    /// Spooler-side state: 3 = idle, 4 = processing, 5 = stopped.
    pub state: i32,
    /// Spooler state-reason keywords ("media-empty-warning", "offline", ...).
    pub state_reasons: Vec<String>,
    /// Capability attributes, when the device advertises them.
    pub capabilities: Option<ProtocolCapabilities>,
}

impl DeviceRecord {
    /// Minimal record for a device known only by URI.
    pub fn unknown(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        Self {
            name: uri.clone(),
            uri,
            make_model: String::new(),
            location: String::new(),
            is_online: false,
            last_probe: Utc::now(),
            state: 5,
            state_reasons: Vec::new(),
            capabilities: None,
        }
    }

    /// Whether the spooler considers this device operational: state idle or
    /// processing and no state reason indicating it is offline, shut down,
    /// or paused.
    pub fn spooler_ready(&self) -> bool {
        if self.state != 3 && self.state != 4 {
            return false;
        }
        !self.state_reasons.iter().any(|reason| {
            let r = reason.to_ascii_lowercase();
            r.contains("offline") || r.contains("shutdown") || r.contains("paused")
        })
    }
}

/// Capability set advertised by a protocol generator (and attached to
/// devices once resolved).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolCapabilities {
    pub vendor: Vendor,
    pub model: String,
    pub supported_sizes: Vec<MediaSize>,
    pub supported_resolutions: Vec<u32>,
    pub supported_colors: Vec<ColorMode>,
    pub supports_duplex: bool,
    pub supports_booklet: bool,
    /// Maximum physical paper width in millimetres (roll width for plotters).
    pub max_width_mm: u32,
    /// Maximum physical paper height (roll length) in millimetres.
    pub max_height_mm: u32,
}

impl ProtocolCapabilities {
    /// Capability set for a device we know nothing about.
    pub fn unknown(vendor: Vendor, model: impl Into<String>) -> Self {
        Self {
            vendor,
            model: model.into(),
            supported_sizes: Vec::new(),
            supported_resolutions: Vec::new(),
            supported_colors: Vec::new(),
            supports_duplex: false,
            supports_booklet: false,
            max_width_mm: 0,
            max_height_mm: 0,
        }
    }

    pub fn supports_size(&self, size: MediaSize) -> bool {
        self.supported_sizes.contains(&size)
    }

    pub fn supports_resolution(&self, dpi: u32) -> bool {
        self.supported_resolutions.contains(&dpi)
    }

    pub fn supports_color(&self, mode: ColorMode) -> bool {
        self.supported_colors.contains(&mode)
    }
}

/// A device record enriched with protocol knowledge.
///
/// Derived once per device per discovery pass and cached by URI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedDeviceInfo {
    pub device: DeviceRecord,
    pub vendor: Vendor,
    /// Ordered protocol list; the recommended protocol is always first.
    pub protocols: Vec<ProtocolId>,
    pub recommended: ProtocolId,
    pub capabilities: ProtocolCapabilities,
    /// Vendor-specific behavioral tweaks ("paper_feed_delay" → "500ms").
    pub quirks: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_detection_matches_keywords() {
        assert_eq!(Vendor::detect("HP DesignJet T1200"), Vendor::Hp);
        assert_eq!(Vendor::detect("Hewlett-Packard LaserJet"), Vendor::Hp);
        assert_eq!(Vendor::detect("Canon imagePROGRAF TX-3000"), Vendor::Canon);
        assert_eq!(Vendor::detect("EPSON SureColor T5200"), Vendor::Epson);
        assert_eq!(Vendor::detect("surecolor t7700"), Vendor::Epson);
        assert_eq!(Vendor::detect("Brother HL-2270DW"), Vendor::Generic);
    }

    #[test]
    fn quality_maps_to_dpi() {
        let mut options = PrintOptions::default();
        for (quality, dpi) in [(1, 300), (2, 300), (3, 600), (4, 600), (5, 1200)] {
            options.quality = quality;
            assert_eq!(options.dpi(), dpi);
        }
    }

    #[test]
    fn media_size_tags_round_trip() {
        for size in [
            MediaSize::A0,
            MediaSize::A4,
            MediaSize::B2,
            MediaSize::Letter,
            MediaSize::Tabloid,
        ] {
            assert_eq!(MediaSize::from_tag(&size.to_string()), Some(size));
        }
        assert_eq!(MediaSize::from_tag("postcard"), None);
    }

    #[test]
    fn color_mode_tags() {
        assert_eq!(ColorMode::from_tag("color"), Some(ColorMode::Color));
        assert_eq!(ColorMode::from_tag("Grayscale"), Some(ColorMode::Monochrome));
        assert_eq!(ColorMode::from_tag("sepia"), None);
    }

    #[test]
    fn spooler_ready_requires_operational_state() {
        let mut device = DeviceRecord::unknown("ipp://10.0.0.9:631/ipp/print");
        device.state = 3;
        assert!(device.spooler_ready());

        device.state = 4;
        assert!(device.spooler_ready());

        device.state = 5;
        assert!(!device.spooler_ready());
    }

    #[test]
    fn spooler_ready_rejects_offline_reasons() {
        let mut device = DeviceRecord::unknown("ipp://10.0.0.9:631/ipp/print");
        device.state = 3;
        device.state_reasons = vec!["media-empty-warning".into()];
        assert!(device.spooler_ready());

        device.state_reasons = vec!["offline-report".into()];
        assert!(!device.spooler_ready());

        device.state_reasons = vec!["paused".into()];
        assert!(!device.spooler_ready());
    }

    #[test]
    fn new_job_derives_display_name() {
        let job = PrintJob::new("office1", "/tmp/reports/q3.pdf", PrintOptions::default());
        assert_eq!(job.file_name, "q3.pdf");
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.spooler_id, 0);
    }
}

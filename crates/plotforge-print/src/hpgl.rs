// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HP-GL and HP-GL/2 payload synthesis for HP wide-format plotters.
//
// HP-GL is a pen-plotter command language: short mnemonic commands (`PU`
// pen-up, `PD` pen-down, `PA` plot-absolute) wrapped in an escape-prefixed
// setup envelope.  HP-GL/2 adds the `ESC%0B` / `ESC%0A` mode switches and
// multi-pen color support on top of the same command set.

use plotforge_core::error::{PlotforgeError, Result};
use plotforge_core::types::{ColorMode, MediaSize, ProtocolCapabilities, ProtocolId, Vendor};

use crate::protocol::ProtocolGenerator;

/// Reset the plotter (ESC . @).
const RESET: &str = "\x1B.@";
/// Enter HP-GL/2 mode (ESC % 0 B).
const ENTER_HPGL2: &str = "\x1B%0B";
/// Exit HP-GL/2 mode (ESC % 0 A).
const EXIT_HPGL2: &str = "\x1B%0A";
/// Exit plot mode (ESC E).
const EXIT_PLOT: &str = "\x1BE";

/// Grayscale threshold below which a pixel counts as ink when deriving pen
/// strokes from raster data.
const INK_THRESHOLD: u8 = 0x80;

/// Which dialect the generator emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HpglDialect {
    Hpgl,
    Hpgl2,
}

/// Generator for the HP-GL family.
pub struct HpglGenerator {
    dialect: HpglDialect,
}

impl HpglGenerator {
    pub fn new(dialect: HpglDialect) -> Self {
        Self { dialect }
    }

    fn is_hpgl2(&self) -> bool {
        self.dialect == HpglDialect::Hpgl2
    }

    /// HP-GL media-select code for a paper size.  A0 loads from roll.
    fn media_code(size: MediaSize) -> Option<&'static str> {
        match size {
            MediaSize::A0 => Some("ROL"),
            MediaSize::A1 => Some("A1P"),
            MediaSize::A2 => Some("A2P"),
            MediaSize::A3 => Some("A3P"),
            MediaSize::A4 => Some("A4P"),
            MediaSize::Letter => Some("LETTERP"),
            _ => None,
        }
    }
}

impl ProtocolGenerator for HpglGenerator {
    fn generate_header(
        &self,
        _caps: &ProtocolCapabilities,
        media: MediaSize,
        color: ColorMode,
        dpi: u32,
    ) -> Result<Vec<u8>> {
        let code = Self::media_code(media).ok_or_else(|| {
            PlotforgeError::UnsupportedConfiguration(format!(
                "media size {media} not supported by {}",
                self.protocol()
            ))
        })?;
        if !self.validate_resolution(dpi) {
            return Err(PlotforgeError::UnsupportedConfiguration(format!(
                "{dpi} DPI not supported by {}",
                self.protocol()
            )));
        }
        if !self.validate_color_mode(color) {
            return Err(PlotforgeError::UnsupportedConfiguration(
                "color output requires HP-GL/2".into(),
            ));
        }

        let mut header = String::new();
        header.push_str(RESET);
        if self.is_hpgl2() {
            header.push_str(ENTER_HPGL2);
        }
        header.push_str("PU0,0;");
        header.push_str("PA0,0;");
        header.push_str(&format!("PM{code};"));
        header.push_str(&format!("PS{dpi};"));
        if self.is_hpgl2() && color == ColorMode::Color {
            // Multi-color mode, three pens.
            header.push_str("MC3;");
        }
        header.push_str("SP1;");

        Ok(header.into_bytes())
    }

    fn generate_page(&self, raster: &[u8], width: u32, height: u32, _dpi: u32) -> Result<Vec<u8>> {
        // Pre-converted HP-GL from the upstream converter passes through
        // untouched.
        if looks_like_hpgl(raster) {
            return Ok(raster.to_vec());
        }

        // An exact width×height buffer is treated as 8-bit grayscale and
        // swept into pen strokes, one run of ink per PD segment.
        if raster.len() == (width as usize) * (height as usize) {
            return Ok(vectorize_grayscale(raster, width, height));
        }

        // Anything else is assumed device-ready (the conversion step is an
        // opaque upstream collaborator).
        Ok(raster.to_vec())
    }

    fn generate_footer(&self) -> Result<Vec<u8>> {
        let mut footer = String::new();
        footer.push_str("PU;");
        footer.push_str(EXIT_PLOT);
        if self.is_hpgl2() {
            footer.push_str(EXIT_HPGL2);
        }
        footer.push_str(RESET);
        Ok(footer.into_bytes())
    }

    fn validate_media_size(&self, size: MediaSize) -> bool {
        Self::media_code(size).is_some()
    }

    fn validate_resolution(&self, dpi: u32) -> bool {
        matches!(dpi, 300 | 600 | 1200)
    }

    fn validate_color_mode(&self, mode: ColorMode) -> bool {
        mode == ColorMode::Monochrome || (self.is_hpgl2() && mode == ColorMode::Color)
    }

    fn protocol(&self) -> ProtocolId {
        match self.dialect {
            HpglDialect::Hpgl => ProtocolId::Hpgl,
            HpglDialect::Hpgl2 => ProtocolId::Hpgl2,
        }
    }

    fn capabilities(&self) -> ProtocolCapabilities {
        let supported_colors = if self.is_hpgl2() {
            vec![ColorMode::Monochrome, ColorMode::Color]
        } else {
            vec![ColorMode::Monochrome]
        };
        ProtocolCapabilities {
            vendor: Vendor::Hp,
            model: "DesignJet".into(),
            supported_sizes: vec![
                MediaSize::A0,
                MediaSize::A1,
                MediaSize::A2,
                MediaSize::A3,
                MediaSize::A4,
                MediaSize::Letter,
            ],
            supported_resolutions: vec![300, 600, 1200],
            supported_colors,
            supports_duplex: false,
            supports_booklet: false,
            // 44-inch roll.
            max_width_mm: 1118,
            max_height_mm: 1600,
        }
    }

    fn optimize_for_vendor(&self, payload: Vec<u8>) -> Vec<u8> {
        // HP device buffers consume raw HP-GL/2 directly; no repacking
        // needed.
        payload
    }

    fn needs_preprocessing(&self) -> bool {
        true
    }
}

/// Whether a buffer already contains HP-GL command text.
fn looks_like_hpgl(data: &[u8]) -> bool {
    data.starts_with(b"\x1B")
        || data.starts_with(b"PU")
        || data.starts_with(b"PA")
        || data.starts_with(b"PD")
        || data.starts_with(b"IN")
}

/// Sweep an 8-bit grayscale raster into pen strokes.
///
/// Each horizontal run of ink becomes one plot-absolute move with the pen
/// up, a pen-down draw across the run, and a pen-up at the end.
fn vectorize_grayscale(raster: &[u8], width: u32, height: u32) -> Vec<u8> {
    let width = width as usize;
    let mut out = String::new();
    for y in 0..height as usize {
        let row = &raster[y * width..(y + 1) * width];
        let mut x = 0;
        while x < width {
            if row[x] < INK_THRESHOLD {
                let start = x;
                while x < width && row[x] < INK_THRESHOLD {
                    x += 1;
                }
                out.push_str(&format!("PA{start},{y};PD;PA{},{y};PU;", x - 1));
            } else {
                x += 1;
            }
        }
    }
    out.into_bytes()
}

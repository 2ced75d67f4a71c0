// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The protocol generator contract and its factory.
//
// A generator turns print settings plus raster data into a complete
// vendor-specific wire payload (header, page, footer).  Generators are
// stateless: a single instance may serve many jobs concurrently, and every
// call returns a fresh byte sequence.

use plotforge_core::error::{PlotforgeError, Result};
use plotforge_core::types::{ColorMode, MediaSize, ProtocolCapabilities, ProtocolId, Vendor};

use crate::hpgl::{HpglDialect, HpglGenerator};
use crate::matrix;
use crate::postscript::PostScriptGenerator;

/// Uniform contract over plotter protocol generators.
///
/// Validation methods return a plain `bool` and never fail; generation
/// methods return [`PlotforgeError::UnsupportedConfiguration`] when asked for
/// a size, resolution, or color mode the generator cannot produce.  Callers
/// are expected to gate on validation first.
pub trait ProtocolGenerator: Send + Sync {
    /// Produce the job header for the given configuration.
    fn generate_header(
        &self,
        caps: &ProtocolCapabilities,
        media: MediaSize,
        color: ColorMode,
        dpi: u32,
    ) -> Result<Vec<u8>>;

    /// Produce one page of payload from raster data.
    ///
    /// `width` and `height` are the page dimensions in pixels at `dpi`.
    fn generate_page(&self, raster: &[u8], width: u32, height: u32, dpi: u32) -> Result<Vec<u8>>;

    /// Produce the job trailer.
    fn generate_footer(&self) -> Result<Vec<u8>>;

    fn validate_media_size(&self, size: MediaSize) -> bool;
    fn validate_resolution(&self, dpi: u32) -> bool;
    fn validate_color_mode(&self, mode: ColorMode) -> bool;

    /// Which wire protocol this generator emits.
    fn protocol(&self) -> ProtocolId;

    /// The capability set this generator can serve.
    fn capabilities(&self) -> ProtocolCapabilities;

    /// Apply vendor-specific post-processing to a finished payload.
    fn optimize_for_vendor(&self, payload: Vec<u8>) -> Vec<u8>;

    /// Whether the source document must be pre-converted (raster → vector)
    /// before this generator can consume it.
    fn needs_preprocessing(&self) -> bool;
}

/// Instantiate the generator for a protocol tag.
///
/// `vendor` selects vendor-specific hints for protocols that carry them
/// (PostScript `setuserparams`); it does not change the wire protocol.
pub fn create_generator(protocol: ProtocolId, vendor: Vendor) -> Result<Box<dyn ProtocolGenerator>> {
    match protocol {
        ProtocolId::Hpgl => Ok(Box::new(HpglGenerator::new(HpglDialect::Hpgl))),
        ProtocolId::Hpgl2 => Ok(Box::new(HpglGenerator::new(HpglDialect::Hpgl2))),
        ProtocolId::PostScript => Ok(Box::new(PostScriptGenerator::new(vendor))),
        other => Err(PlotforgeError::UnknownProtocol(format!(
            "no generator for {other}"
        ))),
    }
}

/// Instantiate the generator recommended for a device model.
pub fn generator_for_model(vendor: Vendor, model: &str) -> Result<Box<dyn ProtocolGenerator>> {
    let protocol = matrix::recommended_protocol(vendor, model);
    create_generator(protocol, vendor)
}

/// Ordered protocol list for a model: the registry fallbacks with the
/// recommended protocol hoisted to position 0.
pub fn available_protocols(vendor: Vendor, model: &str) -> Vec<ProtocolId> {
    let recommended = matrix::recommended_protocol(vendor, model);
    let mut protocols = vec![recommended];
    for fallback in matrix::fallback_protocols(vendor, model) {
        if fallback != recommended {
            protocols.push(fallback);
        }
    }
    protocols
}

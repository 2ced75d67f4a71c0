// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PostScript payload synthesis for Canon, Epson, and generic plotters.
//
// For wide-format devices PostScript serves as an image-carrying envelope: a
// DSC-conforming prolog selects page size, color model, and resolution via
// `setpagedevice`, each page wraps the raster in a DCTDecode `image`
// invocation, and `showpage` ejects it.  The target vendor only influences
// the `setuserparams` hint block in the prolog.

use chrono::Utc;

use plotforge_core::error::{PlotforgeError, Result};
use plotforge_core::types::{ColorMode, MediaSize, ProtocolCapabilities, ProtocolId, Vendor};

use crate::protocol::ProtocolGenerator;

/// Generator for vendor-hinted PostScript.
pub struct PostScriptGenerator {
    target_vendor: Vendor,
}

impl PostScriptGenerator {
    pub fn new(target_vendor: Vendor) -> Self {
        Self { target_vendor }
    }

    /// Page dimensions in PostScript points (1/72 inch), portrait.
    fn points(size: MediaSize) -> Option<(u32, u32)> {
        match size {
            MediaSize::A0 => Some((2384, 3370)),
            MediaSize::A1 => Some((1684, 2384)),
            MediaSize::A2 => Some((1191, 1684)),
            MediaSize::A3 => Some((842, 1191)),
            MediaSize::A4 => Some((595, 842)),
            MediaSize::Letter => Some((612, 792)),
            MediaSize::Legal => Some((612, 1008)),
            MediaSize::Tabloid => Some((792, 1224)),
            _ => None,
        }
    }
}

impl ProtocolGenerator for PostScriptGenerator {
    fn generate_header(
        &self,
        _caps: &ProtocolCapabilities,
        media: MediaSize,
        color: ColorMode,
        dpi: u32,
    ) -> Result<Vec<u8>> {
        let (width, height) = Self::points(media).ok_or_else(|| {
            PlotforgeError::UnsupportedConfiguration(format!(
                "media size {media} not supported by PostScript"
            ))
        })?;
        if !self.validate_resolution(dpi) {
            return Err(PlotforgeError::UnsupportedConfiguration(format!(
                "{dpi} DPI not supported by PostScript"
            )));
        }

        let color_model = match color {
            ColorMode::Color => "/DeviceRGB",
            ColorMode::Monochrome => "/DeviceGray",
        };

        let mut ps = String::new();
        ps.push_str("%!PS-Adobe-3.0\n");
        ps.push_str("%%Creator: plotforge\n");
        ps.push_str(&format!("%%CreationDate: {}\n", Utc::now().to_rfc3339()));
        ps.push_str("<<\n");
        ps.push_str(&format!("  /PageSize [{width} {height}]\n"));
        ps.push_str("  /MediaClass (plain)\n");
        ps.push_str(&format!("  /ColorModel {color_model}\n"));
        ps.push_str(&format!("  /HWResolution [{dpi} {dpi}]\n"));
        ps.push_str(">> setpagedevice\n\n");

        match self.target_vendor {
            Vendor::Canon => {
                ps.push_str("% Canon imagePROGRAF settings\n");
                ps.push_str("<< /ColorRenderingType 1 >> setuserparams\n");
            }
            Vendor::Epson => {
                ps.push_str("% Epson SureColor settings\n");
                ps.push_str("<< /Optimize true >> setuserparams\n");
            }
            Vendor::Hp | Vendor::Generic => {}
        }

        ps.push_str("%%EndProlog\n\n");
        Ok(ps.into_bytes())
    }

    fn generate_page(&self, raster: &[u8], width: u32, height: u32, _dpi: u32) -> Result<Vec<u8>> {
        let mut page = String::new();
        page.push_str("gsave\n");
        page.push_str(&format!("{width} {height} scale\n"));
        page.push_str("currentfile /DCTDecode filter\n");
        page.push_str("image\n");

        let mut out = page.into_bytes();
        out.extend_from_slice(raster);
        Ok(out)
    }

    fn generate_footer(&self) -> Result<Vec<u8>> {
        Ok(b"grestore\nshowpage\n%%EOF\n".to_vec())
    }

    fn validate_media_size(&self, size: MediaSize) -> bool {
        Self::points(size).is_some()
    }

    fn validate_resolution(&self, dpi: u32) -> bool {
        matches!(dpi, 300 | 600 | 720 | 1200)
    }

    fn validate_color_mode(&self, _mode: ColorMode) -> bool {
        true
    }

    fn protocol(&self) -> ProtocolId {
        ProtocolId::PostScript
    }

    fn capabilities(&self) -> ProtocolCapabilities {
        let model = match self.target_vendor {
            Vendor::Canon => "imagePROGRAF",
            Vendor::Epson => "SureColor",
            Vendor::Hp => "DesignJet",
            Vendor::Generic => "Generic",
        };
        ProtocolCapabilities {
            vendor: self.target_vendor,
            model: model.into(),
            supported_sizes: vec![
                MediaSize::A0,
                MediaSize::A1,
                MediaSize::A2,
                MediaSize::A3,
                MediaSize::A4,
                MediaSize::Letter,
                MediaSize::Legal,
                MediaSize::Tabloid,
            ],
            supported_resolutions: vec![300, 600, 720, 1200],
            supported_colors: vec![ColorMode::Monochrome, ColorMode::Color],
            supports_duplex: false,
            supports_booklet: false,
            max_width_mm: 1118,
            max_height_mm: 1600,
        }
    }

    fn optimize_for_vendor(&self, payload: Vec<u8>) -> Vec<u8> {
        // Vendor rendering hints live in the prolog; the payload itself
        // needs no transformation.
        payload
    }

    fn needs_preprocessing(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> ProtocolCapabilities {
        PostScriptGenerator::new(Vendor::Generic).capabilities()
    }

    fn header_text(vendor: Vendor, media: MediaSize, color: ColorMode, dpi: u32) -> String {
        let generator = PostScriptGenerator::new(vendor);
        let header = generator
            .generate_header(&caps(), media, color, dpi)
            .expect("header");
        String::from_utf8(header).expect("ascii")
    }

    #[test]
    fn header_is_dsc_conforming() {
        let text = header_text(Vendor::Generic, MediaSize::A4, ColorMode::Color, 600);
        assert!(text.starts_with("%!PS-Adobe-3.0\n"));
        assert!(text.contains("%%Creator: plotforge"));
        assert!(text.contains("/PageSize [595 842]"));
        assert!(text.contains("/ColorModel /DeviceRGB"));
        assert!(text.contains("/HWResolution [600 600]"));
        assert!(text.contains("%%EndProlog"));
    }

    #[test]
    fn monochrome_selects_device_gray() {
        let text = header_text(Vendor::Generic, MediaSize::A0, ColorMode::Monochrome, 300);
        assert!(text.contains("/ColorModel /DeviceGray"));
        assert!(text.contains("/PageSize [2384 3370]"));
    }

    #[test]
    fn canon_and_epson_emit_vendor_hints() {
        let canon = header_text(Vendor::Canon, MediaSize::A2, ColorMode::Color, 600);
        assert!(canon.contains("/ColorRenderingType 1"));

        let epson = header_text(Vendor::Epson, MediaSize::A2, ColorMode::Color, 720);
        assert!(epson.contains("/Optimize true"));

        let generic = header_text(Vendor::Generic, MediaSize::A2, ColorMode::Color, 600);
        assert!(!generic.contains("setuserparams"));
    }

    #[test]
    fn page_wraps_raster_in_image_operator() {
        let generator = PostScriptGenerator::new(Vendor::Epson);
        let raster = vec![0xAB; 16];
        let page = generator.generate_page(&raster, 1191, 1684, 600).expect("page");
        let prefix = b"gsave\n1191 1684 scale\ncurrentfile /DCTDecode filter\nimage\n";
        assert!(page.starts_with(prefix));
        assert!(page.ends_with(&raster[..]));
    }

    #[test]
    fn footer_shows_page_and_terminates() {
        let generator = PostScriptGenerator::new(Vendor::Canon);
        let footer = generator.generate_footer().expect("footer");
        assert_eq!(footer, b"grestore\nshowpage\n%%EOF\n".to_vec());
    }

    #[test]
    fn supports_720_dpi_unlike_hpgl() {
        let generator = PostScriptGenerator::new(Vendor::Epson);
        assert!(generator.validate_resolution(720));
        assert!(!generator.validate_resolution(450));
    }

    #[test]
    fn b_series_is_unsupported() {
        let generator = PostScriptGenerator::new(Vendor::Generic);
        assert!(!generator.validate_media_size(MediaSize::B1));
        assert!(generator.validate_media_size(MediaSize::Tabloid));
    }

    #[test]
    fn no_preprocessing_needed() {
        assert!(!PostScriptGenerator::new(Vendor::Canon).needs_preprocessing());
    }
}

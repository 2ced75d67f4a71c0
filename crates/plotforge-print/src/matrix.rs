// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Static per-model compatibility registry for wide-format plotters.
//
// Maps (vendor, model) to the protocols a device accepts, the designated
// primary, the ordered fallbacks, and known behavioral quirks.  The table is
// built once and never mutated at runtime, so readers need no lock.
//
// Lookups normalize both sides (lowercase, `-`/`_`/space runs unified) and
// match the entry model as a substring of the device make-and-model string,
// so "HP DesignJet T1200 PostScript" resolves to the T1200 entry.

use std::collections::HashMap;
use std::sync::LazyLock;

use plotforge_core::types::{ProtocolId, Vendor};

/// One row of the compatibility database.  Immutable at runtime.
#[derive(Debug, Clone)]
pub struct CompatibilityEntry {
    pub vendor: Vendor,
    pub model: &'static str,
    /// Every protocol the device accepts.
    pub supported: Vec<ProtocolId>,
    /// Designated first choice for payload synthesis.
    pub primary: ProtocolId,
    /// Ordered fallbacks, tried when the primary is unusable.
    pub fallbacks: Vec<ProtocolId>,
    /// Whether documents must be pre-converted before synthesis.
    pub requires_preprocessing: bool,
    /// Per-model behavioral tweaks, surfaced as string → string.
    pub quirks: &'static [(&'static str, &'static str)],
}

static REGISTRY: LazyLock<Vec<CompatibilityEntry>> = LazyLock::new(|| {
    use ProtocolId::{EscP, Hpgl2, Pdf, PostScript};

    vec![
        // -- HP DesignJet --
        CompatibilityEntry {
            vendor: Vendor::Hp,
            model: "DesignJet T1200",
            supported: vec![Hpgl2, PostScript, Pdf],
            primary: Hpgl2,
            fallbacks: vec![PostScript, Pdf],
            requires_preprocessing: true,
            quirks: &[("paper_feed_delay", "500ms"), ("pen_warmup", "true")],
        },
        CompatibilityEntry {
            vendor: Vendor::Hp,
            model: "DesignJet T2300",
            supported: vec![Hpgl2, PostScript, Pdf],
            primary: Hpgl2,
            fallbacks: vec![PostScript, Pdf],
            requires_preprocessing: true,
            quirks: &[("paper_feed_delay", "300ms"), ("color_calibration", "required")],
        },
        CompatibilityEntry {
            vendor: Vendor::Hp,
            model: "DesignJet T3500",
            supported: vec![Hpgl2, PostScript, Pdf],
            primary: Hpgl2,
            fallbacks: vec![PostScript, Pdf],
            requires_preprocessing: true,
            quirks: &[("paper_feed_delay", "200ms"), ("high_speed_mode", "true")],
        },
        // -- Canon imagePROGRAF --
        CompatibilityEntry {
            vendor: Vendor::Canon,
            model: "imagePROGRAF TX-3000",
            supported: vec![PostScript, Pdf, Hpgl2],
            primary: PostScript,
            fallbacks: vec![Pdf, Hpgl2],
            requires_preprocessing: false,
            quirks: &[
                ("icc_profile_required", "true"),
                ("ultrachrome_ink_support", "true"),
            ],
        },
        CompatibilityEntry {
            vendor: Vendor::Canon,
            model: "imagePROGRAF TX-4000",
            supported: vec![PostScript, Pdf, Hpgl2],
            primary: PostScript,
            fallbacks: vec![Pdf, Hpgl2],
            requires_preprocessing: false,
            quirks: &[("icc_profile_required", "true"), ("lucia_pro_ink", "true")],
        },
        CompatibilityEntry {
            vendor: Vendor::Canon,
            model: "imagePROGRAF PRO-6000",
            supported: vec![PostScript, Pdf],
            primary: PostScript,
            fallbacks: vec![Pdf],
            requires_preprocessing: false,
            quirks: &[("12_color_ink", "true"), ("professional_grade", "true")],
        },
        // -- Epson SureColor --
        CompatibilityEntry {
            vendor: Vendor::Epson,
            model: "SureColor T5200",
            supported: vec![PostScript, EscP, Pdf],
            primary: PostScript,
            fallbacks: vec![EscP, Pdf],
            requires_preprocessing: false,
            quirks: &[("max_roll_width", "1118mm"), ("surecolor_mode", "true")],
        },
        CompatibilityEntry {
            vendor: Vendor::Epson,
            model: "SureColor T7200",
            supported: vec![PostScript, EscP, Pdf],
            primary: PostScript,
            fallbacks: vec![EscP, Pdf],
            requires_preprocessing: false,
            quirks: &[("max_roll_width", "1118mm"), ("ultrachrome_xd2", "true")],
        },
        CompatibilityEntry {
            vendor: Vendor::Epson,
            model: "SureColor T7700",
            supported: vec![PostScript, EscP, Pdf],
            primary: PostScript,
            fallbacks: vec![EscP, Pdf],
            requires_preprocessing: false,
            quirks: &[("max_roll_width", "1118mm"), ("dual_roll_support", "true")],
        },
    ]
});

/// Normalize a model string for matching: lowercase with `-`, `_`, and
/// whitespace runs collapsed to single spaces.
fn normalize(model: &str) -> String {
    let mut out = String::with_capacity(model.len());
    let mut last_was_sep = true;
    for c in model.chars() {
        if c == '-' || c == '_' || c.is_whitespace() {
            if !last_was_sep {
                out.push(' ');
                last_was_sep = true;
            }
        } else {
            out.extend(c.to_lowercase());
            last_was_sep = false;
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Find the registry entry for a device, if any.
pub fn lookup(vendor: Vendor, model: &str) -> Option<&'static CompatibilityEntry> {
    let normalized = normalize(model);
    REGISTRY
        .iter()
        .find(|entry| entry.vendor == vendor && normalized.contains(&normalize(entry.model)))
}

/// Whether a (vendor, model) pair is known to accept a protocol.
///
/// Unknown models are never compatible; callers fall through to
/// [`recommended_protocol`] defaults instead.
pub fn is_compatible(vendor: Vendor, model: &str, protocol: ProtocolId) -> bool {
    lookup(vendor, model).is_some_and(|entry| entry.supported.contains(&protocol))
}

/// The designated primary protocol for a model.
///
/// Unknown models default to HP-GL/2 for HP devices and PostScript for
/// everything else.
pub fn recommended_protocol(vendor: Vendor, model: &str) -> ProtocolId {
    match lookup(vendor, model) {
        Some(entry) => entry.primary,
        None => {
            if vendor == Vendor::Hp {
                ProtocolId::Hpgl2
            } else {
                ProtocolId::PostScript
            }
        }
    }
}

/// Ordered fallback protocols for a model.
///
/// Unknown models get the universal chain PostScript → HP-GL/2 → ESC/P.
pub fn fallback_protocols(vendor: Vendor, model: &str) -> Vec<ProtocolId> {
    match lookup(vendor, model) {
        Some(entry) => entry.fallbacks.clone(),
        None => vec![ProtocolId::PostScript, ProtocolId::Hpgl2, ProtocolId::EscP],
    }
}

/// Known quirks for a model; empty for unknown models.
pub fn quirks(vendor: Vendor, model: &str) -> HashMap<String, String> {
    match lookup(vendor, model) {
        Some(entry) => entry
            .quirks
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
        None => HashMap::new(),
    }
}

/// Whether documents for a model must be pre-converted before synthesis.
pub fn requires_preprocessing(vendor: Vendor, model: &str) -> bool {
    match lookup(vendor, model) {
        Some(entry) => entry.requires_preprocessing,
        None => vendor == Vendor::Hp,
    }
}

/// All registry entries, for listings and diagnostics.
pub fn entries() -> &'static [CompatibilityEntry] {
    &REGISTRY
}

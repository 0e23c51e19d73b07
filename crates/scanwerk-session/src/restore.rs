// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Default and restored scan settings.
//
// Saved settings are re-applied field by field. A saved value the scanner no
// longer supports is replaced by the default for that field, and the change
// is reported so it can be logged or shown.

use tracing::{debug, info};

use scanwerk_core::AppConfig;
use scanwerk_core::settings::ScannerSetting;
use scanwerk_core::types::{ColorMode, PageSize, ScanSettings, ScanSource, ScannerCapabilities, SourceType};

/// A saved value that could not be restored as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    /// Which setting was changed.
    pub field: &'static str,
    pub saved: String,
    pub restored: String,
}

/// Settings chosen for a scanner plus anything that had to change.
#[derive(Debug, Clone)]
pub struct RestoredSettings {
    pub settings: ScanSettings,
    pub multi_page_scan_checked: bool,
    pub corrections: Vec<Correction>,
}

/// Settings used when nothing saved applies, `None` if the scanner
/// reports no sources at all.
pub fn default_settings(caps: &ScannerCapabilities, config: &AppConfig) -> Option<ScanSettings> {
    let source = default_source(caps)?;
    Some(ScanSettings {
        source_name: source.name.clone(),
        source_type: source.source_type,
        file_type: config.preferred_file_type,
        color_mode: default_color_mode(source),
        page_size: default_page_size(source, config.preferred_page_size),
        resolution_dpi: default_resolution(source, config.preferred_resolution_dpi),
    })
}

/// Re-apply `saved` on top of the defaults for `caps`.
pub fn restore_settings(
    caps: &ScannerCapabilities,
    saved: &ScannerSetting,
    config: &AppConfig,
) -> Option<RestoredSettings> {
    let defaults = default_settings(caps, config)?;
    let mut corrections = Vec::new();

    let source = match caps.source(&saved.source_name) {
        Some(source) => source,
        None => {
            corrections.push(Correction {
                field: "Source",
                saved: saved.source_name.clone(),
                restored: defaults.source_name.clone(),
            });
            caps.source(&defaults.source_name)?
        }
    };

    let color_mode = if source.color_modes.contains(&saved.color_mode) {
        saved.color_mode
    } else {
        let fallback = default_color_mode(source);
        corrections.push(correction("Color mode", &saved.color_mode, &fallback));
        fallback
    };

    let page_size = if source.page_sizes.contains(&saved.page_size) {
        saved.page_size
    } else {
        let fallback = closest_page_size(saved.page_size, &source.page_sizes)
            .unwrap_or_else(|| default_page_size(source, config.preferred_page_size));
        corrections.push(correction("Page size", &saved.page_size, &fallback));
        fallback
    };

    let resolution_dpi = if source.resolutions.contains(&saved.resolution_dpi) {
        saved.resolution_dpi
    } else {
        let fallback = default_resolution(source, config.preferred_resolution_dpi);
        corrections.push(correction("Resolution", &saved.resolution_dpi, &fallback));
        fallback
    };

    let settings = ScanSettings {
        source_name: source.name.clone(),
        source_type: source.source_type,
        file_type: saved.file_type,
        color_mode,
        page_size,
        resolution_dpi,
    };
    let multi_page_scan_checked = saved.multi_page_scan_checked && settings.supports_multi_page();

    if corrections.is_empty() {
        debug!(scanner = %saved.name, "saved settings restored unchanged");
    } else {
        info!(
            scanner = %saved.name,
            corrections = corrections.len(),
            "saved settings adjusted to scanner capabilities"
        );
    }

    Some(RestoredSettings {
        settings,
        multi_page_scan_checked,
        corrections,
    })
}

fn correction(field: &'static str, saved: &impl std::fmt::Debug, restored: &impl std::fmt::Debug) -> Correction {
    Correction {
        field,
        saved: format!("{saved:?}"),
        restored: format!("{restored:?}"),
    }
}

fn default_source(caps: &ScannerCapabilities) -> Option<&ScanSource> {
    caps.sources
        .iter()
        .find(|s| s.source_type == SourceType::Flatbed)
        .or_else(|| caps.sources.first())
}

fn default_color_mode(source: &ScanSource) -> ColorMode {
    if source.color_modes.contains(&ColorMode::Color) {
        ColorMode::Color
    } else {
        source.color_modes.first().copied().unwrap_or(ColorMode::Color)
    }
}

fn default_page_size(source: &ScanSource, preferred: PageSize) -> PageSize {
    if source.page_sizes.contains(&preferred) {
        preferred
    } else {
        source.page_sizes.first().copied().unwrap_or(PageSize::Max)
    }
}

fn default_resolution(source: &ScanSource, preferred: u32) -> u32 {
    if source.resolutions.contains(&preferred) {
        preferred
    } else {
        source.resolutions.first().copied().unwrap_or(preferred)
    }
}

/// Nearest supported page size by area; `Max` only matches `Max`.
fn closest_page_size(requested: PageSize, supported: &[PageSize]) -> Option<PageSize> {
    let (req_w, req_h) = requested.dimensions_mm()?;
    let req_area = i64::from(req_w * req_h);

    supported
        .iter()
        .filter_map(|size| size.dimensions_mm().map(|(w, h)| (*size, i64::from(w * h))))
        .min_by_key(|(_, area)| (area - req_area).unsigned_abs())
        .map(|(size, _)| size)
}

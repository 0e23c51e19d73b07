// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Scanwerk scan session engine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a scan job issued by the backend (single-shot or multi-page).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanJobId(pub Uuid);

impl ScanJobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScanJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ScanJobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle to a scanned page image held outside the session
/// (an object URL, a texture id, a temp file).
///
/// Handles are allocated and released through the bridge's `ImageStore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageHandle(pub u64);

impl std::fmt::Display for PageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "page#{}", self.0)
    }
}

/// A scanner reported by the backend's device listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerInfo {
    /// Backend-assigned identifier, stable for the lifetime of the device.
    pub id: String,
    /// Human-readable name shown in the scanner selector.
    pub display_name: String,
}

/// Physical input the page is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    Flatbed,
    AdfSimplex,
    AdfDuplex,
    Default,
}

/// Output file format produced by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
    Jpg,
    Pdf,
    Png,
}

impl FileType {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpg => "jpg",
            Self::Pdf => "pdf",
            Self::Png => "png",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorMode {
    BlackAndWhite,
    Grayscale,
    Color,
}

/// Standard scan area sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PageSize {
    IsoA3,
    IsoA4,
    IsoB4,
    Legal,
    NaLetter,
    Tabloid,
    /// Whatever the source's maximum scan area is.
    Max,
}

impl PageSize {
    /// Dimensions in millimetres (width, height), `None` for `Max`.
    pub fn dimensions_mm(&self) -> Option<(u32, u32)> {
        match self {
            Self::IsoA3 => Some((297, 420)),
            Self::IsoA4 => Some((210, 297)),
            Self::IsoB4 => Some((257, 364)),
            Self::Legal => Some((216, 356)),
            Self::NaLetter => Some((216, 279)),
            Self::Tabloid => Some((279, 432)),
            Self::Max => None,
        }
    }
}

/// One input source of a scanner together with what it supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSource {
    pub source_type: SourceType,
    /// Backend name of the source, used as the selection key.
    pub name: String,
    pub color_modes: Vec<ColorMode>,
    pub page_sizes: Vec<PageSize>,
    pub resolutions: Vec<u32>,
}

/// Capabilities returned by the backend for a single scanner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerCapabilities {
    pub sources: Vec<ScanSource>,
}

impl ScannerCapabilities {
    /// Look up a source by its backend name.
    pub fn source(&self, name: &str) -> Option<&ScanSource> {
        self.sources.iter().find(|s| s.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Settings for a single scan request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Name of the selected `ScanSource`.
    pub source_name: String,
    pub source_type: SourceType,
    pub file_type: FileType,
    pub color_mode: ColorMode,
    pub page_size: PageSize,
    pub resolution_dpi: u32,
}

impl ScanSettings {
    /// Whether these settings allow building a document page by page.
    ///
    /// Only flatbed scans written to PDF can be assembled incrementally.
    pub fn supports_multi_page(&self) -> bool {
        self.file_type == FileType::Pdf && self.source_type == SourceType::Flatbed
    }
}

/// Result code reported by the backend when a scan job ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanResult {
    Success,
    UnknownError,
    DeviceBusy,
    AdfJammed,
    AdfEmpty,
    FlatbedOpen,
    IoError,
    Cancelled,
}

impl ScanResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Short-lived, non-modal message for a rejected backend request
/// or a cancellation that could not be honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
    StartScanFailed,
    StartMultiPageScanFailed,
    ScanNextPageFailed,
    RescanPageFailed,
    CancelFailed,
    CapabilitiesFailed,
}

impl Notice {
    /// Localisation key for the notice text.
    pub fn message_key(&self) -> &'static str {
        match self {
            Self::StartScanFailed => "startScanFailedToast",
            Self::StartMultiPageScanFailed => "startMultiPageScanFailedToast",
            Self::ScanNextPageFailed => "scanNextPageFailedToast",
            Self::RescanPageFailed => "rescanPageFailedToast",
            Self::CancelFailed => "cancelFailedToast",
            Self::CapabilitiesFailed => "getCapabilitiesFailedToast",
        }
    }
}

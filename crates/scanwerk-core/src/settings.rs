// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-scanner settings remembered between sessions.
//
// The persisted form is deliberately loose (plain enums and a source name) so
// that a scanner whose capabilities changed since the last scan still loads;
// validation against current capabilities happens when settings are restored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ColorMode, FileType, PageSize, ScanSettings};

/// Last-used settings for one scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerSetting {
    /// Display name of the scanner (ids are not stable across reboots).
    pub name: String,
    pub last_scan_date: DateTime<Utc>,
    pub source_name: String,
    pub file_type: FileType,
    pub color_mode: ColorMode,
    pub page_size: PageSize,
    pub resolution_dpi: u32,
    pub multi_page_scan_checked: bool,
}

/// Everything remembered across app launches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SavedScanSettings {
    pub last_used_scanner: Option<String>,
    pub scanners: Vec<ScannerSetting>,
}

impl SavedScanSettings {
    pub fn for_scanner(&self, name: &str) -> Option<&ScannerSetting> {
        self.scanners.iter().find(|s| s.name == name)
    }

    /// Record a successful scan with `settings` on `scanner_name`.
    ///
    /// Replaces any previous entry for the scanner, marks it last used, and
    /// evicts the least recently scanned entries beyond `max_scanners`.
    pub fn record_scan(
        &mut self,
        scanner_name: &str,
        settings: &ScanSettings,
        multi_page_scan_checked: bool,
        now: DateTime<Utc>,
        max_scanners: usize,
    ) {
        self.scanners.retain(|s| s.name != scanner_name);
        self.scanners.push(ScannerSetting {
            name: scanner_name.to_owned(),
            last_scan_date: now,
            source_name: settings.source_name.clone(),
            file_type: settings.file_type,
            color_mode: settings.color_mode,
            page_size: settings.page_size,
            resolution_dpi: settings.resolution_dpi,
            multi_page_scan_checked,
        });
        self.last_used_scanner = Some(scanner_name.to_owned());

        if self.scanners.len() > max_scanners {
            // Newest first, then drop the tail.
            self.scanners
                .sort_by(|a, b| b.last_scan_date.cmp(&a.last_scan_date));
            self.scanners.truncate(max_scanners);
        }
    }
}

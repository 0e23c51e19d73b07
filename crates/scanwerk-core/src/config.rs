// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use serde::{Deserialize, Serialize};

use crate::types::{FileType, PageSize};

/// Persistent application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Re-apply the last settings used with a scanner once its capabilities arrive.
    pub restore_saved_settings: bool,
    /// Upper bound on remembered per-scanner settings (least recently used evicted).
    pub max_saved_scanners: usize,
    /// Resolution chosen when nothing saved applies.
    pub preferred_resolution_dpi: u32,
    /// Page size chosen when nothing saved applies.
    pub preferred_page_size: PageSize,
    /// File type chosen when nothing saved applies.
    pub preferred_file_type: FileType,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            restore_saved_settings: true,
            max_saved_scanners: 20,
            preferred_resolution_dpi: 300,
            preferred_page_size: PageSize::NaLetter,
            preferred_file_type: FileType::Pdf,
            log_filter: "info".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "max_saved_scanners": 5 }"#).expect("parse");
        assert_eq!(config.max_saved_scanners, 5);
        assert!(config.restore_saved_settings);
        assert_eq!(config.preferred_resolution_dpi, 300);
        assert_eq!(config.log_filter, "info");
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application services: configuration and remembered scan settings, loaded
// from and persisted to the data directory.
//
// Both files are optional. A missing or unreadable file falls back to the
// defaults so a damaged settings file never stops the app from scanning.

use std::path::{Path, PathBuf};

use scanwerk_core::error::Result;
use scanwerk_core::{AppConfig, SavedScanSettings};
use tracing::{info, warn};

use super::data_dir;

const CONFIG_FILE: &str = "config.json";
const SAVED_SETTINGS_FILE: &str = "scan_settings.json";

#[derive(Debug, Clone)]
pub struct AppServices {
    /// `None` for the in-memory fallback; nothing is persisted then.
    data_dir: Option<PathBuf>,
    config: AppConfig,
    saved: SavedScanSettings,
}

impl AppServices {
    /// Load everything from the platform data directory.
    pub fn init() -> Result<Self> {
        Self::open(data_dir::data_dir())
    }

    /// Load everything from `dir`, creating it if needed.
    pub fn open(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)?;
        info!(path = %dir.display(), "initialising app services");

        let config = load_json(&dir.join(CONFIG_FILE)).unwrap_or_default();
        let saved = load_json(&dir.join(SAVED_SETTINGS_FILE)).unwrap_or_default();

        Ok(Self {
            data_dir: Some(dir),
            config,
            saved,
        })
    }

    /// Defaults only, kept in memory.
    pub fn fallback() -> Self {
        Self {
            data_dir: None,
            config: AppConfig::default(),
            saved: SavedScanSettings::default(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn saved_settings(&self) -> &SavedScanSettings {
        &self.saved
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    pub fn save_config(&mut self, config: &AppConfig) -> Result<()> {
        self.config = config.clone();
        self.persist(CONFIG_FILE, config)
    }

    pub fn save_saved_settings(&mut self, saved: &SavedScanSettings) -> Result<()> {
        self.saved = saved.clone();
        self.persist(SAVED_SETTINGS_FILE, saved)
    }

    fn persist(&self, file: &str, value: &impl serde::Serialize) -> Result<()> {
        let Some(dir) = &self.data_dir else {
            warn!(file, "no data directory, not persisted");
            return Ok(());
        };
        let json = serde_json::to_string_pretty(value)?;
        std::fs::write(dir.join(file), json)?;
        Ok(())
    }
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    let data = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&data) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring malformed file");
            None
        }
    }
}

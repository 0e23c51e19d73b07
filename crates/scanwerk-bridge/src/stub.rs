// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub backend for hosts without a scan service.
//
// Every request returns `PlatformUnavailable`, which the session engine
// reports as "no scanners".

use async_trait::async_trait;

use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{ScanJobId, ScanSettings, ScannerCapabilities, ScannerInfo};

use crate::observer::JobObserver;
use crate::traits::{MultiPageScan, ScanBackend};

/// No-op backend returned where no scan service is wired up.
#[derive(Debug, Default)]
pub struct StubBackend;

#[async_trait]
impl ScanBackend for StubBackend {
    fn backend_name(&self) -> &str {
        "stub"
    }

    async fn list_scanners(&self) -> Result<Vec<ScannerInfo>> {
        tracing::warn!("ScanBackend::list_scanners called on stub backend");
        Err(ScanwerkError::PlatformUnavailable)
    }

    async fn scanner_capabilities(&self, _scanner_id: &str) -> Result<ScannerCapabilities> {
        Err(ScanwerkError::PlatformUnavailable)
    }

    async fn start_scan(
        &self,
        _scanner_id: &str,
        _settings: &ScanSettings,
        _observer: JobObserver,
    ) -> Result<ScanJobId> {
        tracing::warn!("ScanBackend::start_scan called on stub backend");
        Err(ScanwerkError::PlatformUnavailable)
    }

    async fn start_multi_page_scan(
        &self,
        _scanner_id: &str,
        _settings: &ScanSettings,
        _observer: JobObserver,
    ) -> Result<Box<dyn MultiPageScan>> {
        tracing::warn!("ScanBackend::start_multi_page_scan called on stub backend");
        Err(ScanwerkError::PlatformUnavailable)
    }

    async fn cancel_scan(&self) -> Result<()> {
        Err(ScanwerkError::PlatformUnavailable)
    }
}

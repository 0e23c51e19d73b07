// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for the scan service.
//
// The scan service lives on the other side of an RPC boundary: it owns device
// I/O and image encoding. Requests return quickly; job progress arrives later
// on the `JobObserver` passed in when the job is started.

use async_trait::async_trait;

use scanwerk_core::error::Result;
use scanwerk_core::types::{PageHandle, ScanJobId, ScanSettings, ScannerCapabilities, ScannerInfo};

use crate::observer::JobObserver;

/// Requests the session engine can make of the scan service.
///
/// A returned `Err` means the service refused or could not receive the
/// request; nothing will be reported on the observer for it.
#[async_trait]
pub trait ScanBackend: Send + Sync {
    /// Human-readable backend name (e.g. "lorgnette", "simulated").
    fn backend_name(&self) -> &str;

    /// Enumerate the scanners currently reachable.
    async fn list_scanners(&self) -> Result<Vec<ScannerInfo>>;

    /// Query what a scanner supports.
    async fn scanner_capabilities(&self, scanner_id: &str) -> Result<ScannerCapabilities>;

    /// Start a single-shot scan. Progress, pages and the final result are
    /// pushed to `observer`.
    async fn start_scan(
        &self,
        scanner_id: &str,
        settings: &ScanSettings,
        observer: JobObserver,
    ) -> Result<ScanJobId>;

    /// Start a multi-page scan and scan its first page.
    ///
    /// The returned handle addresses every later request of the session.
    async fn start_multi_page_scan(
        &self,
        scanner_id: &str,
        settings: &ScanSettings,
        observer: JobObserver,
    ) -> Result<Box<dyn MultiPageScan>>;

    /// Ask the running job to stop. The outcome is reported through
    /// `JobObserver::on_cancel_complete`.
    async fn cancel_scan(&self) -> Result<()>;
}

/// Backend-issued handle to one in-progress multi-page session.
#[async_trait]
pub trait MultiPageScan: Send + Sync {
    fn job_id(&self) -> ScanJobId;

    /// Scan another page and append it to the document.
    async fn scan_next_page(&self, scanner_id: &str, settings: &ScanSettings) -> Result<()>;

    /// Scan a page again; the result replaces the page at `page_index`.
    async fn rescan_page(
        &self,
        scanner_id: &str,
        settings: &ScanSettings,
        page_index: usize,
    ) -> Result<()>;

    /// Drop the page at `page_index` from the backend's document.
    fn remove_page(&self, page_index: usize);

    /// Assemble the document; the produced file is reported via
    /// `JobObserver::on_scan_complete`.
    fn complete_multi_page_scan(&self);

    /// Abandon the session without producing a document.
    fn close(&self);
}

/// Owner of the externally allocated page images (object URLs, textures,
/// temp files) that the session refers to by `PageHandle`.
pub trait ImageStore: Send + Sync {
    /// Take ownership of encoded page bytes and hand back a handle to them.
    fn register(&self, data: Vec<u8>) -> PageHandle;

    /// Free the image behind `handle`. Each handle is released exactly once.
    fn release(&self, handle: PageHandle);
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk — Scan backend port.
//
// The traits here are the whole surface the session engine sees of the scan
// service: device listing, capabilities, job requests, the job observer
// channel, and the store that owns page images.

pub mod image_store;
pub mod observer;
pub mod simulated;
pub mod stub;
pub mod traits;

use std::sync::Arc;

pub use image_store::InMemoryImageStore;
pub use observer::{JobEvent, JobEvents, JobObserver, job_channel};
pub use simulated::{JobMode, SimulatedBackend};
pub use traits::{ImageStore, MultiPageScan, ScanBackend};

/// Which scan service the application talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// The host's scan service; falls back to the stub where none exists.
    Platform,
    /// The deterministic in-process service.
    Simulated,
}

/// Build the backend for `kind`.
pub fn scan_backend(kind: BackendKind) -> Arc<dyn ScanBackend> {
    match kind {
        // No native scan service is wired up yet; every host gets the stub.
        BackendKind::Platform => Arc::new(stub::StubBackend),
        BackendKind::Simulated => Arc::new(SimulatedBackend::new(JobMode::Immediate)),
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Deterministic in-process scan service.
//
// In `JobMode::Immediate` every accepted request plays out its whole job on
// the observer before returning (progress, page, completion). In
// `JobMode::Manual` requests are only recorded, and the caller delivers job
// events itself; cancel acknowledgements are still sent in both modes.
// Individual requests can be made to fail with `SimulatedFault`.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{
    ColorMode, PageSize, ScanJobId, ScanResult, ScanSettings, ScanSource, ScannerCapabilities,
    ScannerInfo, SourceType,
};

use crate::observer::JobObserver;
use crate::traits::{MultiPageScan, ScanBackend};

/// How accepted jobs produce their events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobMode {
    Immediate,
    Manual,
}

/// A request the simulated service can be told to reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimulatedFault {
    ListScanners,
    Capabilities,
    StartScan,
    StartMultiPageScan,
    ScanNextPage,
    RescanPage,
    CancelRequest,
}

/// A request as seen by the simulated service, for assertions in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    ListScanners,
    Capabilities(String),
    StartScan(String),
    StartMultiPageScan(String),
    ScanNextPage,
    RescanPage(usize),
    RemovePage(usize),
    CompleteMultiPageScan,
    CloseMultiPageScan,
    CancelScan,
}

#[derive(Debug)]
struct SimState {
    scanners: Vec<(ScannerInfo, ScannerCapabilities)>,
    mode: JobMode,
    faults: HashSet<SimulatedFault>,
    cancel_succeeds: bool,
    observer: Option<JobObserver>,
    calls: Vec<BackendCall>,
    page_serial: u64,
    /// Pages held by the active multi-page session.
    session_pages: usize,
}

impl SimState {
    fn fail_if(&self, fault: SimulatedFault) -> Result<()> {
        if self.faults.contains(&fault) {
            debug!(?fault, "simulated request rejected");
            return Err(ScanwerkError::RequestRejected(format!("{fault:?}")));
        }
        Ok(())
    }

    fn next_page_data(&mut self) -> Vec<u8> {
        self.page_serial += 1;
        format!("simulated page {}", self.page_serial).into_bytes()
    }
}

/// Play one page through progress to completion.
fn emit_page(observer: &JobObserver, page_number: u32, page_index: usize, data: Vec<u8>) {
    for percent in [0, 50, 100] {
        observer.on_page_progress(page_number, percent);
    }
    observer.on_page_complete(data, page_index);
}

/// In-process scan service with scripted behaviour.
#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    inner: Arc<Mutex<SimState>>,
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new(JobMode::Immediate)
    }
}

impl SimulatedBackend {
    /// A service exposing one flatbed+ADF scanner.
    pub fn new(mode: JobMode) -> Self {
        Self::with_scanners(
            mode,
            vec![(
                ScannerInfo {
                    id: "sim-0".into(),
                    display_name: "Simulated Scanner".into(),
                },
                Self::default_capabilities(),
            )],
        )
    }

    pub fn with_scanners(mode: JobMode, scanners: Vec<(ScannerInfo, ScannerCapabilities)>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimState {
                scanners,
                mode,
                faults: HashSet::new(),
                cancel_succeeds: true,
                observer: None,
                calls: Vec::new(),
                page_serial: 0,
                session_pages: 0,
            })),
        }
    }

    /// Flatbed and duplex feeder, colour/grey/mono, A4/Letter, 150–600 dpi.
    pub fn default_capabilities() -> ScannerCapabilities {
        let color_modes = vec![ColorMode::Color, ColorMode::Grayscale, ColorMode::BlackAndWhite];
        let page_sizes = vec![PageSize::IsoA4, PageSize::NaLetter, PageSize::Max];
        ScannerCapabilities {
            sources: vec![
                ScanSource {
                    source_type: SourceType::Flatbed,
                    name: "Flatbed".into(),
                    color_modes: color_modes.clone(),
                    page_sizes: page_sizes.clone(),
                    resolutions: vec![150, 300, 600],
                },
                ScanSource {
                    source_type: SourceType::AdfDuplex,
                    name: "ADF Duplex".into(),
                    color_modes,
                    page_sizes,
                    resolutions: vec![150, 300],
                },
            ],
        }
    }

    pub fn inject_fault(&self, fault: SimulatedFault) {
        self.lock().faults.insert(fault);
    }

    pub fn clear_fault(&self, fault: SimulatedFault) {
        self.lock().faults.remove(&fault);
    }

    /// Whether cancel requests are acknowledged as successful.
    pub fn set_cancel_succeeds(&self, succeeds: bool) {
        self.lock().cancel_succeeds = succeeds;
    }

    /// Requests received so far, oldest first.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.inner.lock().expect("simulated backend lock poisoned")
    }
}

#[async_trait]
impl ScanBackend for SimulatedBackend {
    fn backend_name(&self) -> &str {
        "simulated"
    }

    async fn list_scanners(&self) -> Result<Vec<ScannerInfo>> {
        let mut state = self.lock();
        state.calls.push(BackendCall::ListScanners);
        state.fail_if(SimulatedFault::ListScanners)?;
        Ok(state.scanners.iter().map(|(info, _)| info.clone()).collect())
    }

    async fn scanner_capabilities(&self, scanner_id: &str) -> Result<ScannerCapabilities> {
        let mut state = self.lock();
        state.calls.push(BackendCall::Capabilities(scanner_id.to_owned()));
        state.fail_if(SimulatedFault::Capabilities)?;
        state
            .scanners
            .iter()
            .find(|(info, _)| info.id == scanner_id)
            .map(|(_, caps)| caps.clone())
            .ok_or_else(|| ScanwerkError::ScannerNotFound(scanner_id.to_owned()))
    }

    #[instrument(skip_all, fields(scanner = %scanner_id))]
    async fn start_scan(
        &self,
        scanner_id: &str,
        settings: &ScanSettings,
        observer: JobObserver,
    ) -> Result<ScanJobId> {
        let mut state = self.lock();
        state.calls.push(BackendCall::StartScan(scanner_id.to_owned()));
        state.fail_if(SimulatedFault::StartScan)?;

        let job_id = ScanJobId::new();
        if state.mode == JobMode::Immediate {
            let data = state.next_page_data();
            emit_page(&observer, 1, 0, data);
            let path = PathBuf::from(format!("scan_{job_id}.{}", settings.file_type.extension()));
            observer.on_scan_complete(ScanResult::Success, vec![path]);
        }
        state.observer = Some(observer);
        info!(%job_id, "simulated scan started");
        Ok(job_id)
    }

    #[instrument(skip_all, fields(scanner = %scanner_id))]
    async fn start_multi_page_scan(
        &self,
        scanner_id: &str,
        _settings: &ScanSettings,
        observer: JobObserver,
    ) -> Result<Box<dyn MultiPageScan>> {
        let mut state = self.lock();
        state
            .calls
            .push(BackendCall::StartMultiPageScan(scanner_id.to_owned()));
        state.fail_if(SimulatedFault::StartMultiPageScan)?;

        state.session_pages = 0;
        if state.mode == JobMode::Immediate {
            let data = state.next_page_data();
            emit_page(&observer, 1, 0, data);
            state.session_pages = 1;
        }
        state.observer = Some(observer.clone());

        let job_id = ScanJobId::new();
        info!(%job_id, "simulated multi-page scan started");
        Ok(Box::new(SimulatedMultiPageScan {
            job_id,
            inner: Arc::clone(&self.inner),
            observer,
        }))
    }

    async fn cancel_scan(&self) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(BackendCall::CancelScan);
        state.fail_if(SimulatedFault::CancelRequest)?;
        let success = state.cancel_succeeds;
        if let Some(observer) = &state.observer {
            observer.on_cancel_complete(success);
        }
        Ok(())
    }
}

/// Multi-page handle issued by `SimulatedBackend`.
struct SimulatedMultiPageScan {
    job_id: ScanJobId,
    inner: Arc<Mutex<SimState>>,
    observer: JobObserver,
}

impl SimulatedMultiPageScan {
    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.inner.lock().expect("simulated backend lock poisoned")
    }
}

#[async_trait]
impl MultiPageScan for SimulatedMultiPageScan {
    fn job_id(&self) -> ScanJobId {
        self.job_id
    }

    async fn scan_next_page(&self, _scanner_id: &str, _settings: &ScanSettings) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(BackendCall::ScanNextPage);
        state.fail_if(SimulatedFault::ScanNextPage)?;
        if state.mode == JobMode::Immediate {
            let index = state.session_pages;
            let data = state.next_page_data();
            emit_page(&self.observer, index as u32 + 1, index, data);
            state.session_pages += 1;
        }
        Ok(())
    }

    async fn rescan_page(
        &self,
        _scanner_id: &str,
        _settings: &ScanSettings,
        page_index: usize,
    ) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(BackendCall::RescanPage(page_index));
        state.fail_if(SimulatedFault::RescanPage)?;
        if state.mode == JobMode::Immediate {
            let data = state.next_page_data();
            emit_page(&self.observer, page_index as u32 + 1, page_index, data);
        }
        Ok(())
    }

    fn remove_page(&self, page_index: usize) {
        let mut state = self.lock();
        state.calls.push(BackendCall::RemovePage(page_index));
        state.session_pages = state.session_pages.saturating_sub(1);
    }

    fn complete_multi_page_scan(&self) {
        let mut state = self.lock();
        state.calls.push(BackendCall::CompleteMultiPageScan);
        if state.mode == JobMode::Immediate {
            let path = PathBuf::from(format!("scan_{}.pdf", self.job_id));
            self.observer.on_scan_complete(ScanResult::Success, vec![path]);
        }
    }

    fn close(&self) {
        self.lock().calls.push(BackendCall::CloseMultiPageScan);
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Multi-page session sequencing.
//
// Only one page operation is ever outstanding: requests are accepted in
// `MultiPageNextAction` and the session sits in `MultiPageScanning` until the
// page lands. Backend refusals surface as notices and leave the state alone.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use scanwerk_bridge::{JobObserver, ScanBackend};
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{Notice, ScanResult, ScanSettings};

use crate::session::ScanSession;
use crate::state::AppState;

/// Drives the backend's per-session handle and keeps `ScanSession::pages`
/// in step with what the backend acknowledges.
pub struct MultiPageSessionController {
    backend: Arc<dyn ScanBackend>,
}

impl MultiPageSessionController {
    pub fn new(backend: Arc<dyn ScanBackend>) -> Self {
        Self { backend }
    }

    /// Open a multi-page session and scan its first page.
    ///
    /// `Ok(false)` when the backend refused; a notice has been shown.
    #[instrument(skip_all, fields(scanner = %scanner_id))]
    pub async fn start(
        &self,
        session: &mut ScanSession,
        scanner_id: &str,
        settings: &ScanSettings,
        observer: JobObserver,
    ) -> Result<bool> {
        require_state(session, "start multi-page scan", AppState::Ready)?;
        if !settings.supports_multi_page() {
            return Err(ScanwerkError::MultiPageUnsupported);
        }

        match self
            .backend
            .start_multi_page_scan(scanner_id, settings, observer)
            .await
        {
            Ok(handle) => {
                info!(job_id = %handle.job_id(), "multi-page scan started");
                session.set_multi_page(handle);
                session.request_transition(AppState::Scanning);
                session.set_page_number(1);
                session.set_progress(0);
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "start multi-page scan rejected");
                session.show_notice(Notice::StartMultiPageScanFailed);
                Ok(false)
            }
        }
    }

    /// Scan one more page onto the end of the document.
    #[instrument(skip_all, fields(scanner = %scanner_id))]
    pub async fn scan_next(
        &self,
        session: &mut ScanSession,
        scanner_id: &str,
        settings: &ScanSettings,
    ) -> Result<bool> {
        require_state(session, "scan next page", AppState::MultiPageNextAction)?;
        let outcome = session
            .multi_page()
            .ok_or(ScanwerkError::NoMultiPageSession)?
            .scan_next_page(scanner_id, settings)
            .await;

        match outcome {
            Ok(()) => {
                session.request_transition(AppState::MultiPageScanning);
                // Overwritten with the real page count when the page lands.
                session.set_page_number(session.page_number() + 1);
                session.set_progress(0);
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "scan next page rejected");
                session.show_notice(Notice::ScanNextPageFailed);
                Ok(false)
            }
        }
    }

    /// Scan the page at `index` again; the new image replaces it in place.
    ///
    /// # Panics
    ///
    /// If `index` is not a current page index.
    #[instrument(skip_all, fields(scanner = %scanner_id, index = index))]
    pub async fn rescan_page(
        &self,
        session: &mut ScanSession,
        scanner_id: &str,
        settings: &ScanSettings,
        index: usize,
    ) -> Result<bool> {
        require_state(session, "rescan page", AppState::MultiPageNextAction)?;
        assert_page_index(session, index);
        let outcome = session
            .multi_page()
            .ok_or(ScanwerkError::NoMultiPageSession)?
            .rescan_page(scanner_id, settings, index)
            .await;

        match outcome {
            Ok(()) => {
                session.set_progress(0);
                session.set_page_number(index as u32 + 1);
                session.request_transition(AppState::MultiPageScanning);
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, index, "rescan page rejected");
                session.show_notice(Notice::RescanPageFailed);
                Ok(false)
            }
        }
    }

    /// A page finished scanning at `index`.
    ///
    /// Appends when `index` is the page count, replaces otherwise. Inside a
    /// multi-page session this also hands control back to the user.
    pub fn on_page_complete(&self, session: &mut ScanSession, page_data: Vec<u8>, index: usize) {
        let state = session.state();
        if !state.is_scanning() {
            debug!(%state, index, "page completed outside a scan, discarded");
            return;
        }

        session.store_page(page_data, index);
        session.sync_page_number();

        if session.has_multi_page_session() {
            session.request_transition(AppState::MultiPageNextAction);
        }
    }

    /// Drop the page at `index`. Removing the last page ends the session.
    ///
    /// # Panics
    ///
    /// If `index` is not a current page index.
    pub fn remove_page(&self, session: &mut ScanSession, index: usize) -> Result<()> {
        require_state(session, "remove page", AppState::MultiPageNextAction)?;
        assert_page_index(session, index);
        session
            .multi_page()
            .ok_or(ScanwerkError::NoMultiPageSession)?
            .remove_page(index);

        session.remove_page(index);
        session.sync_page_number();

        if session.pages().is_empty() {
            info!("last page removed, ending multi-page session");
            if let Some(handle) = session.take_multi_page() {
                handle.close();
            }
            session.request_transition(AppState::Ready);
        }
        Ok(())
    }

    /// Ask the backend to assemble the document and let go of the handle.
    ///
    /// The session stays in `MultiPageNextAction`; moving on to `Done` is up
    /// to the caller.
    pub fn complete(&self, session: &mut ScanSession) -> Result<()> {
        require_state(session, "complete multi-page scan", AppState::MultiPageNextAction)?;
        let handle = session
            .take_multi_page()
            .ok_or(ScanwerkError::NoMultiPageSession)?;
        info!(job_id = %handle.job_id(), pages = session.pages().len(), "completing multi-page scan");
        handle.complete_multi_page_scan();
        Ok(())
    }

    /// Request cancellation of the running job, single-shot or multi-page.
    ///
    /// The outcome arrives later as a cancel acknowledgement. A request the
    /// backend could not even receive counts as a failed cancel.
    #[instrument(skip_all)]
    pub async fn cancel(&self, session: &mut ScanSession) -> Result<bool> {
        let canceling = match session.state() {
            AppState::Scanning => AppState::Canceling,
            AppState::MultiPageScanning => AppState::MultiPageCanceling,
            state => {
                return Err(ScanwerkError::NotAllowed {
                    operation: "cancel scan",
                    state: state.to_string(),
                });
            }
        };
        session.request_transition(canceling);

        match self.backend.cancel_scan().await {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(error = %e, "cancel request rejected");
                self.on_cancel_complete(session, false);
                Ok(false)
            }
        }
    }

    /// Backend answer to a cancel request.
    pub fn on_cancel_complete(&self, session: &mut ScanSession, success: bool) {
        match (session.state(), success) {
            (AppState::Canceling, true) => {
                if session.has_multi_page_session() && !session.pages().is_empty() {
                    session.sync_page_number();
                    session.request_transition(AppState::MultiPageNextAction);
                } else {
                    session.request_transition(AppState::Ready);
                }
            }
            (AppState::MultiPageCanceling, true) => {
                session.sync_page_number();
                session.request_transition(AppState::MultiPageNextAction);
            }
            (AppState::Canceling, false) => {
                session.request_transition(AppState::Scanning);
                session.show_notice(Notice::CancelFailed);
            }
            (AppState::MultiPageCanceling, false) => {
                session.request_transition(AppState::MultiPageScanning);
                session.show_notice(Notice::CancelFailed);
            }
            (state, _) => {
                debug!(%state, success, "stale cancel acknowledgement ignored");
            }
        }
    }

    /// A page of the multi-page session failed on the device.
    pub fn on_multi_page_scan_fail(&self, session: &mut ScanSession, result: ScanResult) {
        if !session.has_multi_page_session() {
            debug!(?result, "multi-page failure without a session, ignored");
            return;
        }
        session.show_failure(result);
    }
}

fn require_state(session: &ScanSession, operation: &'static str, expected: AppState) -> Result<()> {
    if session.state() != expected {
        return Err(ScanwerkError::NotAllowed {
            operation,
            state: session.state().to_string(),
        });
    }
    Ok(())
}

fn assert_page_index(session: &ScanSession, index: usize) {
    assert!(
        index < session.pages().len(),
        "page index {index} out of range (have {} pages)",
        session.pages().len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanwerk_bridge::simulated::{BackendCall, SimulatedFault};
    use scanwerk_bridge::{InMemoryImageStore, JobEvent, JobMode, SimulatedBackend, job_channel};
    use scanwerk_core::types::{ColorMode, FileType, PageSize, SourceType};

    const SCANNER: &str = "sim-0";

    fn flatbed_pdf() -> ScanSettings {
        ScanSettings {
            source_name: "Flatbed".into(),
            source_type: SourceType::Flatbed,
            file_type: FileType::Pdf,
            color_mode: ColorMode::Color,
            page_size: PageSize::IsoA4,
            resolution_dpi: 300,
        }
    }

    struct Fixture {
        sim: SimulatedBackend,
        images: Arc<InMemoryImageStore>,
        controller: MultiPageSessionController,
        session: ScanSession,
    }

    fn fixture() -> Fixture {
        let sim = SimulatedBackend::new(JobMode::Manual);
        let images = Arc::new(InMemoryImageStore::new());
        let mut session = ScanSession::new(images.clone());
        session.request_transition(AppState::GotScanners);
        session.request_transition(AppState::GettingCapabilities);
        session.request_transition(AppState::Ready);
        Fixture {
            controller: MultiPageSessionController::new(Arc::new(sim.clone())),
            sim,
            images,
            session,
        }
    }

    /// Start a session and land `pages` pages, ending in `MultiPageNextAction`.
    async fn with_pages(f: &mut Fixture, pages: usize) {
        let (observer, _events) = job_channel();
        assert!(
            f.controller
                .start(&mut f.session, SCANNER, &flatbed_pdf(), observer)
                .await
                .expect("start")
        );
        f.controller.on_page_complete(&mut f.session, vec![0], 0);
        for i in 1..pages {
            assert!(
                f.controller
                    .scan_next(&mut f.session, SCANNER, &flatbed_pdf())
                    .await
                    .expect("next")
            );
            f.controller.on_page_complete(&mut f.session, vec![i as u8], i);
        }
        assert_eq!(f.session.state(), AppState::MultiPageNextAction);
    }

    #[tokio::test]
    async fn start_opens_session_in_scanning() {
        let mut f = fixture();
        let (observer, _events) = job_channel();
        let started = f
            .controller
            .start(&mut f.session, SCANNER, &flatbed_pdf(), observer)
            .await
            .expect("start");

        assert!(started);
        assert_eq!(f.session.state(), AppState::Scanning);
        assert!(f.session.has_multi_page_session());
        assert_eq!(f.session.page_number(), 1);
        assert_eq!(f.session.progress_percent(), 0);
    }

    #[tokio::test]
    async fn rejected_start_shows_notice_and_stays_ready() {
        let mut f = fixture();
        f.sim.inject_fault(SimulatedFault::StartMultiPageScan);
        let (observer, _events) = job_channel();
        let started = f
            .controller
            .start(&mut f.session, SCANNER, &flatbed_pdf(), observer)
            .await
            .expect("start");

        assert!(!started);
        assert_eq!(f.session.state(), AppState::Ready);
        assert!(!f.session.has_multi_page_session());
        assert_eq!(f.session.take_notice(), Some(Notice::StartMultiPageScanFailed));
    }

    #[tokio::test]
    async fn feeder_sources_cannot_start_a_session() {
        let mut f = fixture();
        let mut settings = flatbed_pdf();
        settings.source_type = SourceType::AdfDuplex;
        let (observer, _events) = job_channel();
        let result = f
            .controller
            .start(&mut f.session, SCANNER, &settings, observer)
            .await;
        assert!(matches!(result, Err(ScanwerkError::MultiPageUnsupported)));
    }

    #[tokio::test]
    async fn next_page_goes_through_multi_page_scanning() {
        let mut f = fixture();
        with_pages(&mut f, 1).await;

        f.controller
            .scan_next(&mut f.session, SCANNER, &flatbed_pdf())
            .await
            .expect("next");
        assert_eq!(f.session.state(), AppState::MultiPageScanning);
        assert_eq!(f.session.page_number(), 2);

        f.controller.on_page_complete(&mut f.session, vec![1], 1);
        assert_eq!(f.session.state(), AppState::MultiPageNextAction);
        assert_eq!(f.session.pages().len(), 2);
        assert_eq!(f.session.page_number(), 2);
    }

    #[tokio::test]
    async fn second_request_while_scanning_is_refused() {
        let mut f = fixture();
        with_pages(&mut f, 1).await;
        f.controller
            .scan_next(&mut f.session, SCANNER, &flatbed_pdf())
            .await
            .expect("next");

        let again = f
            .controller
            .scan_next(&mut f.session, SCANNER, &flatbed_pdf())
            .await;
        assert!(matches!(again, Err(ScanwerkError::NotAllowed { .. })));
        let calls = f.sim.calls();
        let nexts = calls.iter().filter(|c| **c == BackendCall::ScanNextPage).count();
        assert_eq!(nexts, 1);
    }

    #[tokio::test]
    async fn rejected_next_page_keeps_state() {
        let mut f = fixture();
        with_pages(&mut f, 2).await;
        f.sim.inject_fault(SimulatedFault::ScanNextPage);

        let accepted = f
            .controller
            .scan_next(&mut f.session, SCANNER, &flatbed_pdf())
            .await
            .expect("next");
        assert!(!accepted);
        assert_eq!(f.session.state(), AppState::MultiPageNextAction);
        assert_eq!(f.session.page_number(), 2);
        assert_eq!(f.session.take_notice(), Some(Notice::ScanNextPageFailed));
    }

    #[tokio::test]
    async fn rescan_replaces_in_place() {
        let mut f = fixture();
        with_pages(&mut f, 3).await;
        let before = f.session.pages().to_vec();

        f.controller
            .rescan_page(&mut f.session, SCANNER, &flatbed_pdf(), 1)
            .await
            .expect("rescan");
        assert_eq!(f.session.state(), AppState::MultiPageScanning);
        assert_eq!(f.session.page_number(), 2);
        assert_eq!(f.session.progress_percent(), 0);

        f.controller.on_page_complete(&mut f.session, vec![42], 1);
        let after = f.session.pages();
        assert_eq!(after.len(), 3);
        assert_eq!(after[0], before[0]);
        assert_eq!(after[2], before[2]);
        assert_ne!(after[1], before[1]);
        assert_eq!(f.images.get(after[1]), Some(vec![42]));
        assert_eq!(f.images.release_count(before[1]), 1);
        assert_eq!(f.session.page_number(), 3);
    }

    #[tokio::test]
    #[should_panic(expected = "out of range")]
    async fn rescan_past_the_end_panics() {
        let mut f = fixture();
        with_pages(&mut f, 2).await;
        let _ = f
            .controller
            .rescan_page(&mut f.session, SCANNER, &flatbed_pdf(), 2)
            .await;
    }

    #[tokio::test]
    async fn remove_middle_page_keeps_session() {
        let mut f = fixture();
        with_pages(&mut f, 3).await;
        let pages = f.session.pages().to_vec();

        f.controller.remove_page(&mut f.session, 1).expect("remove");
        assert_eq!(f.session.pages(), &[pages[0], pages[2]]);
        assert_eq!(f.session.page_number(), 2);
        assert_eq!(f.session.state(), AppState::MultiPageNextAction);
        assert!(f.sim.calls().contains(&BackendCall::RemovePage(1)));
    }

    #[tokio::test]
    async fn removing_only_page_ends_session() {
        let mut f = fixture();
        with_pages(&mut f, 1).await;
        let page = f.session.pages()[0];

        f.controller.remove_page(&mut f.session, 0).expect("remove");
        assert_eq!(f.session.state(), AppState::Ready);
        assert!(!f.session.has_multi_page_session());
        assert!(f.session.pages().is_empty());
        assert_eq!(f.images.release_count(page), 1);
        assert!(f.sim.calls().contains(&BackendCall::CloseMultiPageScan));
    }

    #[tokio::test]
    async fn complete_releases_handle_without_closing() {
        let mut f = fixture();
        with_pages(&mut f, 2).await;

        f.controller.complete(&mut f.session).expect("complete");
        assert!(!f.session.has_multi_page_session());
        assert_eq!(f.session.state(), AppState::MultiPageNextAction);
        let calls = f.sim.calls();
        assert!(calls.contains(&BackendCall::CompleteMultiPageScan));
        assert!(!calls.contains(&BackendCall::CloseMultiPageScan));
    }

    #[tokio::test]
    async fn cancel_mid_session_returns_to_next_action() {
        let mut f = fixture();
        let (observer, mut events) = job_channel();
        f.controller
            .start(&mut f.session, SCANNER, &flatbed_pdf(), observer)
            .await
            .expect("start");
        f.controller.on_page_complete(&mut f.session, vec![0], 0);
        f.controller
            .scan_next(&mut f.session, SCANNER, &flatbed_pdf())
            .await
            .expect("next");

        assert!(f.controller.cancel(&mut f.session).await.expect("cancel"));
        assert_eq!(f.session.state(), AppState::MultiPageCanceling);

        assert_eq!(events.try_next(), Some(JobEvent::CancelComplete { success: true }));
        f.controller.on_cancel_complete(&mut f.session, true);
        assert_eq!(f.session.state(), AppState::MultiPageNextAction);
        assert_eq!(f.session.page_number(), 1);
    }

    #[tokio::test]
    async fn failed_cancel_reverts_to_multi_page_scanning() {
        let mut f = fixture();
        with_pages(&mut f, 1).await;
        f.controller
            .scan_next(&mut f.session, SCANNER, &flatbed_pdf())
            .await
            .expect("next");
        f.controller.cancel(&mut f.session).await.expect("cancel");

        f.controller.on_cancel_complete(&mut f.session, false);
        assert_eq!(f.session.state(), AppState::MultiPageScanning);
        assert_eq!(f.session.take_notice(), Some(Notice::CancelFailed));
    }

    #[tokio::test]
    async fn cancel_during_first_page_abandons_session() {
        let mut f = fixture();
        let (observer, _events) = job_channel();
        f.controller
            .start(&mut f.session, SCANNER, &flatbed_pdf(), observer)
            .await
            .expect("start");
        f.controller.cancel(&mut f.session).await.expect("cancel");
        assert_eq!(f.session.state(), AppState::Canceling);

        f.controller.on_cancel_complete(&mut f.session, true);
        assert_eq!(f.session.state(), AppState::Ready);
        assert!(!f.session.has_multi_page_session());
    }

    #[tokio::test]
    async fn unreachable_cancel_counts_as_failed() {
        let mut f = fixture();
        with_pages(&mut f, 1).await;
        f.controller
            .scan_next(&mut f.session, SCANNER, &flatbed_pdf())
            .await
            .expect("next");
        f.sim.inject_fault(SimulatedFault::CancelRequest);

        let sent = f.controller.cancel(&mut f.session).await.expect("cancel");
        assert!(!sent);
        assert_eq!(f.session.state(), AppState::MultiPageScanning);
        assert_eq!(f.session.take_notice(), Some(Notice::CancelFailed));
    }

    #[tokio::test]
    async fn stale_cancel_ack_is_ignored() {
        let mut f = fixture();
        with_pages(&mut f, 1).await;
        f.controller.on_cancel_complete(&mut f.session, true);
        assert_eq!(f.session.state(), AppState::MultiPageNextAction);
    }

    #[tokio::test]
    async fn page_failure_raises_dialog_without_transition() {
        let mut f = fixture();
        with_pages(&mut f, 1).await;
        f.controller
            .scan_next(&mut f.session, SCANNER, &flatbed_pdf())
            .await
            .expect("next");

        f.controller
            .on_multi_page_scan_fail(&mut f.session, ScanResult::AdfJammed);
        assert_eq!(f.session.state(), AppState::MultiPageScanning);
        assert_eq!(
            f.session.failure().map(|failure| failure.result),
            Some(ScanResult::AdfJammed)
        );
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Top-level scan controller.
//
// Owns the `ScanSession` and everything the session needs around it: the
// backend, the discovered scanners, the chosen settings, the saved settings
// and the job event queue. Every user action and every backend event enters
// here and is applied to the session one at a time.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use scanwerk_bridge::{ImageStore, JobEvent, JobEvents, JobObserver, ScanBackend, job_channel};
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{
    Notice, ScanResult, ScanSettings, ScannerCapabilities, ScannerInfo,
};
use scanwerk_core::{AppConfig, SavedScanSettings};

use crate::multi_page::MultiPageSessionController;
use crate::presenter::PreviewPresenter;
use crate::restore::{Correction, default_settings, restore_settings};
use crate::session::{ScanFailure, ScanSession};
use crate::state::AppState;

pub struct ScanController {
    backend: Arc<dyn ScanBackend>,
    session: ScanSession,
    multi_page: MultiPageSessionController,
    presenter: PreviewPresenter,
    config: AppConfig,
    saved: SavedScanSettings,

    scanners: Vec<ScannerInfo>,
    selected: Option<ScannerInfo>,
    capabilities: Option<ScannerCapabilities>,
    settings: Option<ScanSettings>,
    multi_page_checked: bool,
    corrections: Vec<Correction>,
    setting_changes: u32,

    observer: JobObserver,
    events: JobEvents,
}

impl ScanController {
    pub fn new(
        backend: Arc<dyn ScanBackend>,
        images: Arc<dyn ImageStore>,
        config: AppConfig,
        saved: SavedScanSettings,
    ) -> Self {
        let (observer, events) = job_channel();
        info!(backend = backend.backend_name(), "scan controller created");
        Self {
            multi_page: MultiPageSessionController::new(Arc::clone(&backend)),
            backend,
            session: ScanSession::new(images),
            presenter: PreviewPresenter::new(),
            config,
            saved,
            scanners: Vec::new(),
            selected: None,
            capabilities: None,
            settings: None,
            multi_page_checked: false,
            corrections: Vec::new(),
            setting_changes: 0,
            observer,
            events,
        }
    }

    // -- Accessors -----------------------------------------------------------

    pub fn state(&self) -> AppState {
        self.session.state()
    }

    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    pub fn presenter(&self) -> &PreviewPresenter {
        &self.presenter
    }

    /// For feeding scroll, resize and image-load events from the view.
    pub fn presenter_mut(&mut self) -> &mut PreviewPresenter {
        &mut self.presenter
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn saved_settings(&self) -> &SavedScanSettings {
        &self.saved
    }

    /// Discovered scanners, sorted by display name.
    pub fn scanners(&self) -> &[ScannerInfo] {
        &self.scanners
    }

    pub fn selected_scanner(&self) -> Option<&ScannerInfo> {
        self.selected.as_ref()
    }

    pub fn capabilities(&self) -> Option<&ScannerCapabilities> {
        self.capabilities.as_ref()
    }

    pub fn settings(&self) -> Option<&ScanSettings> {
        self.settings.as_ref()
    }

    pub fn multi_page_checked(&self) -> bool {
        self.multi_page_checked
    }

    /// Saved values that had to be adjusted when the current scanner's
    /// settings were restored.
    pub fn corrections(&self) -> &[Correction] {
        &self.corrections
    }

    /// Settings the user changed since the scanner was selected, counting a
    /// switch of scanner as one.
    pub fn setting_changes(&self) -> u32 {
        self.setting_changes
    }

    /// Hand the pending notice to the presentation layer.
    pub fn take_notice(&mut self) -> Option<Notice> {
        self.session.take_notice()
    }

    /// Another sender into this controller's job event queue.
    pub fn observer(&self) -> JobObserver {
        self.observer.clone()
    }

    // -- Setup ---------------------------------------------------------------

    /// List scanners and select the default one.
    ///
    /// Allowed at startup and again from `NoScanners` to retry.
    #[instrument(skip_all)]
    pub async fn discover_scanners(&mut self) -> Result<()> {
        match self.session.state() {
            AppState::GettingScanners => {}
            AppState::NoScanners => self.session.request_transition(AppState::GettingScanners),
            state => {
                return Err(ScanwerkError::NotAllowed {
                    operation: "discover scanners",
                    state: state.to_string(),
                });
            }
        }

        let mut scanners = match self.backend.list_scanners().await {
            Ok(scanners) => scanners,
            Err(e) => {
                warn!(error = %e, "scanner discovery failed");
                Vec::new()
            }
        };
        if scanners.is_empty() {
            info!("no scanners found");
            self.scanners.clear();
            self.session.request_transition(AppState::NoScanners);
            return Ok(());
        }

        scanners.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        info!(count = scanners.len(), "scanners discovered");
        self.scanners = scanners;
        self.session.request_transition(AppState::GotScanners);

        let default_id = self.default_scanner_id();
        self.select_scanner(&default_id).await
    }

    /// Last-used scanner if it is still around, else the first one.
    fn default_scanner_id(&self) -> String {
        let last_used = self.saved.last_used_scanner.as_deref();
        self.scanners
            .iter()
            .find(|s| Some(s.display_name.as_str()) == last_used)
            .or_else(|| self.scanners.first())
            .map(|s| s.id.clone())
            .unwrap_or_default()
    }

    /// Switch to `scanner_id`, fetch its capabilities and settle its settings.
    #[instrument(skip_all, fields(scanner = %scanner_id))]
    pub async fn select_scanner(&mut self, scanner_id: &str) -> Result<()> {
        let state = self.session.state();
        if !matches!(state, AppState::GotScanners | AppState::Ready) {
            return Err(ScanwerkError::NotAllowed {
                operation: "select scanner",
                state: state.to_string(),
            });
        }
        let scanner = self
            .scanners
            .iter()
            .find(|s| s.id == scanner_id)
            .cloned()
            .ok_or_else(|| ScanwerkError::ScannerNotFound(scanner_id.to_owned()))?;

        let switched = self.selected.as_ref().is_some_and(|s| s.id != scanner.id);
        self.setting_changes = u32::from(switched);

        self.session.request_transition(AppState::GettingCapabilities);
        self.capabilities = None;
        self.settings = None;
        self.multi_page_checked = false;
        self.corrections.clear();

        match self.backend.scanner_capabilities(&scanner.id).await {
            Ok(caps) if !caps.is_empty() => self.apply_capabilities(&scanner, caps),
            Ok(_) => {
                warn!(scanner = %scanner.display_name, "scanner reported no sources");
                self.session.show_notice(Notice::CapabilitiesFailed);
                self.session.request_transition(AppState::Ready);
            }
            Err(e) => {
                warn!(scanner = %scanner.display_name, error = %e, "capabilities request failed");
                self.session.show_notice(Notice::CapabilitiesFailed);
                self.session.request_transition(AppState::Ready);
            }
        }
        self.selected = Some(scanner);
        Ok(())
    }

    fn apply_capabilities(&mut self, scanner: &ScannerInfo, caps: ScannerCapabilities) {
        let saved = self
            .config
            .restore_saved_settings
            .then(|| self.saved.for_scanner(&scanner.display_name).cloned())
            .flatten();

        match saved {
            Some(saved) => {
                self.session.request_transition(AppState::RestoringSavedSettings);
                match restore_settings(&caps, &saved, &self.config) {
                    Some(restored) => {
                        self.settings = Some(restored.settings);
                        self.multi_page_checked = restored.multi_page_scan_checked;
                        self.corrections = restored.corrections;
                    }
                    None => self.settings = default_settings(&caps, &self.config),
                }
            }
            None => self.settings = default_settings(&caps, &self.config),
        }
        self.capabilities = Some(caps);
        self.session.request_transition(AppState::Ready);
    }

    /// Replace the scan settings. Multi-page mode is switched off when the
    /// new settings cannot produce a multi-page document.
    pub fn set_settings(&mut self, settings: ScanSettings) -> Result<()> {
        self.require_ready("change settings")?;
        if self.capabilities.is_none() {
            return Err(ScanwerkError::CapabilitiesUnavailable);
        }
        if self.multi_page_checked && !settings.supports_multi_page() {
            debug!("multi-page mode switched off by settings change");
            self.multi_page_checked = false;
        }
        if let Some(current) = &self.settings {
            self.setting_changes += changed_fields(current, &settings);
        }
        self.settings = Some(settings);
        Ok(())
    }

    pub fn set_multi_page_checked(&mut self, checked: bool) -> Result<()> {
        self.require_ready("toggle multi-page mode")?;
        if checked {
            let settings = self
                .settings
                .as_ref()
                .ok_or(ScanwerkError::CapabilitiesUnavailable)?;
            if !settings.supports_multi_page() {
                return Err(ScanwerkError::MultiPageUnsupported);
            }
        }
        self.multi_page_checked = checked;
        Ok(())
    }

    // -- Scanning ------------------------------------------------------------

    /// Start a scan with the current settings; multi-page when checked.
    ///
    /// `Ok(false)` when the backend refused the request.
    #[instrument(skip_all)]
    pub async fn start_scan(&mut self) -> Result<bool> {
        self.require_ready("start scan")?;
        let scanner_id = self
            .selected
            .as_ref()
            .map(|s| s.id.clone())
            .ok_or(ScanwerkError::NoScannerSelected)?;
        let settings = self
            .settings
            .clone()
            .ok_or(ScanwerkError::CapabilitiesUnavailable)?;

        self.session.set_last_scanned_paths(Vec::new());

        let accepted = if self.multi_page_checked {
            self.multi_page
                .start(&mut self.session, &scanner_id, &settings, self.observer.clone())
                .await?
        } else {
            match self
                .backend
                .start_scan(&scanner_id, &settings, self.observer.clone())
                .await
            {
                Ok(job_id) => {
                    info!(%job_id, "scan started");
                    self.session.request_transition(AppState::Scanning);
                    self.session.set_page_number(1);
                    self.session.set_progress(0);
                    true
                }
                Err(e) => {
                    warn!(error = %e, "start scan rejected");
                    self.session.show_notice(Notice::StartScanFailed);
                    false
                }
            }
        };

        if accepted {
            info!(
                setting_changes = self.setting_changes,
                multi_page = self.multi_page_checked,
                "scan requested"
            );
            self.record_settings();
        }
        Ok(accepted)
    }

    pub async fn scan_next_page(&mut self) -> Result<bool> {
        let (scanner_id, settings) = self.job_target()?;
        self.multi_page
            .scan_next(&mut self.session, &scanner_id, &settings)
            .await
    }

    /// # Panics
    ///
    /// If `index` is not a current page index.
    pub async fn rescan_page(&mut self, index: usize) -> Result<bool> {
        let (scanner_id, settings) = self.job_target()?;
        self.multi_page
            .rescan_page(&mut self.session, &scanner_id, &settings, index)
            .await
    }

    /// # Panics
    ///
    /// If `index` is not a current page index.
    pub fn remove_page(&mut self, index: usize) -> Result<()> {
        self.multi_page.remove_page(&mut self.session, index)?;
        self.sync_presenter();
        Ok(())
    }

    /// Finish the multi-page document and move to `Done`.
    pub fn complete_multi_page_scan(&mut self) -> Result<()> {
        self.multi_page.complete(&mut self.session)?;
        self.session.request_transition(AppState::Done);
        Ok(())
    }

    pub async fn cancel_scan(&mut self) -> Result<bool> {
        let sent = self.multi_page.cancel(&mut self.session).await?;
        self.sync_presenter();
        Ok(sent)
    }

    /// Close the failure dialog and return to wherever the user can act:
    /// the page review if pages were kept, `Ready` otherwise.
    pub fn dismiss_failure(&mut self) -> Option<ScanFailure> {
        let failure = self.session.take_failure()?;
        let target = if self.session.has_multi_page_session() && !self.session.pages().is_empty() {
            AppState::MultiPageNextAction
        } else {
            AppState::Ready
        };

        if self.session.state() != target {
            match self.session.try_transition(target) {
                Ok(()) if target == AppState::MultiPageNextAction => self.session.sync_page_number(),
                Ok(()) => {}
                Err(e) => warn!(error = %e, "failure dismissed without state change"),
            }
        }
        self.sync_presenter();
        Some(failure)
    }

    /// Leave `Done` for another scan.
    pub fn return_to_ready(&mut self) -> Result<()> {
        if self.session.state() != AppState::Done {
            return Err(ScanwerkError::NotAllowed {
                operation: "scan again",
                state: self.session.state().to_string(),
            });
        }
        self.session.request_transition(AppState::Ready);
        self.session.set_last_scanned_paths(Vec::new());
        self.sync_presenter();
        Ok(())
    }

    // -- Job events ----------------------------------------------------------

    /// Apply every queued job event. Returns how many were handled.
    pub fn pump_events(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.events.try_next() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Wait for the next job event and apply it.
    ///
    /// The controller holds a sender itself, so this only returns `false`
    /// if the queue has been closed.
    pub async fn next_event(&mut self) -> bool {
        match self.events.next().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    pub fn handle_event(&mut self, event: JobEvent) {
        match event {
            JobEvent::PageProgress {
                page_number,
                progress_percent,
            } => self.on_page_progress(page_number, progress_percent),
            JobEvent::PageComplete {
                page_data,
                page_index,
            } => {
                self.multi_page
                    .on_page_complete(&mut self.session, page_data, page_index);
            }
            JobEvent::ScanComplete {
                result,
                scanned_file_paths,
            } => self.on_scan_complete(result, scanned_file_paths),
            JobEvent::CancelComplete { success } => {
                self.multi_page.on_cancel_complete(&mut self.session, success);
            }
            JobEvent::MultiPageScanFail { result } => {
                self.multi_page
                    .on_multi_page_scan_fail(&mut self.session, result);
            }
        }
        self.sync_presenter();
    }

    fn on_page_progress(&mut self, page_number: u32, progress_percent: u8) {
        let state = self.session.state();
        if !state.is_scanning() {
            debug!(%state, page_number, "progress outside a scan ignored");
            return;
        }
        // The backend's page counter does not know about removed pages.
        if !self.session.has_multi_page_session() {
            self.session.set_page_number(page_number);
        }
        self.session.set_progress(progress_percent);
    }

    fn on_scan_complete(&mut self, result: ScanResult, paths: Vec<PathBuf>) {
        // The cancel acknowledgement settles the state.
        if result == ScanResult::Cancelled {
            debug!(state = %self.session.state(), "cancelled job completion ignored");
            return;
        }
        if !result.is_success() || paths.is_empty() || self.session.pages().is_empty() {
            let result = if result.is_success() {
                ScanResult::UnknownError
            } else {
                result
            };
            self.session.show_failure(result);
            return;
        }

        match self.session.state() {
            AppState::Scanning | AppState::Canceling if !self.session.has_multi_page_session() => {
                self.session.request_transition(AppState::Done);
            }
            AppState::Done => {}
            state => {
                debug!(%state, "scan completion outside a finishing job ignored");
                return;
            }
        }

        info!(files = paths.len(), pages = self.session.pages().len(), "scan complete");
        self.session.set_last_scanned_paths(paths);
    }

    fn record_settings(&mut self) {
        let (Some(scanner), Some(settings)) = (&self.selected, &self.settings) else {
            return;
        };
        self.saved.record_scan(
            &scanner.display_name,
            settings,
            self.multi_page_checked,
            Utc::now(),
            self.config.max_saved_scanners,
        );
    }

    // -- Helpers -------------------------------------------------------------

    fn require_ready(&self, operation: &'static str) -> Result<()> {
        if self.session.state() != AppState::Ready {
            return Err(ScanwerkError::NotAllowed {
                operation,
                state: self.session.state().to_string(),
            });
        }
        Ok(())
    }

    fn job_target(&self) -> Result<(String, ScanSettings)> {
        let scanner = self.selected.as_ref().ok_or(ScanwerkError::NoScannerSelected)?;
        let settings = self
            .settings
            .clone()
            .ok_or(ScanwerkError::CapabilitiesUnavailable)?;
        Ok((scanner.id.clone(), settings))
    }

    fn sync_presenter(&mut self) {
        self.presenter.on_pages_changed(self.session.pages().len());
    }
}

/// Number of individual settings that differ between `a` and `b`.
fn changed_fields(a: &ScanSettings, b: &ScanSettings) -> u32 {
    [
        a.source_name != b.source_name,
        a.file_type != b.file_type,
        a.color_mode != b.color_mode,
        a.page_size != b.page_size,
        a.resolution_dpi != b.resolution_dpi,
    ]
    .into_iter()
    .map(u32::from)
    .sum()
}

impl std::fmt::Debug for ScanController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanController")
            .field("backend", &self.backend.backend_name())
            .field("session", &self.session)
            .field("selected", &self.selected)
            .field("settings", &self.settings)
            .field("multi_page_checked", &self.multi_page_checked)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use scanwerk_bridge::simulated::{BackendCall, SimulatedFault};
    use scanwerk_bridge::{InMemoryImageStore, JobMode, SimulatedBackend};
    use scanwerk_core::ScannerSetting;
    use scanwerk_core::types::{ColorMode, FileType, PageHandle, PageSize, SourceType};

    use crate::presenter::PreviewContent;

    fn controller_with(
        sim: &SimulatedBackend,
        saved: SavedScanSettings,
    ) -> (ScanController, Arc<InMemoryImageStore>) {
        let images = Arc::new(InMemoryImageStore::new());
        let controller = ScanController::new(
            Arc::new(sim.clone()),
            images.clone(),
            AppConfig::default(),
            saved,
        );
        (controller, images)
    }

    async fn ready(sim: &SimulatedBackend) -> (ScanController, Arc<InMemoryImageStore>) {
        let (mut controller, images) = controller_with(sim, SavedScanSettings::default());
        controller.discover_scanners().await.expect("discover");
        assert_eq!(controller.state(), AppState::Ready);
        (controller, images)
    }

    fn scanner(id: &str, name: &str) -> (ScannerInfo, ScannerCapabilities) {
        (
            ScannerInfo {
                id: id.into(),
                display_name: name.into(),
            },
            SimulatedBackend::default_capabilities(),
        )
    }

    /// Deliver one page as the backend would.
    fn land_page(controller: &mut ScanController, index: usize, byte: u8) {
        let observer = controller.observer();
        observer.on_page_progress(index as u32 + 1, 100);
        observer.on_page_complete(vec![byte], index);
        controller.pump_events();
    }

    /// Multi-page session with `pages` pages, sitting in `MultiPageNextAction`.
    async fn multi_page_with(controller: &mut ScanController, pages: usize) {
        controller.set_multi_page_checked(true).expect("multi-page");
        assert!(controller.start_scan().await.expect("start"));
        land_page(controller, 0, 0);
        for i in 1..pages {
            assert!(controller.scan_next_page().await.expect("next"));
            land_page(controller, i, i as u8);
        }
        assert_eq!(controller.state(), AppState::MultiPageNextAction);
        assert_eq!(controller.session().pages().len(), pages);
    }

    fn assert_all_released(images: &InMemoryImageStore) {
        assert!(images.live_handles().is_empty(), "leaked: {:?}", images.live_handles());
        for raw in 0..images.registered_count() {
            assert_eq!(images.release_count(PageHandle(raw)), 1, "page#{raw}");
        }
    }

    #[tokio::test]
    async fn discovery_selects_scanner_and_defaults() {
        let sim = SimulatedBackend::new(JobMode::Manual);
        let (controller, _images) = ready(&sim).await;

        assert_eq!(controller.selected_scanner().map(|s| s.id.as_str()), Some("sim-0"));
        let settings = controller.settings().expect("settings");
        assert_eq!(settings.source_type, SourceType::Flatbed);
        assert_eq!(settings.resolution_dpi, 300);
        assert!(!controller.multi_page_checked());
        assert_eq!(
            sim.calls(),
            vec![BackendCall::ListScanners, BackendCall::Capabilities("sim-0".into())]
        );
    }

    #[tokio::test]
    async fn no_scanners_then_retry() {
        let sim = SimulatedBackend::with_scanners(JobMode::Manual, Vec::new());
        let (mut controller, _images) = controller_with(&sim, SavedScanSettings::default());

        controller.discover_scanners().await.expect("discover");
        assert_eq!(controller.state(), AppState::NoScanners);
        assert_eq!(controller.presenter().content(controller.state()), PreviewContent::HelperText);

        controller.discover_scanners().await.expect("retry");
        assert_eq!(controller.state(), AppState::NoScanners);
        assert_eq!(sim.calls().len(), 2);
    }

    #[tokio::test]
    async fn failed_listing_means_no_scanners() {
        let sim = SimulatedBackend::new(JobMode::Manual);
        sim.inject_fault(SimulatedFault::ListScanners);
        let (mut controller, _images) = controller_with(&sim, SavedScanSettings::default());
        controller.discover_scanners().await.expect("discover");
        assert_eq!(controller.state(), AppState::NoScanners);
    }

    #[tokio::test]
    async fn scanners_sorted_and_last_used_preferred() {
        let sim = SimulatedBackend::with_scanners(
            JobMode::Manual,
            vec![scanner("b", "Basement"), scanner("a", "Attic"), scanner("c", "Cellar")],
        );
        let saved = SavedScanSettings {
            last_used_scanner: Some("Cellar".into()),
            scanners: Vec::new(),
        };
        let (mut controller, _images) = controller_with(&sim, saved);
        controller.discover_scanners().await.expect("discover");

        let names: Vec<_> = controller.scanners().iter().map(|s| s.display_name.as_str()).collect();
        assert_eq!(names, vec!["Attic", "Basement", "Cellar"]);
        assert_eq!(controller.selected_scanner().map(|s| s.id.as_str()), Some("c"));
    }

    #[tokio::test]
    async fn capabilities_failure_leaves_ready_without_settings() {
        let sim = SimulatedBackend::new(JobMode::Manual);
        sim.inject_fault(SimulatedFault::Capabilities);
        let (mut controller, _images) = controller_with(&sim, SavedScanSettings::default());
        controller.discover_scanners().await.expect("discover");

        assert_eq!(controller.state(), AppState::Ready);
        assert!(controller.capabilities().is_none());
        assert_eq!(controller.session().notice(), Some(Notice::CapabilitiesFailed));
        assert!(matches!(
            controller.start_scan().await,
            Err(ScanwerkError::CapabilitiesUnavailable)
        ));
    }

    #[tokio::test]
    async fn saved_settings_are_restored_on_selection() {
        let sim = SimulatedBackend::new(JobMode::Manual);
        let saved = SavedScanSettings {
            last_used_scanner: Some("Simulated Scanner".into()),
            scanners: vec![ScannerSetting {
                name: "Simulated Scanner".into(),
                last_scan_date: Utc::now() - Duration::days(1),
                source_name: "Flatbed".into(),
                file_type: FileType::Pdf,
                color_mode: ColorMode::Grayscale,
                page_size: PageSize::IsoA4,
                resolution_dpi: 1200,
                multi_page_scan_checked: true,
            }],
        };
        let (mut controller, _images) = controller_with(&sim, saved);
        controller.discover_scanners().await.expect("discover");

        let settings = controller.settings().expect("settings");
        assert_eq!(settings.color_mode, ColorMode::Grayscale);
        assert_eq!(settings.page_size, PageSize::IsoA4);
        assert_eq!(settings.resolution_dpi, 300);
        assert!(controller.multi_page_checked());
        assert_eq!(controller.corrections().len(), 1);
        assert_eq!(controller.corrections()[0].field, "Resolution");
    }

    #[tokio::test]
    async fn multi_page_needs_flatbed_pdf() {
        let sim = SimulatedBackend::new(JobMode::Manual);
        let (mut controller, _images) = ready(&sim).await;
        let mut settings = controller.settings().cloned().expect("settings");
        settings.file_type = FileType::Png;
        controller.set_settings(settings).expect("settings");

        assert!(matches!(
            controller.set_multi_page_checked(true),
            Err(ScanwerkError::MultiPageUnsupported)
        ));
    }

    #[tokio::test]
    async fn single_shot_scan_success() {
        let sim = SimulatedBackend::new(JobMode::Manual);
        let (mut controller, _images) = ready(&sim).await;

        assert!(controller.start_scan().await.expect("start"));
        assert_eq!(controller.state(), AppState::Scanning);
        assert_eq!(controller.session().page_number(), 1);
        assert_eq!(controller.session().progress_percent(), 0);
        assert_eq!(controller.presenter().content(controller.state()), PreviewContent::Progress);

        let observer = controller.observer();
        observer.on_page_progress(1, 60);
        observer.on_page_complete(vec![7], 0);
        observer.on_scan_complete(ScanResult::Success, vec![PathBuf::from("scan.pdf")]);
        assert_eq!(controller.pump_events(), 3);

        assert_eq!(controller.state(), AppState::Done);
        assert_eq!(controller.session().pages().len(), 1);
        assert_eq!(controller.session().last_scanned_paths(), &[PathBuf::from("scan.pdf")]);
        assert_eq!(
            controller.saved_settings().last_used_scanner.as_deref(),
            Some("Simulated Scanner")
        );
    }

    #[tokio::test]
    async fn immediate_backend_completes_on_pump() {
        let sim = SimulatedBackend::new(JobMode::Immediate);
        let (mut controller, images) = ready(&sim).await;
        controller.start_scan().await.expect("start");
        controller.pump_events();
        assert_eq!(controller.state(), AppState::Done);

        controller.return_to_ready().expect("again");
        assert_eq!(controller.state(), AppState::Ready);
        assert!(controller.session().last_scanned_paths().is_empty());
        assert_all_released(&images);
    }

    #[tokio::test]
    async fn rejected_start_shows_notice() {
        let sim = SimulatedBackend::new(JobMode::Manual);
        sim.inject_fault(SimulatedFault::StartScan);
        let (mut controller, _images) = ready(&sim).await;

        assert!(!controller.start_scan().await.expect("start"));
        assert_eq!(controller.state(), AppState::Ready);
        assert_eq!(controller.session().notice(), Some(Notice::StartScanFailed));
    }

    #[tokio::test]
    async fn success_without_pages_is_a_failure() {
        let sim = SimulatedBackend::new(JobMode::Manual);
        let (mut controller, images) = ready(&sim).await;
        controller.start_scan().await.expect("start");

        controller.handle_event(JobEvent::ScanComplete {
            result: ScanResult::Success,
            scanned_file_paths: vec![PathBuf::from("scan.pdf")],
        });
        assert_eq!(controller.state(), AppState::Scanning);
        let failure = controller.dismiss_failure().expect("failure");
        assert_eq!(failure.result, ScanResult::UnknownError);
        assert_eq!(controller.state(), AppState::Ready);
        assert_all_released(&images);
    }

    #[tokio::test]
    async fn device_error_is_classified() {
        let sim = SimulatedBackend::new(JobMode::Manual);
        let (mut controller, _images) = ready(&sim).await;
        controller.start_scan().await.expect("start");
        controller.handle_event(JobEvent::ScanComplete {
            result: ScanResult::FlatbedOpen,
            scanned_file_paths: Vec::new(),
        });

        let failure = controller.session().failure().expect("failure");
        assert_eq!(failure.message.key, "scanFailedDialogFlatbedOpenText");
    }

    #[tokio::test]
    async fn multi_page_happy_path() {
        let sim = SimulatedBackend::new(JobMode::Manual);
        let (mut controller, _images) = ready(&sim).await;
        controller.set_multi_page_checked(true).expect("multi-page");

        assert!(controller.start_scan().await.expect("start"));
        assert_eq!(controller.state(), AppState::Scanning);
        land_page(&mut controller, 0, 0);
        assert_eq!(controller.state(), AppState::MultiPageNextAction);
        assert!(controller.presenter().show_action_toolbar(controller.state()));

        assert!(controller.scan_next_page().await.expect("next"));
        assert_eq!(controller.state(), AppState::MultiPageScanning);
        assert_eq!(controller.session().page_number(), 2);
        assert_eq!(
            controller.presenter().content(controller.state()),
            PreviewContent::ScannedImagesWithProgress
        );

        land_page(&mut controller, 1, 1);
        assert_eq!(controller.state(), AppState::MultiPageNextAction);
        assert_eq!(controller.session().pages().len(), 2);

        controller.complete_multi_page_scan().expect("complete");
        assert_eq!(controller.state(), AppState::Done);
        assert!(!controller.session().has_multi_page_session());

        controller
            .observer()
            .on_scan_complete(ScanResult::Success, vec![PathBuf::from("doc.pdf")]);
        controller.pump_events();
        assert_eq!(controller.session().last_scanned_paths(), &[PathBuf::from("doc.pdf")]);
        let recorded = controller
            .saved_settings()
            .for_scanner("Simulated Scanner")
            .expect("recorded");
        assert!(recorded.multi_page_scan_checked);
    }

    #[tokio::test]
    async fn multi_page_progress_keeps_own_page_number() {
        let sim = SimulatedBackend::new(JobMode::Manual);
        let (mut controller, _images) = ready(&sim).await;
        multi_page_with(&mut controller, 3).await;
        controller.remove_page(0).expect("remove");
        controller.scan_next_page().await.expect("next");
        assert_eq!(controller.session().page_number(), 3);

        // The backend still counts the removed page.
        controller.observer().on_page_progress(4, 30);
        controller.pump_events();
        assert_eq!(controller.session().page_number(), 3);
        assert_eq!(controller.session().progress_percent(), 30);
    }

    #[tokio::test]
    async fn progress_outside_a_scan_is_ignored() {
        let sim = SimulatedBackend::new(JobMode::Manual);
        let (mut controller, _images) = ready(&sim).await;
        controller.observer().on_page_progress(5, 80);
        controller.pump_events();
        assert_eq!(controller.session().page_number(), 1);
        assert_eq!(controller.session().progress_percent(), 0);
    }

    #[tokio::test]
    async fn cancel_failure_during_scan() {
        let sim = SimulatedBackend::new(JobMode::Manual);
        sim.set_cancel_succeeds(false);
        let (mut controller, _images) = ready(&sim).await;
        controller.start_scan().await.expect("start");

        assert!(controller.cancel_scan().await.expect("cancel"));
        assert_eq!(controller.state(), AppState::Canceling);
        controller.pump_events();
        assert_eq!(controller.state(), AppState::Scanning);
        assert_eq!(controller.session().notice(), Some(Notice::CancelFailed));
    }

    #[tokio::test]
    async fn cancel_success_returns_to_ready() {
        let sim = SimulatedBackend::new(JobMode::Manual);
        let (mut controller, images) = ready(&sim).await;
        controller.start_scan().await.expect("start");
        controller.cancel_scan().await.expect("cancel");
        controller.pump_events();
        assert_eq!(controller.state(), AppState::Ready);
        assert_all_released(&images);
    }

    #[tokio::test]
    async fn cancel_outside_a_scan_is_refused() {
        let sim = SimulatedBackend::new(JobMode::Manual);
        let (mut controller, _images) = ready(&sim).await;
        assert!(matches!(
            controller.cancel_scan().await,
            Err(ScanwerkError::NotAllowed { .. })
        ));
        assert!(!sim.calls().contains(&BackendCall::CancelScan));
    }

    #[tokio::test]
    async fn rescan_replaces_in_place() {
        let sim = SimulatedBackend::new(JobMode::Manual);
        let (mut controller, images) = ready(&sim).await;
        multi_page_with(&mut controller, 3).await;
        let before = controller.session().pages().to_vec();

        assert!(controller.rescan_page(1).await.expect("rescan"));
        assert_eq!(controller.state(), AppState::MultiPageScanning);
        assert_eq!(controller.session().page_number(), 2);

        land_page(&mut controller, 1, 99);
        let after = controller.session().pages();
        assert_eq!(after.len(), 3);
        assert_eq!((after[0], after[2]), (before[0], before[2]));
        assert_eq!(images.get(after[1]), Some(vec![99]));
        assert_eq!(images.release_count(before[1]), 1);
    }

    #[tokio::test]
    async fn removal_to_empty_ends_session() {
        let sim = SimulatedBackend::new(JobMode::Manual);
        let (mut controller, images) = ready(&sim).await;
        multi_page_with(&mut controller, 1).await;

        controller.remove_page(0).expect("remove");
        assert_eq!(controller.state(), AppState::Ready);
        assert!(!controller.session().has_multi_page_session());
        assert!(controller.session().pages().is_empty());
        assert_eq!(controller.presenter().current_index_in_view(), None);
        assert_all_released(&images);
    }

    #[tokio::test]
    async fn page_failure_dismissal_returns_to_review() {
        let sim = SimulatedBackend::new(JobMode::Manual);
        let (mut controller, _images) = ready(&sim).await;
        multi_page_with(&mut controller, 2).await;
        controller.scan_next_page().await.expect("next");

        controller.observer().on_multi_page_scan_fail(ScanResult::AdfJammed);
        controller.pump_events();
        assert_eq!(controller.state(), AppState::MultiPageScanning);

        let failure = controller.dismiss_failure().expect("failure");
        assert_eq!(failure.result, ScanResult::AdfJammed);
        assert_eq!(controller.state(), AppState::MultiPageNextAction);
        assert_eq!(controller.session().page_number(), 2);
        assert!(controller.session().has_multi_page_session());
    }

    #[tokio::test]
    async fn every_page_released_once_after_mixed_session() {
        let sim = SimulatedBackend::new(JobMode::Manual);
        let (mut controller, images) = ready(&sim).await;

        // Multi-page: rescans, removals, a cancelled page, then done.
        multi_page_with(&mut controller, 4).await;
        controller.rescan_page(2).await.expect("rescan");
        land_page(&mut controller, 2, 20);
        controller.remove_page(0).expect("remove");
        controller.scan_next_page().await.expect("next");
        controller.cancel_scan().await.expect("cancel");
        controller.pump_events();
        assert_eq!(controller.state(), AppState::MultiPageNextAction);
        controller.rescan_page(0).await.expect("rescan");
        land_page(&mut controller, 0, 30);
        controller.complete_multi_page_scan().expect("complete");
        controller
            .observer()
            .on_scan_complete(ScanResult::Success, vec![PathBuf::from("doc.pdf")]);
        controller.pump_events();
        controller.return_to_ready().expect("again");

        // Then a single-shot scan that fails.
        controller.set_multi_page_checked(false).expect("single");
        controller.start_scan().await.expect("start");
        land_page(&mut controller, 0, 40);
        controller
            .observer()
            .on_scan_complete(ScanResult::IoError, Vec::new());
        controller.pump_events();
        controller.dismiss_failure().expect("failure");

        assert_eq!(controller.state(), AppState::Ready);
        assert!(controller.session().pages().is_empty());
        assert_eq!(images.registered_count(), 7);
        assert_all_released(&images);
    }

    #[tokio::test]
    async fn settings_saved_when_scan_fails() {
        let sim = SimulatedBackend::new(JobMode::Manual);
        let (mut controller, _images) = ready(&sim).await;
        assert!(controller.start_scan().await.expect("start"));

        controller
            .observer()
            .on_scan_complete(ScanResult::IoError, Vec::new());
        controller.pump_events();
        controller.dismiss_failure().expect("failure");

        assert_eq!(controller.state(), AppState::Ready);
        let saved = controller.saved_settings();
        assert_eq!(saved.last_used_scanner.as_deref(), Some("Simulated Scanner"));
        let entry = saved.for_scanner("Simulated Scanner").expect("recorded");
        assert_eq!(entry.resolution_dpi, 300);
        assert!(!entry.multi_page_scan_checked);
    }

    #[tokio::test]
    async fn settings_saved_when_multi_page_scan_cancelled() {
        let sim = SimulatedBackend::new(JobMode::Manual);
        let (mut controller, _images) = ready(&sim).await;
        controller.set_multi_page_checked(true).expect("multi-page");
        assert!(controller.start_scan().await.expect("start"));
        controller.cancel_scan().await.expect("cancel");
        controller.pump_events();

        assert_eq!(controller.state(), AppState::Ready);
        let entry = controller
            .saved_settings()
            .for_scanner("Simulated Scanner")
            .expect("recorded");
        assert!(entry.multi_page_scan_checked);
    }

    #[tokio::test]
    async fn rejected_start_saves_nothing() {
        let sim = SimulatedBackend::new(JobMode::Manual);
        sim.inject_fault(SimulatedFault::StartScan);
        let (mut controller, _images) = ready(&sim).await;
        assert!(!controller.start_scan().await.expect("start"));
        assert!(controller.saved_settings().scanners.is_empty());
        assert!(controller.saved_settings().last_used_scanner.is_none());
    }

    #[tokio::test]
    async fn no_setting_changes_counted() {
        let sim = SimulatedBackend::new(JobMode::Manual);
        let (mut controller, _images) = ready(&sim).await;
        let settings = controller.settings().cloned().expect("settings");
        controller.set_settings(settings).expect("settings");

        assert!(controller.start_scan().await.expect("start"));
        assert_eq!(controller.setting_changes(), 0);
    }

    #[tokio::test]
    async fn some_setting_changes_counted() {
        let sim = SimulatedBackend::new(JobMode::Manual);
        let (mut controller, _images) = ready(&sim).await;
        let mut settings = controller.settings().cloned().expect("settings");
        settings.color_mode = ColorMode::Grayscale;
        settings.resolution_dpi = 600;
        controller.set_settings(settings).expect("settings");

        assert!(controller.start_scan().await.expect("start"));
        assert_eq!(controller.setting_changes(), 2);
    }

    #[tokio::test]
    async fn scanner_change_counts_as_a_setting_change() {
        let sim = SimulatedBackend::with_scanners(
            JobMode::Manual,
            vec![scanner("a", "Attic"), scanner("b", "Basement")],
        );
        let (mut controller, _images) = ready(&sim).await;
        assert_eq!(controller.setting_changes(), 0);

        controller.select_scanner("b").await.expect("select");
        assert_eq!(controller.setting_changes(), 1);
        let mut settings = controller.settings().cloned().expect("settings");
        settings.page_size = PageSize::NaLetter;
        settings.color_mode = ColorMode::BlackAndWhite;
        controller.set_settings(settings).expect("settings");

        assert!(controller.start_scan().await.expect("start"));
        assert_eq!(controller.setting_changes(), 3);
    }

    #[tokio::test]
    async fn reselecting_same_scanner_resets_count() {
        let sim = SimulatedBackend::new(JobMode::Manual);
        let (mut controller, _images) = ready(&sim).await;
        let mut settings = controller.settings().cloned().expect("settings");
        settings.resolution_dpi = 150;
        controller.set_settings(settings).expect("settings");
        assert_eq!(controller.setting_changes(), 1);

        controller.select_scanner("sim-0").await.expect("select");
        assert_eq!(controller.setting_changes(), 0);
    }

    #[tokio::test]
    async fn cancelled_completion_is_not_a_failure() {
        let sim = SimulatedBackend::new(JobMode::Manual);
        let (mut controller, images) = ready(&sim).await;
        controller.start_scan().await.expect("start");
        assert!(controller.cancel_scan().await.expect("cancel"));

        controller.handle_event(JobEvent::ScanComplete {
            result: ScanResult::Cancelled,
            scanned_file_paths: Vec::new(),
        });
        assert_eq!(controller.state(), AppState::Canceling);
        assert!(controller.session().failure().is_none());

        controller.pump_events();
        assert_eq!(controller.state(), AppState::Ready);
        assert!(controller.session().failure().is_none());
        assert_all_released(&images);
    }

    #[tokio::test]
    async fn rescan_failure_dismissal_keeps_pages() {
        let sim = SimulatedBackend::new(JobMode::Manual);
        let (mut controller, images) = ready(&sim).await;
        multi_page_with(&mut controller, 2).await;
        let before = controller.session().pages().to_vec();

        assert!(controller.rescan_page(0).await.expect("rescan"));
        assert_eq!(controller.session().page_number(), 1);
        controller.observer().on_multi_page_scan_fail(ScanResult::FlatbedOpen);
        controller.pump_events();

        let failure = controller.dismiss_failure().expect("failure");
        assert_eq!(failure.result, ScanResult::FlatbedOpen);
        assert_eq!(controller.state(), AppState::MultiPageNextAction);
        assert_eq!(controller.session().pages(), before.as_slice());
        assert_eq!(
            controller.session().page_number() as usize,
            controller.session().pages().len()
        );
        for handle in &before {
            assert_eq!(images.release_count(*handle), 0);
        }
    }

    #[tokio::test]
    async fn next_event_applies_one_event() {
        let sim = SimulatedBackend::new(JobMode::Manual);
        let (mut controller, _images) = ready(&sim).await;
        controller.start_scan().await.expect("start");
        controller.observer().on_page_progress(1, 25);

        assert!(controller.next_event().await);
        assert_eq!(controller.session().progress_percent(), 25);
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The scan session aggregate.
//
// `ScanSession` lives for the whole process. It owns the current `AppState`,
// the ordered page handles, the displayed page ordinal and progress, and the
// multi-page handle while a multi-page session is open. Fields are reset on
// every return to `Ready`, never recreated.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use scanwerk_bridge::{ImageStore, MultiPageScan};
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::human_errors::{HumanError, humanize_scan_result};
use scanwerk_core::types::{Notice, PageHandle, ScanResult};

use crate::state::{AppState, is_transition_allowed};

/// Modal failure shown after a job failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFailure {
    pub result: ScanResult,
    pub message: HumanError,
}

impl ScanFailure {
    pub fn from_result(result: ScanResult) -> Self {
        Self {
            result,
            message: humanize_scan_result(result),
        }
    }
}

pub struct ScanSession {
    state: AppState,
    pages: Vec<PageHandle>,
    /// 1-based ordinal of the page being scanned or last scanned (display only).
    page_number: u32,
    progress_percent: u8,
    multi_page: Option<Box<dyn MultiPageScan>>,
    notice: Option<Notice>,
    failure: Option<ScanFailure>,
    last_scanned_paths: Vec<PathBuf>,
    images: Arc<dyn ImageStore>,
}

impl ScanSession {
    pub fn new(images: Arc<dyn ImageStore>) -> Self {
        Self {
            state: AppState::GettingScanners,
            pages: Vec::new(),
            page_number: 1,
            progress_percent: 0,
            multi_page: None,
            notice: None,
            failure: None,
            last_scanned_paths: Vec::new(),
            images,
        }
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn pages(&self) -> &[PageHandle] {
        &self.pages
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn progress_percent(&self) -> u8 {
        self.progress_percent
    }

    pub fn notice(&self) -> Option<Notice> {
        self.notice
    }

    /// Hand the pending notice to the presentation layer.
    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    pub fn failure(&self) -> Option<&ScanFailure> {
        self.failure.as_ref()
    }

    pub fn last_scanned_paths(&self) -> &[PathBuf] {
        &self.last_scanned_paths
    }

    pub fn has_multi_page_session(&self) -> bool {
        self.multi_page.is_some()
    }

    pub fn multi_page(&self) -> Option<&dyn MultiPageScan> {
        self.multi_page.as_deref()
    }

    // -- Transitions ---------------------------------------------------------

    /// Move to `target`.
    ///
    /// Entering `Ready` releases every page image and closes any multi-page
    /// handle still held.
    ///
    /// # Panics
    ///
    /// If `target` is not reachable from the current state. Callers only offer
    /// actions legal in the current state, so this is a programming error.
    pub fn request_transition(&mut self, target: AppState) {
        assert!(
            is_transition_allowed(self.state, target),
            "illegal state transition: {} -> {}",
            self.state,
            target
        );
        self.enter(target);
    }

    /// Like [`request_transition`](Self::request_transition), but reports an
    /// illegal transition as an error and leaves the state untouched.
    pub fn try_transition(&mut self, target: AppState) -> Result<()> {
        if !is_transition_allowed(self.state, target) {
            return Err(ScanwerkError::IllegalTransition {
                from: self.state.to_string(),
                to: target.to_string(),
            });
        }
        self.enter(target);
        Ok(())
    }

    fn enter(&mut self, target: AppState) {
        info!(from = %self.state, to = %target, "session state transition");
        self.state = target;

        if target == AppState::Ready {
            self.release_all_pages();
            if let Some(handle) = self.multi_page.take() {
                debug!(job_id = %handle.job_id(), "closing multi-page session on return to ready");
                handle.close();
            }
        }
    }

    // -- Pages ---------------------------------------------------------------

    /// Store a finished page at `index`: appended when `index` equals the page
    /// count, otherwise it replaces (and releases) the page already there.
    ///
    /// # Panics
    ///
    /// If `index` is beyond the page count; pages are only ever appended or
    /// replaced by the backend.
    pub fn store_page(&mut self, data: Vec<u8>, index: usize) -> PageHandle {
        assert!(
            index <= self.pages.len(),
            "page index {index} out of order (have {} pages)",
            self.pages.len()
        );
        let handle = self.images.register(data);
        if index == self.pages.len() {
            self.pages.push(handle);
            debug!(%handle, index, pages = self.pages.len(), "page appended");
        } else {
            let old = std::mem::replace(&mut self.pages[index], handle);
            self.images.release(old);
            debug!(%handle, %old, index, "page replaced");
        }
        handle
    }

    /// Remove and release the page at `index`.
    ///
    /// # Panics
    ///
    /// If `index` is not a valid page index.
    pub fn remove_page(&mut self, index: usize) -> PageHandle {
        assert!(
            index < self.pages.len(),
            "page index {index} out of range (have {} pages)",
            self.pages.len()
        );
        let handle = self.pages.remove(index);
        self.images.release(handle);
        debug!(%handle, index, pages = self.pages.len(), "page removed");
        handle
    }

    fn release_all_pages(&mut self) {
        if self.pages.is_empty() {
            return;
        }
        debug!(pages = self.pages.len(), "releasing page images");
        for handle in self.pages.drain(..) {
            self.images.release(handle);
        }
    }

    // -- Bookkeeping ---------------------------------------------------------

    pub fn set_page_number(&mut self, page_number: u32) {
        self.page_number = page_number.max(1);
    }

    /// Keep the displayed ordinal in step with the actual page count.
    pub fn sync_page_number(&mut self) {
        self.set_page_number(self.pages.len() as u32);
    }

    pub fn set_progress(&mut self, percent: u8) {
        self.progress_percent = percent.min(100);
    }

    pub fn set_multi_page(&mut self, handle: Box<dyn MultiPageScan>) {
        if let Some(previous) = self.multi_page.replace(handle) {
            warn!(job_id = %previous.job_id(), "replacing an open multi-page session");
            previous.close();
        }
    }

    pub fn take_multi_page(&mut self) -> Option<Box<dyn MultiPageScan>> {
        self.multi_page.take()
    }

    pub fn set_last_scanned_paths(&mut self, paths: Vec<PathBuf>) {
        self.last_scanned_paths = paths;
    }

    pub fn show_notice(&mut self, notice: Notice) {
        warn!(key = notice.message_key(), "transient notice");
        self.notice = Some(notice);
    }

    pub fn show_failure(&mut self, result: ScanResult) {
        let failure = ScanFailure::from_result(result);
        warn!(?result, key = failure.message.key, "scan failed");
        self.failure = Some(failure);
    }

    pub fn take_failure(&mut self) -> Option<ScanFailure> {
        self.failure.take()
    }
}

impl std::fmt::Debug for ScanSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanSession")
            .field("state", &self.state)
            .field("pages", &self.pages)
            .field("page_number", &self.page_number)
            .field("progress_percent", &self.progress_percent)
            .field("multi_page", &self.multi_page.as_ref().map(|h| h.job_id()))
            .field("notice", &self.notice)
            .field("failure", &self.failure)
            .finish_non_exhaustive()
    }
}

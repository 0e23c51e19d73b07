// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Preview decisions derived from session state.
//
// Rendering belongs to the presentation layer; this module only decides what
// the preview area shows and which page currently has focus.

use tracing::debug;

use crate::geometry::current_page_index;
use crate::state::AppState;

/// What the preview area shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewContent {
    /// Instructions, no scan running and nothing to show yet.
    HelperText,
    /// Single-shot scan progress.
    Progress,
    /// The scanned pages.
    ScannedImages,
    /// The scanned pages with a progress overlay for the page being scanned.
    ScannedImagesWithProgress,
}

/// Focus tracking for the multi-page page strip.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PageViewState {
    pub current_index_in_view: Option<usize>,
    /// Set once the first page image has been measured.
    pub first_page_loaded: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PreviewPresenter {
    view: PageViewState,
    image_height: f64,
    viewport_height: f64,
    scroll_top: f64,
    page_count: usize,
}

impl PreviewPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(&self, state: AppState) -> PreviewContent {
        match state {
            AppState::GettingScanners
            | AppState::GotScanners
            | AppState::GettingCapabilities
            | AppState::RestoringSavedSettings
            | AppState::Ready
            | AppState::NoScanners => PreviewContent::HelperText,
            AppState::Scanning | AppState::Canceling => PreviewContent::Progress,
            AppState::Done | AppState::MultiPageNextAction => PreviewContent::ScannedImages,
            AppState::MultiPageScanning | AppState::MultiPageCanceling => {
                PreviewContent::ScannedImagesWithProgress
            }
        }
    }

    /// Rescan/remove actions are offered only between pages, on a focused page.
    pub fn show_action_toolbar(&self, state: AppState) -> bool {
        state == AppState::MultiPageNextAction && self.view.current_index_in_view.is_some()
    }

    pub fn view(&self) -> PageViewState {
        self.view
    }

    pub fn current_index_in_view(&self) -> Option<usize> {
        self.view.current_index_in_view
    }

    /// Record the height of a loaded page image. Only the first usable
    /// measurement counts; all pages are assumed to be the same height.
    pub fn on_image_loaded(&mut self, image_height: f64) -> bool {
        if self.view.first_page_loaded {
            return false;
        }
        if !(image_height.is_finite() && image_height > 0.0) {
            debug!(image_height, "unusable image height ignored");
            return false;
        }
        self.image_height = image_height;
        self.view.first_page_loaded = true;
        self.refresh()
    }

    pub fn on_viewport_resized(&mut self, viewport_height: f64) -> bool {
        self.viewport_height = viewport_height;
        self.refresh()
    }

    /// Returns whether the focused page changed.
    pub fn on_scroll(&mut self, scroll_top: f64) -> bool {
        self.scroll_top = scroll_top;
        self.refresh()
    }

    /// Returns whether the focused page changed.
    pub fn on_pages_changed(&mut self, page_count: usize) -> bool {
        self.page_count = page_count;
        if page_count == 0 {
            let changed = self.view.current_index_in_view.is_some();
            self.view = PageViewState::default();
            self.scroll_top = 0.0;
            return changed;
        }
        self.refresh()
    }

    fn refresh(&mut self) -> bool {
        let next = if self.page_count == 0 {
            None
        } else if !self.view.first_page_loaded {
            Some(0)
        } else {
            current_page_index(
                self.scroll_top,
                self.viewport_height,
                self.image_height,
                self.page_count,
            )
        };

        if next == self.view.current_index_in_view {
            return false;
        }
        debug!(from = ?self.view.current_index_in_view, to = ?next, "page in view changed");
        self.view.current_index_in_view = next;
        true
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk Session — the scan session engine. The state table, the session
// aggregate, multi-page sequencing, page-in-view geometry and the preview
// decisions, tied together by `ScanController`.

pub mod controller;
pub mod geometry;
pub mod multi_page;
pub mod presenter;
pub mod restore;
pub mod session;
pub mod state;

pub use controller::ScanController;
pub use geometry::{current_page_index, max_scroll_top};
pub use multi_page::MultiPageSessionController;
pub use presenter::{PageViewState, PreviewContent, PreviewPresenter};
pub use restore::{Correction, RestoredSettings};
pub use session::{ScanFailure, ScanSession};
pub use state::{AppState, is_transition_allowed};

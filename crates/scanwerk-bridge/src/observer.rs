// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job observer channel.
//
// The backend pushes `JobEvent`s through a `JobObserver`; the session engine
// drains them from `JobEvents` on its own task, one at a time, in the order
// the backend sent them.

use std::path::PathBuf;

use tokio::sync::mpsc;
use tracing::debug;

use scanwerk_core::types::ScanResult;

/// A notification pushed by the backend about the running job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// Progress of the page currently being scanned.
    PageProgress { page_number: u32, progress_percent: u8 },
    /// A page finished. `page_index` equal to the current page count appends;
    /// a smaller index replaces (rescan).
    PageComplete { page_data: Vec<u8>, page_index: usize },
    /// The job ended; on success `scanned_file_paths` lists the produced files.
    ScanComplete {
        result: ScanResult,
        scanned_file_paths: Vec<PathBuf>,
    },
    /// Answer to a cancel request.
    CancelComplete { success: bool },
    /// A page of a multi-page session failed.
    MultiPageScanFail { result: ScanResult },
}

/// Create a connected observer/receiver pair.
pub fn job_channel() -> (JobObserver, JobEvents) {
    let (tx, rx) = mpsc::unbounded_channel();
    (JobObserver { tx }, JobEvents { rx })
}

/// Sending half, handed to the backend with every job it starts.
#[derive(Debug, Clone)]
pub struct JobObserver {
    tx: mpsc::UnboundedSender<JobEvent>,
}

impl JobObserver {
    pub fn on_page_progress(&self, page_number: u32, progress_percent: u8) {
        self.send(JobEvent::PageProgress {
            page_number,
            progress_percent: progress_percent.min(100),
        });
    }

    pub fn on_page_complete(&self, page_data: Vec<u8>, page_index: usize) {
        self.send(JobEvent::PageComplete {
            page_data,
            page_index,
        });
    }

    pub fn on_scan_complete(&self, result: ScanResult, scanned_file_paths: Vec<PathBuf>) {
        self.send(JobEvent::ScanComplete {
            result,
            scanned_file_paths,
        });
    }

    pub fn on_cancel_complete(&self, success: bool) {
        self.send(JobEvent::CancelComplete { success });
    }

    pub fn on_multi_page_scan_fail(&self, result: ScanResult) {
        self.send(JobEvent::MultiPageScanFail { result });
    }

    fn send(&self, event: JobEvent) {
        // A closed receiver means the session is gone; nothing left to notify.
        if self.tx.send(event).is_err() {
            debug!("job observer receiver dropped, event discarded");
        }
    }
}

/// Receiving half, owned by the session engine.
#[derive(Debug)]
pub struct JobEvents {
    rx: mpsc::UnboundedReceiver<JobEvent>,
}

impl JobEvents {
    /// Next queued event without waiting.
    pub fn try_next(&mut self) -> Option<JobEvent> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next event. `None` once every observer has been dropped.
    pub async fn next(&mut self) -> Option<JobEvent> {
        self.rx.recv().await
    }
}

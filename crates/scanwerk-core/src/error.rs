// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Scanwerk.

use thiserror::Error;

/// Top-level error type for all Scanwerk operations.
#[derive(Debug, Error)]
pub enum ScanwerkError {
    // -- Backend errors --
    #[error("scan backend rejected request: {0}")]
    RequestRejected(String),

    #[error("scan backend unreachable: {0}")]
    Backend(String),

    #[error("scanner not found: {0}")]
    ScannerNotFound(String),

    #[error("no scanner selected")]
    NoScannerSelected,

    #[error("scanner capabilities unavailable")]
    CapabilitiesUnavailable,

    // -- Session errors --
    #[error("illegal state transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    #[error("{operation} not allowed while {state}")]
    NotAllowed {
        operation: &'static str,
        state: String,
    },

    #[error("no multi-page scan session is active")]
    NoMultiPageSession,

    #[error("multi-page scanning requires a flatbed source and PDF output")]
    MultiPageUnsupported,

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Platform bridge --
    #[error("scanning not available on this platform")]
    PlatformUnavailable,
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanwerkError>;

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Session lifecycle states and the table of legal transitions.
//
// The table is keyed by target state: each entry lists the states a session
// may enter it from. Every state change goes through `is_transition_allowed`.

use serde::{Deserialize, Serialize};

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppState {
    GettingScanners,
    GotScanners,
    GettingCapabilities,
    RestoringSavedSettings,
    Ready,
    Scanning,
    Done,
    Canceling,
    NoScanners,
    MultiPageNextAction,
    MultiPageScanning,
    MultiPageCanceling,
}

impl AppState {
    pub const ALL: [AppState; 12] = [
        Self::GettingScanners,
        Self::GotScanners,
        Self::GettingCapabilities,
        Self::RestoringSavedSettings,
        Self::Ready,
        Self::Scanning,
        Self::Done,
        Self::Canceling,
        Self::NoScanners,
        Self::MultiPageNextAction,
        Self::MultiPageScanning,
        Self::MultiPageCanceling,
    ];

    /// States a session may move to `self` from.
    pub fn permitted_predecessors(self) -> &'static [AppState] {
        use AppState::*;
        match self {
            GettingScanners => &[GettingScanners, NoScanners],
            GotScanners => &[GettingScanners],
            GettingCapabilities => &[GotScanners, Ready],
            RestoringSavedSettings => &[GettingCapabilities],
            Ready => &[
                GettingCapabilities,
                RestoringSavedSettings,
                Scanning,
                Done,
                Canceling,
                MultiPageNextAction,
            ],
            Scanning => &[Ready, Canceling],
            Done => &[Scanning, Canceling, MultiPageNextAction],
            Canceling => &[Scanning],
            NoScanners => &[GettingScanners],
            MultiPageScanning => &[MultiPageNextAction, MultiPageCanceling],
            MultiPageNextAction => &[Scanning, Canceling, MultiPageScanning, MultiPageCanceling],
            MultiPageCanceling => &[MultiPageScanning],
        }
    }

    /// States in which the backend has a job running and reports progress.
    pub fn is_scanning(self) -> bool {
        matches!(
            self,
            Self::Scanning | Self::MultiPageScanning | Self::Canceling | Self::MultiPageCanceling
        )
    }

    pub fn is_multi_page(self) -> bool {
        matches!(
            self,
            Self::MultiPageNextAction | Self::MultiPageScanning | Self::MultiPageCanceling
        )
    }
}

impl std::fmt::Display for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Whether `from -> to` is in the transition table.
pub fn is_transition_allowed(from: AppState, to: AppState) -> bool {
    to.permitted_predecessors().contains(&from)
}

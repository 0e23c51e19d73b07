// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable failure messages for scan jobs and session errors.
//
// Scan result codes map onto a flat table of dialog texts. There is no retry
// logic here: retrying is always a new request started by the user.

use crate::error::ScanwerkError;
use crate::types::{Notice, ScanResult};

/// Severity of a failure from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Trying again is likely to work (busy device, I/O hiccup).
    Transient,
    /// The user must do something at the scanner first.
    ActionRequired,
    /// Retrying will not help.
    Permanent,
}

/// A failure message ready for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HumanError {
    /// Localisation key for the dialog or toast body.
    pub key: &'static str,
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    pub severity: Severity,
}

/// Classify a scan job result code for the failure dialog.
///
/// `Success` only reaches this function when the job produced no pages, which
/// is reported the same way as an unknown error.
pub fn humanize_scan_result(result: ScanResult) -> HumanError {
    match result {
        ScanResult::DeviceBusy => HumanError {
            key: "scanFailedDialogDeviceBusyText",
            message: "The scanner is busy.".into(),
            suggestion: "Another job may be using it. Wait a moment, then scan again.".into(),
            severity: Severity::Transient,
        },
        ScanResult::AdfJammed => HumanError {
            key: "scanFailedDialogAdfJammedText",
            message: "Paper is jammed in the document feeder.".into(),
            suggestion: "Remove the stuck page, check nothing is left inside, then scan again.".into(),
            severity: Severity::ActionRequired,
        },
        ScanResult::AdfEmpty => HumanError {
            key: "scanFailedDialogAdfEmptyText",
            message: "The document feeder is empty.".into(),
            suggestion: "Load your pages into the feeder, then scan again.".into(),
            severity: Severity::ActionRequired,
        },
        ScanResult::FlatbedOpen => HumanError {
            key: "scanFailedDialogFlatbedOpenText",
            message: "The scanner cover is open.".into(),
            suggestion: "Close the cover, then scan again.".into(),
            severity: Severity::ActionRequired,
        },
        ScanResult::IoError => HumanError {
            key: "scanFailedDialogIoErrorText",
            message: "We lost contact with the scanner.".into(),
            suggestion: "Check the scanner is on and connected, then scan again.".into(),
            severity: Severity::Transient,
        },
        ScanResult::Success | ScanResult::UnknownError | ScanResult::Cancelled => HumanError {
            key: "scanFailedDialogUnknownErrorText",
            message: "Something went wrong while scanning.".into(),
            suggestion: "Try scanning again. If this keeps happening, restart the scanner.".into(),
            severity: Severity::Transient,
        },
    }
}

/// Text for a transient notice.
pub fn humanize_notice(notice: Notice) -> HumanError {
    let (message, suggestion, severity) = match notice {
        Notice::StartScanFailed | Notice::StartMultiPageScanFailed => (
            "The scan couldn't be started.",
            "Check the scanner is on and connected, then try again.",
            Severity::Transient,
        ),
        Notice::ScanNextPageFailed => (
            "The next page couldn't be scanned.",
            "Your scanned pages are kept. Try scanning the page again.",
            Severity::Transient,
        ),
        Notice::RescanPageFailed => (
            "The page couldn't be rescanned.",
            "The original page is kept. Try rescanning it again.",
            Severity::Transient,
        ),
        Notice::CancelFailed => (
            "The scan couldn't be cancelled.",
            "The scanner finished too far along to stop.",
            Severity::Permanent,
        ),
        Notice::CapabilitiesFailed => (
            "We couldn't connect to the scanner.",
            "Make sure it is turned on, or choose a different scanner.",
            Severity::Transient,
        ),
    };
    HumanError {
        key: notice.message_key(),
        message: message.into(),
        suggestion: suggestion.into(),
        severity,
    }
}

/// Convert a `ScanwerkError` into a `HumanError`.
pub fn humanize_error(err: &ScanwerkError) -> HumanError {
    match err {
        ScanwerkError::RequestRejected(_) | ScanwerkError::Backend(_) => HumanError {
            key: "scanServiceErrorText",
            message: "The scan service had a problem.".into(),
            suggestion: "Try again. If this keeps happening, restart the app.".into(),
            severity: Severity::Transient,
        },

        ScanwerkError::ScannerNotFound(_) => HumanError {
            key: "scannerNotFoundText",
            message: "That scanner is no longer available.".into(),
            suggestion: "Make sure it is turned on, then search for scanners again.".into(),
            severity: Severity::ActionRequired,
        },

        ScanwerkError::NoScannerSelected | ScanwerkError::CapabilitiesUnavailable => HumanError {
            key: "noScannerSelectedText",
            message: "No scanner is ready.".into(),
            suggestion: "Choose a scanner from the list, then try again.".into(),
            severity: Severity::ActionRequired,
        },

        ScanwerkError::MultiPageUnsupported => HumanError {
            key: "multiPageUnsupportedText",
            message: "These settings can't build a multi-page document.".into(),
            suggestion: "Choose the flatbed and PDF, then try again.".into(),
            severity: Severity::ActionRequired,
        },

        ScanwerkError::IllegalTransition { .. }
        | ScanwerkError::NotAllowed { .. }
        | ScanwerkError::NoMultiPageSession => HumanError {
            key: "scanBusyText",
            message: "That isn't possible right now.".into(),
            suggestion: "Wait for the current scan to finish.".into(),
            severity: Severity::Transient,
        },

        ScanwerkError::Io(_) | ScanwerkError::Serialization(_) => HumanError {
            key: "storageErrorText",
            message: "Your scan settings couldn't be saved or loaded.".into(),
            suggestion: "Scanning still works; your choices just won't be remembered.".into(),
            severity: Severity::Transient,
        },

        ScanwerkError::PlatformUnavailable => HumanError {
            key: "platformUnavailableText",
            message: "Scanning isn't available on this device.".into(),
            suggestion: "A scan service is required to use scanners from this app.".into(),
            severity: Severity::Permanent,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_result_code_has_its_own_key() {
        let codes = [
            ScanResult::DeviceBusy,
            ScanResult::AdfJammed,
            ScanResult::AdfEmpty,
            ScanResult::FlatbedOpen,
            ScanResult::IoError,
            ScanResult::UnknownError,
        ];
        let mut keys: Vec<_> = codes.iter().map(|c| humanize_scan_result(*c).key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), codes.len());
    }

    #[test]
    fn empty_success_reads_as_unknown() {
        assert_eq!(
            humanize_scan_result(ScanResult::Success),
            humanize_scan_result(ScanResult::UnknownError)
        );
    }

    #[test]
    fn jam_is_action_required() {
        let human = humanize_scan_result(ScanResult::AdfJammed);
        assert_eq!(human.severity, Severity::ActionRequired);
    }

    #[test]
    fn notice_uses_its_message_key() {
        let human = humanize_notice(Notice::CancelFailed);
        assert_eq!(human.key, "cancelFailedToast");
    }

    #[test]
    fn platform_unavailable_is_permanent() {
        let human = humanize_error(&ScanwerkError::PlatformUnavailable);
        assert_eq!(human.severity, Severity::Permanent);
    }
}

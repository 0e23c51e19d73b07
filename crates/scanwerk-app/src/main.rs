// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk — headless scan session driver
//
// Entry point. Loads configuration and saved scan settings, initialises
// logging, runs one scan session against the configured backend, and writes
// the updated settings back.

mod services;

use std::sync::Arc;

use scanwerk_bridge::{BackendKind, InMemoryImageStore, scan_backend};
use scanwerk_core::error::Result;
use scanwerk_core::human_errors::{humanize_error, humanize_notice};
use scanwerk_session::{AppState, ScanController};

use services::app_services::AppServices;

/// Set to `1` or `true` to run against the in-process simulated scanner.
const SIMULATE_ENV: &str = "SCANWERK_SIMULATE";

/// Pages scanned when the scanner supports multi-page documents.
const DEMO_PAGES: usize = 3;

/// Nominal preview geometry, in pixels.
const PREVIEW_VIEWPORT: f64 = 900.0;
const PREVIEW_PAGE: f64 = 400.0;

#[tokio::main]
async fn main() {
    // Config first: it carries the fallback log filter.
    let services = AppServices::init();
    let log_filter = services
        .as_ref()
        .map(|s| s.config().log_filter.clone())
        .unwrap_or_else(|_| "info".into());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter)),
        )
        .init();

    tracing::info!("Scanwerk starting");

    let mut services = match services {
        Ok(s) => {
            tracing::info!(data_dir = ?s.data_dir(), "app services initialised");
            s
        }
        Err(e) => {
            tracing::error!(error = %e, "data directory unavailable, settings will not be saved");
            AppServices::fallback()
        }
    };

    let kind = backend_kind();
    let mut controller = ScanController::new(
        scan_backend(kind),
        Arc::new(InMemoryImageStore::new()),
        services.config().clone(),
        services.saved_settings().clone(),
    );

    if let Err(e) = run_session(&mut controller).await {
        let human = humanize_error(&e);
        tracing::error!(error = %e, suggestion = %human.suggestion, "{}", human.message);
    }

    let config = controller.config().clone();
    if let Err(e) = services.save_config(&config) {
        tracing::warn!(error = %e, "could not write config");
    }
    if let Err(e) = services.save_saved_settings(controller.saved_settings()) {
        tracing::warn!(error = %e, "could not write saved scan settings");
    }

    tracing::info!(state = %controller.state(), "Scanwerk finished");
}

fn backend_kind() -> BackendKind {
    match std::env::var(SIMULATE_ENV).as_deref() {
        Ok("1") | Ok("true") => BackendKind::Simulated,
        _ => BackendKind::Platform,
    }
}

/// Discover, scan, and (where supported) build, revise and complete a
/// multi-page document.
async fn run_session(controller: &mut ScanController) -> Result<()> {
    controller.discover_scanners().await?;
    report_notice(controller);
    if controller.state() != AppState::Ready || controller.capabilities().is_none() {
        tracing::warn!(state = %controller.state(), "no scanner ready, nothing to scan");
        return Ok(());
    }
    if let Some(scanner) = controller.selected_scanner() {
        tracing::info!(scanner = %scanner.display_name, settings = ?controller.settings(), "scanner ready");
    }
    for correction in controller.corrections() {
        tracing::info!(
            field = correction.field,
            saved = %correction.saved,
            restored = %correction.restored,
            "saved setting adjusted"
        );
    }

    let multi_page = controller.set_multi_page_checked(true).is_ok();
    if !controller.start_scan().await? {
        report_notice(controller);
        return Ok(());
    }
    settle(controller).await;

    if multi_page {
        build_document(controller).await?;
    }

    if let Some(failure) = controller.dismiss_failure() {
        tracing::warn!(result = ?failure.result, suggestion = %failure.message.suggestion, "{}", failure.message.message);
    }
    if controller.state() == AppState::Done {
        tracing::info!(files = ?controller.session().last_scanned_paths(), "scan saved");
        controller.return_to_ready()?;
    }
    Ok(())
}

async fn build_document(controller: &mut ScanController) -> Result<()> {
    controller.presenter_mut().on_viewport_resized(PREVIEW_VIEWPORT);
    controller.presenter_mut().on_image_loaded(PREVIEW_PAGE);

    while reviewing(controller) && controller.session().pages().len() < DEMO_PAGES {
        if !controller.scan_next_page().await? {
            report_notice(controller);
            break;
        }
        settle(controller).await;
    }

    if reviewing(controller)
        && controller.session().pages().len() > 1
        && controller.rescan_page(1).await?
    {
        settle(controller).await;
    }
    if reviewing(controller) && controller.session().pages().len() > 1 {
        controller.remove_page(0)?;
    }

    let pages = controller.session().pages().len();
    let bottom = scanwerk_session::max_scroll_top(PREVIEW_VIEWPORT, PREVIEW_PAGE, pages);
    controller.presenter_mut().on_scroll(bottom);
    tracing::info!(
        pages,
        in_view = ?controller.presenter().current_index_in_view(),
        "document reviewed"
    );

    if reviewing(controller) {
        controller.complete_multi_page_scan()?;
        settle(controller).await;
    }
    Ok(())
}

fn reviewing(controller: &ScanController) -> bool {
    controller.state() == AppState::MultiPageNextAction && controller.session().failure().is_none()
}

/// Apply the job events queued so far.
async fn settle(controller: &mut ScanController) {
    tokio::task::yield_now().await;
    let handled = controller.pump_events();
    tracing::debug!(
        handled,
        state = %controller.state(),
        page = controller.session().page_number(),
        progress = controller.session().progress_percent(),
        "job events applied"
    );
}

fn report_notice(controller: &mut ScanController) {
    if let Some(notice) = controller.take_notice() {
        let human = humanize_notice(notice);
        tracing::warn!(key = human.key, suggestion = %human.suggestion, "{}", human.message);
    }
}

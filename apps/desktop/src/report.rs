//! Terminal rendering of session failures and events.

use client_core::{ErrorCategory, SessionError, SessionEvent};
use tracing::debug;

/// One-line explanation printed under a failed command.
pub fn failure_hint(err: &SessionError) -> Option<&'static str> {
    match err.category() {
        ErrorCategory::Service => {
            let lower = err.to_string().to_ascii_lowercase();
            if lower.contains("connection refused")
                || lower.contains("error sending request")
                || lower.contains("dns")
                || lower.contains("timed out")
            {
                Some("Server unreachable; check --api-url or SUMANTRA_API_URL, or rerun with --failure-policy placeholder.")
            } else if lower.contains("status 5") {
                Some("The service reported an internal error; try again shortly.")
            } else {
                None
            }
        }
        ErrorCategory::Device => Some("Pass a readable image with --frame to use the still-frame camera."),
        ErrorCategory::State => Some("That step is not available right now."),
        ErrorCategory::Validation => None,
    }
}

pub fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::ModeChanged { from, to } => debug!(?from, ?to, "mode"),
        SessionEvent::Loading(active) => debug!(active, "loading"),
        SessionEvent::Notice(notice) => {
            debug!(category = ?notice.category, message = %notice.message, "notice")
        }
        SessionEvent::PreviewReady(preview) => {
            debug!(dimensions = ?preview.dimensions, "preview ready")
        }
        SessionEvent::ResultReady(view) => debug!(species = %view.species, "result ready"),
        SessionEvent::DiaryRefreshed(view) => debug!(entries = view.cards().len(), "diary refreshed"),
        SessionEvent::SectionChanged(section) => debug!(?section, "section"),
        SessionEvent::ThemeChanged(theme) => debug!(theme = theme.as_str(), "theme"),
    }
}

//! Desktop notification delivery for user-visible failures.
//!
//! Network, permission, GPG, and installation failures raise a desktop
//! notification in addition to their terminal message; every other kind
//! stays terminal-only. Notification delivery is best-effort: a missing
//! notification daemon must never turn into a second failure.

use crate::libs::error::ErrorKind;
use crate::msg_debug;

/// Emits a failure notification when the kind warrants one.
pub fn notify_failure(app_name: &str, kind: ErrorKind, message: &str) {
    if !kind.notifies() {
        return;
    }

    let summary = format!("{} update failed", app_name);
    let result = notify_rust::Notification::new()
        .summary(&summary)
        .body(message)
        .icon("dialog-error")
        .appname("appwatch")
        .show();

    if let Err(e) = result {
        msg_debug!(format!("desktop notification failed: {}", e));
    }
}

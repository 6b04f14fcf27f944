//! Convenience macros for application messaging and logging.
//!
//! Each `msg_*` macro renders a [`Message`](super::Message) (or anything
//! `Display`) and hands it to one routing function, [`emit`]. Normal CLI
//! runs get plain console output — stdout for information, stderr for
//! errors — while debug mode (`APPWATCH_DEBUG` or `RUST_LOG` set) routes
//! everything through `tracing` so messages interleave correctly with the
//! structured log stream.
//!
//! Every macro has a second form, `msg_info!(message, true)`, that pads
//! the line with blank lines for emphasis. Debug messages are fully
//! suppressed outside debug mode.

use std::sync::OnceLock;

/// Cached debug-mode flag so the environment is only inspected once.
static DEBUG_MODE: OnceLock<bool> = OnceLock::new();

/// Checks if debug mode is enabled, with caching for performance.
#[doc(hidden)]
pub fn is_debug_mode() -> bool {
    fn detect() -> bool {
        ["APPWATCH_DEBUG", "RUST_LOG"].iter().any(|var| std::env::var_os(var).is_some())
    }
    *DEBUG_MODE.get_or_init(detect)
}

/// Severity of one message; decides the prefix and the output channel.
#[doc(hidden)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum MsgLevel {
    Plain,
    Success,
    Info,
    Warning,
    Error,
    Debug,
}

impl MsgLevel {
    fn prefix(self) -> &'static str {
        match self {
            MsgLevel::Plain => "",
            MsgLevel::Success => "✅ ",
            MsgLevel::Info => "ℹ️ ",
            MsgLevel::Warning => "⚠️ ",
            MsgLevel::Error => "❌ ",
            MsgLevel::Debug => "🔍 ",
        }
    }
}

/// The single output routine behind every `msg_*` macro.
///
/// `spaced` wraps the line in blank lines for emphasis. Outside debug
/// mode, errors go to stderr so scripts can separate them from data, and
/// debug messages are dropped entirely.
#[doc(hidden)]
pub fn emit(level: MsgLevel, text: &str, spaced: bool) {
    let debug_mode = is_debug_mode();
    if level == MsgLevel::Debug && !debug_mode {
        return;
    }

    let line = if spaced {
        format!("\n{}{}\n", level.prefix(), text)
    } else {
        format!("{}{}", level.prefix(), text)
    };

    if debug_mode {
        match level {
            MsgLevel::Error => tracing::error!("{}", line),
            MsgLevel::Warning => tracing::warn!("{}", line),
            MsgLevel::Debug => tracing::debug!("{}", line),
            _ => tracing::info!("{}", line),
        }
    } else if level == MsgLevel::Error {
        eprintln!("{}", line);
    } else {
        println!("{}", line);
    }
}

/// Prints a general message without a prefix.
#[macro_export]
macro_rules! msg_print {
    ($msg:expr) => {
        $crate::libs::messages::macros::emit($crate::libs::messages::macros::MsgLevel::Plain, &$msg.to_string(), false)
    };
    ($msg:expr, true) => {
        $crate::libs::messages::macros::emit($crate::libs::messages::macros::MsgLevel::Plain, &$msg.to_string(), true)
    };
}

/// Prints a success message with ✅ prefix.
#[macro_export]
macro_rules! msg_success {
    ($msg:expr) => {
        $crate::libs::messages::macros::emit($crate::libs::messages::macros::MsgLevel::Success, &$msg.to_string(), false)
    };
    ($msg:expr, true) => {
        $crate::libs::messages::macros::emit($crate::libs::messages::macros::MsgLevel::Success, &$msg.to_string(), true)
    };
}

/// Prints an informational message with ℹ️ prefix.
#[macro_export]
macro_rules! msg_info {
    ($msg:expr) => {
        $crate::libs::messages::macros::emit($crate::libs::messages::macros::MsgLevel::Info, &$msg.to_string(), false)
    };
    ($msg:expr, true) => {
        $crate::libs::messages::macros::emit($crate::libs::messages::macros::MsgLevel::Info, &$msg.to_string(), true)
    };
}

/// Prints a warning message with ⚠️ prefix.
#[macro_export]
macro_rules! msg_warning {
    ($msg:expr) => {
        $crate::libs::messages::macros::emit($crate::libs::messages::macros::MsgLevel::Warning, &$msg.to_string(), false)
    };
    ($msg:expr, true) => {
        $crate::libs::messages::macros::emit($crate::libs::messages::macros::MsgLevel::Warning, &$msg.to_string(), true)
    };
}

/// Prints an error message with ❌ prefix (stderr in normal runs).
#[macro_export]
macro_rules! msg_error {
    ($msg:expr) => {
        $crate::libs::messages::macros::emit($crate::libs::messages::macros::MsgLevel::Error, &$msg.to_string(), false)
    };
    ($msg:expr, true) => {
        $crate::libs::messages::macros::emit($crate::libs::messages::macros::MsgLevel::Error, &$msg.to_string(), true)
    };
}

/// Debug-only message with 🔍 prefix; suppressed outside debug mode.
#[macro_export]
macro_rules! msg_debug {
    ($msg:expr) => {
        $crate::libs::messages::macros::emit($crate::libs::messages::macros::MsgLevel::Debug, &$msg.to_string(), false)
    };
}

//! Centralized message management system for the appwatch application.
//!
//! Every user-facing string lives in the [`Message`] catalog; the rest of
//! the engine constructs typed variants and the display module renders
//! them. The `msg_*` macros route output through one shared emitter,
//! which targets `tracing` in debug mode and plain console output
//! otherwise.
//!
//! ## Usage
//!
//! ```rust
//! use appwatch::libs::messages::Message;
//! use appwatch::{msg_info, msg_error};
//!
//! msg_info!(Message::CheckingApp("Vivaldi".to_string()));
//! msg_error!(Message::ConfigNoAppsEnabled);
//! ```

pub mod display;
pub mod macros;
pub mod types;

// Re-export the main Message type for convenient access
pub use types::Message;

//! Core library modules for the appwatch engine.
//!
//! - **Infrastructure**: paths, configuration, messages, error taxonomy
//! - **Network**: the retrying, rate-limited, caching HTTP layer
//! - **Discovery**: release-index probing, version comparison, custom
//!   checkers
//! - **Delivery**: artifact verification and the installation strategies
//! - **State**: the installed-version ledger, run orchestration, cleanup

pub mod app_config;
pub mod cleanup;
pub mod config;
pub mod custom;
pub mod error;
pub mod exec;
pub mod hooks;
pub mod http;
pub mod install;
pub mod ledger;
pub mod messages;
pub mod notify;
pub mod orchestrator;
pub mod paths;
pub mod pipeline;
pub mod release;
pub mod verify;
pub mod version;

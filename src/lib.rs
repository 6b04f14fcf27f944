//! # Appwatch - Application Watchdog and Update Engine
//!
//! A command-line update engine for Linux desktop applications: for each
//! app declared in the configuration set it discovers the latest upstream
//! version, downloads and verifies the artifact, and installs it through
//! the appropriate system mechanism.
//!
//! ## Features
//!
//! - **Release Discovery**: GitHub release indexes, direct downloads,
//!   version pages, flatpak search, and custom checker scripts
//! - **Artifact Verification**: sha256/sha1/md5 checksums and detached
//!   GPG signatures
//! - **Installation Strategies**: Debian packages, archive extraction
//!   (binary move, tree copy, source build), AppImages, and flatpak
//! - **Version Ledger**: locked, atomically updated record of installed
//!   versions
//! - **Safety**: rate-limited, retrying HTTP with a response cache;
//!   dry-run mode; signal-driven cleanup
//!
//! ## Usage
//!
//! ```rust,no_run
//! use appwatch::commands::Cli;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Cli::menu().await
//! }
//! ```

pub mod commands;
pub mod libs;

//! Build script for the appwatch application.
//!
//! Generates `app_metadata.rs` in `OUT_DIR`: one `APP_METADATA_*` string
//! constant per piece of package metadata (name, version, and every
//! string entry under `[package.metadata]` in Cargo.toml), for inclusion
//! at compile time.

use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use toml::Value;

fn main() {
    let manifest = fs::read_to_string("Cargo.toml").expect("Cargo.toml is readable");
    let manifest: Value = toml::from_str(&manifest).expect("Cargo.toml parses");

    let mut constants = vec![
        ("NAME".to_string(), env::var("CARGO_PKG_NAME").unwrap()),
        ("VERSION".to_string(), env::var("CARGO_PKG_VERSION").unwrap()),
    ];

    // String entries under [package.metadata] become additional constants,
    // keyed by their uppercased name.
    if let Some(metadata) = manifest.get("package").and_then(|pkg| pkg.get("metadata")).and_then(|meta| meta.as_table()) {
        for (key, value) in metadata {
            if let Some(value) = value.as_str() {
                constants.push((key.to_uppercase(), value.to_string()));
            }
        }
    }

    let mut generated = String::new();
    for (key, value) in constants {
        let _ = writeln!(generated, "#[allow(unused)]\npub const APP_METADATA_{}: &str = {:?};", key, value);
    }

    let out_dir = env::var("OUT_DIR").unwrap();
    fs::write(Path::new(&out_dir).join("app_metadata.rs"), generated).expect("metadata file is writable");
}

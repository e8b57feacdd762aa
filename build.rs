//! Build script for SweetSync
//!
//! Bumps a local build counter whenever sources change and embeds it, with the
//! compile time, into the binary.

use std::fs;
use std::path::Path;

fn main() {
    println!("cargo:rerun-if-changed=src");

    let counter_path = Path::new("build_number.txt");

    let previous: u64 = fs::read_to_string(counter_path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0);
    let build_number = previous + 1;

    // A read-only checkout still builds; the counter just doesn't advance.
    if let Err(e) = fs::write(counter_path, build_number.to_string()) {
        println!("cargo:warning=Could not persist build number: {}", e);
    }

    let compiled_at = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();

    println!("cargo:rustc-env=SWEETSYNC_BUILD_NUMBER={}", build_number);
    println!("cargo:rustc-env=SWEETSYNC_BUILD_TIMESTAMP={}", compiled_at);
}

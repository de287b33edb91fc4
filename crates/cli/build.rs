//! Build script for the smartscan CLI
//!
//! Embeds build host, profile and time for `smartscan --version`

use std::env;

fn main() {
    built::write_built_file().expect("Failed to acquire build-time information");

    let host = env::var("HOST").unwrap_or_else(|_| "unknown".to_string());
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=SMARTSCAN_BUILD_HOST={}", host);
    println!("cargo:rustc-env=SMARTSCAN_BUILD_PROFILE={}", profile);
    println!(
        "cargo:rustc-env=SMARTSCAN_BUILD_TIME={}",
        chrono::Utc::now().to_rfc3339()
    );
}

//! Exposes GIT_HASH, BUILD_TIMESTAMP and BUILD_PROFILE to the crate at compile time.
//! Read back through `api::buildinfo::BuildInfo`.

use std::process::Command;

fn short_git_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8(output.stdout).ok()?;
    Some(hash.trim().to_string()).filter(|h| !h.is_empty())
}

fn main() {
    let build_env = [
        ("GIT_HASH", short_git_hash().unwrap_or_else(|| "unknown".to_string())),
        (
            "BUILD_TIMESTAMP",
            chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        ),
        (
            "BUILD_PROFILE",
            std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string()),
        ),
    ];

    for (key, value) in build_env {
        println!("cargo:rustc-env={}={}", key, value);
    }
    // No rerun-if-changed: the timestamp should track every rebuild
}

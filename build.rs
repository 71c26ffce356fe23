// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=CAMERA_PREVIEW_VERSION");

    // Packagers can pin the version without a git checkout
    let version = std::env::var("CAMERA_PREVIEW_VERSION")
        .ok()
        .or_else(git_version)
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// `0.1.0-abcdef1` at a tag, `0.1.0-dirty-abcdef1` past it, or the bare hash
fn git_version() -> Option<String> {
    let hash = git(&["rev-parse", "--short", "HEAD"])?;

    let Some(described) = git(&["describe", "--tags", "--match", "v*"]) else {
        return Some(format!("{}-{}", env!("CARGO_PKG_VERSION"), hash));
    };
    let described = described.strip_prefix('v').unwrap_or(&described);

    // "0.1.0-5-gabcdef1" means 5 commits after the tag
    let parts: Vec<&str> = described.rsplitn(3, '-').collect();
    if parts.len() == 3 {
        Some(format!("{}-dirty-{}", parts[2], hash))
    } else {
        Some(format!("{}-{}", described, hash))
    }
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}

use std::path::Path;
use std::process::Command;

/// Embeds `git describe` output so `stylusnote --version` names the build.
fn main() {
    let describe = Command::new("git")
        .args(["describe", "--always", "--dirty", "--abbrev=8"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| "unknown".into());

    println!("cargo:rustc-env=STYLUSNOTE_GIT_HASH={describe}");

    // Worktrees store `.git` as a file; only plain checkouts get rerun hints.
    for watched in [".git/HEAD", ".git/index", ".git/packed-refs"] {
        if Path::new(watched).exists() {
            println!("cargo:rerun-if-changed={watched}");
        }
    }
}

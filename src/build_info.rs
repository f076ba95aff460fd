//! Build-time information
//!
//! Metadata captured by `build.rs` at compile time. Git values are optional
//! because the crate may be built from a source archive.

/// Build timestamp (when the binary was compiled)
pub const BUILD_TIMESTAMP: &str = env!("VERGEN_BUILD_TIMESTAMP");

/// Cargo optimization level (0, 1, 2, 3, s, z)
pub const CARGO_OPT_LEVEL: &str = env!("VERGEN_CARGO_OPT_LEVEL");

/// Target triple (e.g., x86_64-unknown-linux-gnu)
pub const CARGO_TARGET_TRIPLE: &str = env!("VERGEN_CARGO_TARGET_TRIPLE");

/// Rust compiler version (e.g., 1.85.0)
pub const RUSTC_SEMVER: &str = env!("VERGEN_RUSTC_SEMVER");

/// Rust channel (stable, beta, or nightly)
pub const RUSTC_CHANNEL: &str = env!("VERGEN_RUSTC_CHANNEL");

/// Git commit SHA, when built from a checkout
pub const GIT_SHA: Option<&str> = option_env!("VERGEN_GIT_SHA");

/// Git branch name, when built from a checkout
pub const GIT_BRANCH: Option<&str> = option_env!("VERGEN_GIT_BRANCH");

/// Version string shown by `--version --long`
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\nBuilt: ",
    env!("VERGEN_BUILD_TIMESTAMP"),
    "\nTarget: ",
    env!("VERGEN_CARGO_TARGET_TRIPLE"),
    "\nRustc: ",
    env!("VERGEN_RUSTC_SEMVER"),
    " (",
    env!("VERGEN_RUSTC_CHANNEL"),
    ")"
);

/// Returns the first 8 characters of the git SHA, or "unknown"
pub fn git_sha_short() -> &'static str {
    match GIT_SHA {
        Some(sha) if sha.len() >= 8 => &sha[..8],
        Some(sha) => sha,
        None => "unknown",
    }
}

/// Returns the git branch, or "unknown"
pub fn git_branch() -> &'static str {
    GIT_BRANCH.unwrap_or("unknown")
}

/// Returns a one-line version string for report headers
///
/// Format: `{pkg_version} ({branch}@{sha}, {target_triple}-opt{opt_level})`
pub fn version_string() -> String {
    format!(
        "{} ({}@{}, {}-opt{})",
        env!("CARGO_PKG_VERSION"),
        git_branch(),
        git_sha_short(),
        CARGO_TARGET_TRIPLE,
        CARGO_OPT_LEVEL
    )
}

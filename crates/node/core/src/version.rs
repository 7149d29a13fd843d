//! Version information for the range host.

/// The version string from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The git commit SHA, when provided at build time.
pub const GIT_SHA: &str = match option_env!("RANGEHOST_GIT_SHA") {
    Some(sha) => sha,
    None => "unknown",
};

/// Version and commit, as shown by `--version` and the startup banner.
pub fn long_version() -> String {
    format!("Version: {VERSION}\nCommit SHA: {GIT_SHA}")
}

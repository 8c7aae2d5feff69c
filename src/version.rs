//! Build metadata.
//!
//! `API_HOST_GIT_HASH` and `API_HOST_BUILD_TIMESTAMP` are read from the build
//! environment, so packaging can stamp them without touching the source.

use serde::Serialize;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const GIT_HASH: &str = match option_env!("API_HOST_GIT_HASH") {
    Some(hash) => hash,
    None => "unknown",
};

pub const BUILT_TIMESTAMP: &str = match option_env!("API_HOST_BUILD_TIMESTAMP") {
    Some(timestamp) => timestamp,
    None => "unknown",
};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub built: &'static str,
}

pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: VERSION,
        git_hash: GIT_HASH,
        built: BUILT_TIMESTAMP,
    }
}

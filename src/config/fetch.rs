//! Source fetch configuration.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CORRELATION_HEADER, DEFAULT_FETCH_SLOTS, DEFAULT_FETCH_TIMEOUT_SECS,
    DEFAULT_MAX_SOURCE_BYTES,
};

fn default_slots() -> usize {
    DEFAULT_FETCH_SLOTS
}

fn default_timeout() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

fn default_max_source_bytes() -> u64 {
    DEFAULT_MAX_SOURCE_BYTES
}

fn default_correlation_header() -> String {
    DEFAULT_CORRELATION_HEADER.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchConfig {
    /// Concurrent fetch + transform operations
    #[serde(default = "default_slots")]
    pub slots: usize,
    /// Outbound fetch timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_max_source_bytes")]
    pub max_source_bytes: u64,
    /// Base URL for relative locators; forwarding headers are used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_base_url: Option<String>,
    /// Header carrying the correlation identifier, inbound and outbound
    #[serde(default = "default_correlation_header")]
    pub correlation_header: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            slots: default_slots(),
            timeout: default_timeout(),
            max_source_bytes: default_max_source_bytes(),
            upstream_base_url: None,
            correlation_header: default_correlation_header(),
        }
    }
}

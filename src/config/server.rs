//! Server configuration types.
//!
//! Listen address, Pingora worker threads, and the per-request and shutdown
//! deadlines. Default values are sourced from `crate::constants`.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ADDRESS, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SHUTDOWN_TIMEOUT_SECS,
    DEFAULT_THREADS,
};

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

// Default worker thread count
fn default_threads() -> usize {
    DEFAULT_THREADS
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_shutdown_timeout() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Number of worker threads (default: 4)
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Seconds before a request is cancelled (answered with 499)
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    /// Seconds to wait for in-flight work on shutdown
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            threads: default_threads(),
            request_timeout: default_request_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl ServerConfig {
    /// `address:port` as given to the TCP listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

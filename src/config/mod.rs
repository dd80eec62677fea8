// Configuration module

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

mod fetch;
mod server;

pub use fetch::FetchConfig;
pub use server::ServerConfig;

pub use crate::image_optimizer::ImageConfig;
pub use crate::logging::{LogFormat, LoggingConfig};

/// Process-wide configuration, fixed at startup
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Command-line values that take precedence over the file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub fetch_slots: Option<usize>,
    /// `host:port`
    pub listen: Option<String>,
}

impl Config {
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, String> {
        // Replace ${VAR_NAME} with environment variable values
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;

        // Every referenced variable must be set
        for caps in re.captures_iter(yaml) {
            let var_name = &caps[1];
            std::env::var(var_name).map_err(|_| {
                format!(
                    "Environment variable '{}' is referenced but not set",
                    var_name
                )
            })?;
        }

        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        });

        // An empty file means all defaults
        if substituted.trim().is_empty() {
            return Ok(Config::default());
        }

        serde_yaml::from_str(&substituted).map_err(|e| e.to_string())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_with_env(&yaml)
    }

    /// Apply command-line overrides on top of the loaded values
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) -> Result<(), String> {
        if let Some(max_width) = overrides.max_width {
            self.image.max_width = max_width;
        }
        if let Some(max_height) = overrides.max_height {
            self.image.max_height = max_height;
        }
        if let Some(slots) = overrides.fetch_slots {
            self.fetch.slots = slots;
        }
        if let Some(listen) = &overrides.listen {
            let (address, port) = listen
                .rsplit_once(':')
                .ok_or_else(|| format!("Listen address '{}' must be host:port", listen))?;
            let port = port
                .parse::<u16>()
                .map_err(|e| format!("Invalid port in listen address '{}': {}", listen, e))?;
            self.server.address = address.to_string();
            self.server.port = port;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.fetch.slots == 0 {
            return Err("fetch.slots must be at least 1".to_string());
        }

        if self.image.engine_threads == 0 {
            return Err("image.engine_threads must be at least 1".to_string());
        }

        if !(1..=100).contains(&self.image.quality) {
            return Err(format!(
                "image.quality must be between 1 and 100, got {}",
                self.image.quality
            ));
        }

        if self.server.threads == 0 {
            return Err("server.threads must be at least 1".to_string());
        }

        // A zero deadline would cancel every request before it starts
        if self.server.request_timeout == 0 {
            return Err("server.request_timeout must be at least 1 second".to_string());
        }

        if self.image.max_source_width == 0
            || self.image.max_source_height == 0
            || self.image.max_source_pixels == 0
        {
            return Err("image.max_source_* limits must be greater than 0".to_string());
        }

        if self.fetch.correlation_header.trim().is_empty() {
            return Err("fetch.correlation_header cannot be empty".to_string());
        }

        if let Some(base) = &self.fetch.upstream_base_url {
            let url = reqwest::Url::parse(base)
                .map_err(|e| format!("fetch.upstream_base_url '{}' is invalid: {}", base, e))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(format!(
                    "fetch.upstream_base_url '{}' must use http or https",
                    base
                ));
            }
        }

        Ok(())
    }
}

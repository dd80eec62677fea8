// Router module - maps an inbound path onto transform options and a source URL
//
// Paths look like `/{options}/{locator}`. The locator is either an absolute
// http(s) URL, used as-is, or a path resolved against the configured upstream
// base URL or, failing that, the X-Forwarded-Proto/X-Forwarded-Host headers.
// Forwarding headers are trusted as sent by the edge in front of the proxy.

use reqwest::Url;

use crate::error::ProxyError;
use crate::fetch::SourceRequest;
use crate::image_optimizer::{parse_options, OptionMap};

/// Forwarding headers of the inbound request
#[derive(Debug, Clone, Copy, Default)]
pub struct Forwarded<'a> {
    pub proto: &'a str,
    pub host: &'a str,
}

#[derive(Debug, Clone, Default)]
pub struct Router {
    upstream_base: Option<String>,
}

/// Split `/{options}/{locator...}` into its two parts
///
/// The locator keeps its embedded slashes and any query string.
pub fn split_path(path_and_query: &str) -> Result<(&str, &str), ProxyError> {
    let trimmed = path_and_query.strip_prefix('/').unwrap_or(path_and_query);
    match trimmed.split_once('/') {
        Some((options, locator)) if !locator.is_empty() => Ok((options, locator)),
        _ => Err(ProxyError::MalformedPath(format!(
            "expected /{{options}}/{{image}}, got '{}'",
            path_and_query
        ))),
    }
}

/// Whether the locator starts with an RFC 3986 scheme such as `http:`
fn has_scheme(locator: &str) -> bool {
    match locator.split_once(':') {
        Some((scheme, _)) => {
            scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

impl Router {
    pub fn new(upstream_base: Option<String>) -> Self {
        Router {
            upstream_base: upstream_base.map(|base| base.trim_end_matches('/').to_string()),
        }
    }

    pub fn upstream_base(&self) -> Option<&str> {
        self.upstream_base.as_deref()
    }

    /// Resolve a request path into parsed options and the source to fetch
    pub fn resolve(
        &self,
        path_and_query: &str,
        forwarded: Forwarded<'_>,
        correlation_id: &str,
    ) -> Result<(OptionMap, SourceRequest), ProxyError> {
        let (segment, locator) = split_path(path_and_query)?;
        let options = parse_options(segment)?;
        let url = self.locate(locator, forwarded)?;
        Ok((options, SourceRequest::new(url, correlation_id)))
    }

    fn locate(&self, locator: &str, forwarded: Forwarded<'_>) -> Result<Url, ProxyError> {
        match Url::parse(locator) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => return Ok(url),
            Ok(url) => {
                return Err(ProxyError::MalformedPath(format!(
                    "unsupported scheme '{}' in locator",
                    url.scheme()
                )))
            }
            Err(_) if !has_scheme(locator) => {}
            Err(e) => {
                return Err(ProxyError::MalformedPath(format!(
                    "invalid locator '{}': {}",
                    locator, e
                )))
            }
        }

        let target = match &self.upstream_base {
            Some(base) => format!("{}/{}", base, locator),
            None => format!("{}://{}/{}", forwarded.proto, forwarded.host, locator),
        };

        Url::parse(&target).map_err(|e| {
            ProxyError::MalformedPath(format!("cannot build source URL '{}': {}", target, e))
        })
    }
}

// Server module - Pingora server assembly and service lifecycle

use async_trait::async_trait;
use pingora::server::configuration::Opt as ServerOpt;
use pingora_core::server::{Server, ShutdownWatch};
use pingora_core::services::background::{background_service, BackgroundService};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::ProxyError;
use crate::pipeline::ImageService;
use crate::proxy::ResizeProxy;

/// Shuts the image service down when the server stops
///
/// Waits for the shutdown signal, drains the fetch slots (bounded by the
/// shutdown timeout) and then stops the transform engine.
pub struct ServiceLifecycle {
    service: Arc<ImageService>,
    shutdown_timeout: Duration,
}

impl ServiceLifecycle {
    pub fn new(service: Arc<ImageService>, shutdown_timeout: Duration) -> Self {
        Self {
            service,
            shutdown_timeout,
        }
    }
}

#[async_trait]
impl BackgroundService for ServiceLifecycle {
    async fn start(&self, mut shutdown: ShutdownWatch) {
        while !*shutdown.borrow() {
            if shutdown.changed().await.is_err() {
                break;
            }
        }

        tracing::info!(
            in_use = self.service.gate().in_use(),
            timeout_secs = self.shutdown_timeout.as_secs(),
            "Shutdown requested, draining in-flight work"
        );

        if self.service.shutdown(self.shutdown_timeout).await {
            tracing::info!("Image service stopped");
        } else {
            tracing::warn!(
                in_flight = self.service.engine().in_flight(),
                "Image service stopped with work still in flight"
            );
        }
    }
}

/// Shukusho HTTP server wrapper around Pingora
pub struct ShukushoServer {
    config: Arc<Config>,
    service: Arc<ImageService>,
}

impl ShukushoServer {
    /// Create the image service from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or transform engine cannot start.
    pub fn new(config: Config) -> Result<Self, ProxyError> {
        let service = Arc::new(ImageService::from_config(&config)?);
        Ok(Self {
            config: Arc::new(config),
            service,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn service(&self) -> &Arc<ImageService> {
        &self.service
    }

    pub fn proxy(&self) -> ResizeProxy {
        ResizeProxy::new(
            Arc::clone(&self.service),
            self.config.fetch.correlation_header.clone(),
        )
    }

    pub fn lifecycle(&self) -> ServiceLifecycle {
        ServiceLifecycle::new(
            Arc::clone(&self.service),
            Duration::from_secs(self.config.server.shutdown_timeout),
        )
    }

    /// Build the Pingora server with the proxy and lifecycle services registered
    pub fn into_server(self, opt: ServerOpt) -> Result<Server, ProxyError> {
        let mut server = Server::new(Some(opt))
            .map_err(|e| ProxyError::Config(format!("Failed to create Pingora server: {}", e)))?;
        server.bootstrap();

        let listen_addr = self.config.server.listen_addr();
        let mut proxy_service =
            pingora_proxy::http_proxy_service(&server.configuration, self.proxy());
        proxy_service.add_tcp(&listen_addr);
        proxy_service.threads = Some(self.config.server.threads);

        server.add_service(proxy_service);
        server.add_service(background_service("image service lifecycle", self.lifecycle()));

        tracing::info!(
            address = %listen_addr,
            threads = self.config.server.threads,
            fetch_slots = self.config.fetch.slots,
            "Server assembled"
        );

        Ok(server)
    }
}

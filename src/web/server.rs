//! Web server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;

use crate::config::{ServerConfig, WebConfig};
use crate::{BottleError, Result};

use super::handlers::AppState;
use super::middleware::SubmitRateLimit;
use super::router::create_router;

/// Web server for the bottle API.
pub struct WebServer {
    addr: SocketAddr,
    app_state: Arc<AppState>,
    web_config: WebConfig,
}

impl WebServer {
    /// Create a new web server.
    pub fn new(server: &ServerConfig, web: &WebConfig, app_state: Arc<AppState>) -> Result<Self> {
        let addr = format!("{}:{}", server.host, server.port)
            .parse()
            .map_err(|e| {
                BottleError::Config(format!(
                    "invalid server address {}:{}: {}",
                    server.host, server.port, e
                ))
            })?;

        Ok(Self {
            addr,
            app_state,
            web_config: web.clone(),
        })
    }

    /// Get the configured address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn build_router(&self) -> Router {
        let throttle = SubmitRateLimit::new(self.web_config.submit_rate_limit);
        throttle.start_cleanup_task();

        create_router(
            self.app_state.clone(),
            &self.web_config.cors_origins,
            throttle,
        )
        .layer(CompressionLayer::new())
    }

    /// Run the web server until it fails.
    pub async fn run(self) -> Result<()> {
        let router = self.build_router();
        let listener = TcpListener::bind(self.addr).await?;
        tracing::info!("Web server listening on http://{}", listener.local_addr()?);

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
        Ok(())
    }

    /// Start serving in the background and return the bound address.
    ///
    /// Binding to port 0 picks a free port.
    pub async fn run_with_addr(self) -> Result<SocketAddr> {
        let router = self.build_router();
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Web server listening on http://{}", local_addr);

        tokio::spawn(async move {
            let service = router.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, service).await {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bottle::BottleSettings;
    use crate::mailer::MemoryMailer;
    use crate::Database;

    async fn test_state() -> Arc<AppState> {
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        Arc::new(AppState::new(
            db,
            Arc::new(MemoryMailer::new()),
            BottleSettings::default(),
        ))
    }

    fn local_server() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        }
    }

    #[tokio::test]
    async fn test_web_server_new() {
        let server =
            WebServer::new(&local_server(), &WebConfig::default(), test_state().await).unwrap();
        assert_eq!(server.addr().ip().to_string(), "127.0.0.1");
    }

    #[tokio::test]
    async fn test_web_server_invalid_host() {
        let config = ServerConfig {
            host: "not a host".to_string(),
            port: 8080,
        };
        let result = WebServer::new(&config, &WebConfig::default(), test_state().await);
        assert!(matches!(result, Err(BottleError::Config(_))));
    }

    #[tokio::test]
    async fn test_web_server_run() {
        let server =
            WebServer::new(&local_server(), &WebConfig::default(), test_state().await).unwrap();
        let addr = server.run_with_addr().await.unwrap();

        let resp = reqwest::Client::new()
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .unwrap();

        assert!(resp.status().is_success());
        assert_eq!(resp.text().await.unwrap(), "OK");
    }
}

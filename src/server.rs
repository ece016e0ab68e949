//! Scrape server.
//!
//! Every GET request, on any path, runs one full authenticate, fetch and
//! compute cycle and answers with the resulting metric set. A failed cycle
//! is logged and answered with 503; the listener keeps serving.

use std::future::Future;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use chrono::Utc;
use log::{debug, error, info};
use tokio::net::TcpListener;

use crate::auth::TokenProvider;
use crate::config::Settings;
use crate::error::ExporterError;
use crate::graph::GraphClient;
use crate::metrics::{collect_samples, CredentialMetrics, CONTENT_TYPE};

/// Log target of the per-application lines written when `verbose` is set.
pub const VERBOSE_TARGET: &str = "aad_app_exporter::verbose";

/// Scrape cycle with its injected settings and upstream clients.
pub struct Exporter {
    settings: Settings,
    tokens: TokenProvider,
    graph: GraphClient,
}

impl Exporter {
    /// Builds the shared HTTP client, bounded by the configured timeout, and
    /// the token and Graph clients on top of it.
    pub fn new(settings: Settings) -> Result<Self, ExporterError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| ExporterError::HttpClient { source })?;

        Ok(Exporter {
            tokens: TokenProvider::new(client.clone(), &settings),
            graph: GraphClient::new(client, &settings),
            settings,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Runs one scrape cycle and returns the text exposition.
    pub async fn scrape(&self) -> Result<String, ExporterError> {
        let token = self.tokens.acquire_token().await?;
        let applications = self.graph.list_applications(&token).await?;
        let samples = collect_samples(&applications, Utc::now());

        if self.settings.verbose {
            for sample in &samples {
                info!(target: VERBOSE_TARGET, "{}", sample.verbose_line());
            }
        }

        let metrics = CredentialMetrics::new()?;
        metrics.record(&samples);
        debug!(
            "Scraped {} applications, {} credential samples",
            applications.len(),
            samples.len()
        );
        metrics.encode()
    }
}

/// Router answering every path with a scrape.
pub fn router(exporter: Arc<Exporter>) -> Router {
    Router::new().fallback(handle_scrape).with_state(exporter)
}

async fn handle_scrape(
    State(exporter): State<Arc<Exporter>>,
    method: Method,
    uri: Uri,
) -> Response {
    if method != Method::GET {
        return (
            StatusCode::NOT_IMPLEMENTED,
            format!("Unsupported method ({})\n", method),
        )
            .into_response();
    }

    debug!("Scrape requested on {}", uri.path());

    match exporter.scrape().await {
        Ok(body) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!("Scrape failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                format!("scrape failed: {}\n", e),
            )
                .into_response()
        }
    }
}

/// Binds `{listen_address}:{listen_port}` and serves scrapes until
/// `shutdown` resolves.
pub async fn serve<F>(exporter: Arc<Exporter>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let settings = exporter.settings();
    let listener = TcpListener::bind((settings.listen_address.as_str(), settings.listen_port)).await?;
    info!(
        "Prometheus metrics server running on http://{}/metrics",
        settings.bind_address()
    );

    axum::serve(listener, router(exporter))
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_exporter_keeps_settings() {
        let mut settings = Settings::new("contoso", "app", "secret");
        settings.timeout = Duration::from_secs(3);
        settings.verbose = true;

        let exporter = Exporter::new(settings).unwrap();
        assert_eq!(exporter.settings().timeout, Duration::from_secs(3));
        assert!(exporter.settings().verbose);
    }
}

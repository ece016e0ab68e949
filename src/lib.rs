//! Prometheus exporter for Azure AD application credential expiration.
//!
//! On every scrape the exporter requests an app-only token with the OAuth2
//! client-credentials grant, lists the tenant's application registrations
//! from Microsoft Graph, and reports the days remaining before the first
//! password credential of each active application expires, as the
//! `azure_app_credential_days_remaining` gauge.
//!
//! ```no_run
//! use std::sync::Arc;
//! use aad_app_exporter::{server, Exporter, Settings};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::new("tenant-id", "client-id", "client-secret");
//! let exporter = Arc::new(Exporter::new(settings)?);
//! server::serve(exporter, async {
//!     let _ = tokio::signal::ctrl_c().await;
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod server;

pub use config::{Config, ConfigError, Settings};
pub use error::ExporterError;
pub use graph::{Application, PasswordCredential};
pub use metrics::CredentialSample;
pub use server::Exporter;

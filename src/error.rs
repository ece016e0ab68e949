//! Error types for credential scraping.
//!
//! This module defines the errors that can occur while acquiring a token,
//! listing applications from Microsoft Graph, or rendering the metric set.
//! Every variant is per-scrape: the server turns them into an HTTP error
//! response and keeps running.

use thiserror::Error;

/// Error type for a failed scrape cycle.
#[derive(Debug, Error)]
pub enum ExporterError {
    /// The token endpoint refused the client credentials or returned no token
    #[error("Authentication failed for tenant {tenant_id}: {reason}")]
    Authentication {
        /// The tenant the token was requested for
        tenant_id: String,
        /// Why the token could not be obtained
        reason: String,
    },

    /// The request never produced a response (DNS, connect, TLS, body read)
    #[error("Request to {endpoint} failed: {source}")]
    Request {
        /// The URL that was called
        endpoint: String,
        /// The underlying transport error
        #[source]
        source: reqwest::Error,
    },

    /// The configured timeout elapsed before the upstream answered
    #[error("Request to {endpoint} timed out")]
    Timeout {
        /// The URL that was called
        endpoint: String,
    },

    /// The upstream answered with a non-success status
    #[error("{endpoint} returned HTTP {status}: {body}")]
    UpstreamStatus {
        /// The URL that was called
        endpoint: String,
        /// HTTP status code
        status: u16,
        /// Raw response body, kept for diagnostics
        body: String,
    },

    /// The upstream body could not be understood at all
    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse {
        /// The URL that was called
        endpoint: String,
        /// Description of what went wrong
        reason: String,
    },

    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {source}")]
    HttpClient {
        /// The underlying builder error
        #[source]
        source: reqwest::Error,
    },

    /// Registering or encoding metrics failed
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl ExporterError {
    /// Classifies a transport error from a call to `endpoint`.
    ///
    /// Timeouts get their own variant so they read clearly in logs; every
    /// other failure keeps the original error as its source.
    pub fn from_transport(endpoint: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                endpoint: endpoint.to_string(),
            }
        } else {
            Self::Request {
                endpoint: endpoint.to_string(),
                source,
            }
        }
    }
}

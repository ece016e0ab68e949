//! OAuth2 client-credentials token acquisition for Microsoft Graph.
//!
//! A fresh token is requested for every scrape; nothing is cached between
//! calls.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::ExporterError;

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'a str,
    scope: &'a str,
}

/// Subset of the token endpoint response we read.
///
/// A rejected request may still come back as JSON carrying `error` and
/// `error_description` instead of a token.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Requests app-only bearer tokens for the Graph API.
pub struct TokenProvider {
    client: reqwest::Client,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    token_url: String,
    scope: String,
}

impl TokenProvider {
    /// Creates a provider for the tenant in `settings`.
    ///
    /// `client` should carry the configured timeout; the provider adds none
    /// of its own.
    pub fn new(client: reqwest::Client, settings: &Settings) -> Self {
        TokenProvider {
            client,
            tenant_id: settings.tenant_id.clone(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            token_url: format!("{}/oauth2/v2.0/token", settings.authority()),
            scope: settings.graph_scope(),
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Performs one client-credentials grant and returns the access token.
    ///
    /// The body is read before the status is checked so the AADSTS message
    /// of a rejection ends up in the error.
    pub async fn acquire_token(&self) -> Result<String, ExporterError> {
        let form = TokenRequest {
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            grant_type: "client_credentials",
            scope: &self.scope,
        };

        debug!("Requesting token from {}", self.token_url);

        let response = self
            .client
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| ExporterError::from_transport(&self.token_url, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExporterError::from_transport(&self.token_url, e))?;

        let parsed: Option<TokenResponse> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let reason = match parsed {
                Some(TokenResponse {
                    error: Some(error),
                    error_description,
                    ..
                }) => match error_description {
                    Some(description) => format!("{} ({}): {}", error, status, description),
                    None => format!("{} ({})", error, status),
                },
                _ => format!("token request failed ({}): {}", status, body),
            };
            return Err(ExporterError::Authentication {
                tenant_id: self.tenant_id.clone(),
                reason,
            });
        }

        match parsed {
            Some(TokenResponse {
                access_token: Some(token),
                ..
            }) => Ok(token),
            Some(_) => Err(ExporterError::Authentication {
                tenant_id: self.tenant_id.clone(),
                reason: "no access_token in token response".to_string(),
            }),
            None => Err(ExporterError::InvalidResponse {
                endpoint: self.token_url.clone(),
                reason: "token response is not valid JSON".to_string(),
            }),
        }
    }
}

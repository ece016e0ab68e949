//! Microsoft Graph application listing.
//!
//! Upstream data is read leniently, field by field: a body without a `value`
//! array is an empty list, a field with an unexpected type reads as absent,
//! and only the first password credential of a record is ever looked at.

use std::collections::HashSet;

use log::{debug, warn};
use serde_json::Value;

use crate::config::Settings;
use crate::error::ExporterError;

const NEXT_LINK: &str = "@odata.nextLink";

/// An application registration as returned by `/v1.0/applications`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Application {
    pub display_name: Option<String>,
    pub app_id: Option<String>,
    /// `None` when the field is absent, `Some(None)` when it is explicitly
    /// null, `Some(Some(_))` for any other value.
    pub deleted_date_time: Option<Option<String>>,
    pub first_password_credential: Option<PasswordCredential>,
}

/// A client-secret style credential.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PasswordCredential {
    pub key_id: Option<String>,
    pub end_date_time: Option<String>,
}

impl Application {
    /// Reads one record of the `value` array. Returns `None` only when the
    /// record is not a JSON object.
    pub fn from_value(record: &Value) -> Option<Self> {
        let record = record.as_object()?;

        let deleted_date_time = record.get("deletedDateTime").map(|value| match value {
            Value::Null => None,
            Value::String(timestamp) => Some(timestamp.clone()),
            other => Some(other.to_string()),
        });

        let first_password_credential = record
            .get("passwordCredentials")
            .and_then(Value::as_array)
            .and_then(|credentials| credentials.first())
            .and_then(PasswordCredential::from_value);

        Some(Application {
            display_name: string_field(record.get("displayName")),
            app_id: string_field(record.get("appId")),
            deleted_date_time,
            first_password_credential,
        })
    }

    /// Only applications whose `deletedDateTime` is present and null count.
    /// A missing field is treated as not eligible.
    pub fn is_active(&self) -> bool {
        matches!(self.deleted_date_time, Some(None))
    }
}

impl PasswordCredential {
    pub fn from_value(credential: &Value) -> Option<Self> {
        let credential = credential.as_object()?;
        Some(PasswordCredential {
            key_id: string_field(credential.get("keyId")),
            end_date_time: string_field(credential.get("endDateTime")),
        })
    }
}

fn string_field(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(String::from)
}

/// One page of the application list.
#[derive(Debug, Default, PartialEq)]
pub struct ApplicationPage {
    pub applications: Vec<Application>,
    pub next_link: Option<String>,
}

impl ApplicationPage {
    /// Reads a Graph collection body.
    pub fn from_value(body: &Value) -> Self {
        let applications = match body.get("value").and_then(Value::as_array) {
            Some(records) => records
                .iter()
                .filter_map(|record| {
                    let app = Application::from_value(record);
                    if app.is_none() {
                        warn!("Skipping application record that is not an object: {}", record);
                    }
                    app
                })
                .collect(),
            None => Vec::new(),
        };

        let next_link = body
            .get(NEXT_LINK)
            .and_then(Value::as_str)
            .map(String::from);

        ApplicationPage {
            applications,
            next_link,
        }
    }
}

/// Client for the Graph applications endpoint.
pub struct GraphClient {
    client: reqwest::Client,
    applications_url: String,
    follow_next_link: bool,
}

impl GraphClient {
    pub fn new(client: reqwest::Client, settings: &Settings) -> Self {
        GraphClient {
            client,
            applications_url: format!("{}/v1.0/applications", settings.graph_endpoint),
            follow_next_link: settings.follow_next_link,
        }
    }

    pub fn applications_url(&self) -> &str {
        &self.applications_url
    }

    /// Lists application registrations.
    ///
    /// Reads the first page only, unless `follow_next_link` is set, in which
    /// case every `@odata.nextLink` is followed until one repeats.
    pub async fn list_applications(&self, token: &str) -> Result<Vec<Application>, ExporterError> {
        let mut page = self.fetch_page(&self.applications_url, token).await?;
        let mut applications = std::mem::take(&mut page.applications);
        let mut visited = HashSet::from([self.applications_url.clone()]);

        while let Some(next_link) = page.next_link.take() {
            if !self.follow_next_link {
                warn!(
                    "Application list is paginated; only the first {} records were read",
                    applications.len()
                );
                break;
            }
            if !visited.insert(next_link.clone()) {
                warn!("Stopping pagination: {} was already fetched", next_link);
                break;
            }
            page = self.fetch_page(&next_link, token).await?;
            applications.append(&mut page.applications);
        }

        debug!("Fetched {} application records", applications.len());
        Ok(applications)
    }

    async fn fetch_page(&self, url: &str, token: &str) -> Result<ApplicationPage, ExporterError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| ExporterError::from_transport(url, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExporterError::from_transport(url, e))?;

        if !status.is_success() {
            return Err(ExporterError::UpstreamStatus {
                endpoint: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let value: Value =
            serde_json::from_str(&body).map_err(|e| ExporterError::InvalidResponse {
                endpoint: url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(ApplicationPage::from_value(&value))
    }
}

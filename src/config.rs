//! Configuration management for the exporter.
//!
//! This module handles loading, parsing, and merging configuration from TOML
//! (or JSON) files and command-line arguments, and validating the result into
//! the [`Settings`] the exporter runs with.
//!
//! # Configuration Precedence
//!
//! 1. Default values (lowest priority)
//! 2. Configuration file (specified with --config)
//! 3. Command-line arguments and their environment fallbacks (highest priority)
//!
//! # Example Configuration File
//!
//! ```toml
//! tenant_id = "00000000-0000-0000-0000-000000000000"
//! client_id = "11111111-1111-1111-1111-111111111111"
//! client_secret = "change-me"
//! timeout = 10
//! verbose = false
//!
//! [server]
//! listen = "0.0.0.0"
//! port = 5001
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_LISTEN_PORT: u16 = 5001;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
pub const DEFAULT_GRAPH_ENDPOINT: &str = "https://graph.microsoft.com";

/// Partial configuration as read from a file or the command line.
///
/// All fields are optional to support partial configuration and merging.
/// Missing values will be filled in by defaults or overridden by CLI arguments.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Config {
    /// Azure AD tenant ID
    pub tenant_id: Option<String>,
    /// Client ID of the app registration used to read the directory
    pub client_id: Option<String>,
    /// Client secret of that app registration
    pub client_secret: Option<String>,
    /// Upstream request timeout in seconds
    pub timeout: Option<u64>,
    /// Log one line per scraped application
    pub verbose: Option<bool>,
    /// Follow `@odata.nextLink` when Graph paginates the application list
    pub follow_next_link: Option<bool>,
    /// Scrape listener configuration
    pub server: Option<ServerConfig>,
    /// Identity platform and Graph endpoints
    pub endpoints: Option<EndpointsConfig>,
}

/// Scrape listener configuration.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0")
    pub listen: Option<String>,
    /// Port to listen on
    pub port: Option<u16>,
}

/// Cloud endpoints, overridable for sovereign clouds.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct EndpointsConfig {
    /// Identity platform host (e.g., "https://login.microsoftonline.us")
    pub authority_host: Option<String>,
    /// Microsoft Graph host (e.g., "https://graph.microsoft.us")
    pub graph_endpoint: Option<String>,
}

impl Config {
    /// Loads configuration from a TOML file, or a JSON file when the path
    /// ends in `.json`.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully parsed configuration
    /// * `Err(ConfigError::Io)` - File could not be read
    /// * `Err(ConfigError::Parse)` - File contents are invalid
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use aad_app_exporter::config::Config;
    /// let config = Config::from_file("aad-app-exporter.toml")?;
    /// # Ok::<(), aad_app_exporter::config::ConfigError>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;

        let is_json = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        }
    }

    /// Creates a configuration holding every default value.
    ///
    /// The three credentials have no default and stay `None`.
    pub fn defaults() -> Self {
        Config {
            tenant_id: None,
            client_id: None,
            client_secret: None,
            timeout: Some(DEFAULT_TIMEOUT_SECS),
            verbose: Some(false),
            follow_next_link: Some(false),
            server: Some(ServerConfig {
                listen: Some(DEFAULT_LISTEN_ADDRESS.to_string()),
                port: Some(DEFAULT_LISTEN_PORT),
            }),
            endpoints: Some(EndpointsConfig {
                authority_host: Some(DEFAULT_AUTHORITY_HOST.to_string()),
                graph_endpoint: Some(DEFAULT_GRAPH_ENDPOINT.to_string()),
            }),
        }
    }

    /// Merges this configuration with another, prioritizing the other's values.
    ///
    /// For each field, if the `other` config has a value (Some), it overrides
    /// this config's value. If the `other` value is None, keeps the current value.
    pub fn merge_with(mut self, other: Config) -> Self {
        if other.tenant_id.is_some() {
            self.tenant_id = other.tenant_id;
        }
        if other.client_id.is_some() {
            self.client_id = other.client_id;
        }
        if other.client_secret.is_some() {
            self.client_secret = other.client_secret;
        }
        if other.timeout.is_some() {
            self.timeout = other.timeout;
        }
        if other.verbose.is_some() {
            self.verbose = other.verbose;
        }
        if other.follow_next_link.is_some() {
            self.follow_next_link = other.follow_next_link;
        }
        if let Some(other_server) = other.server {
            if let Some(ref mut self_server) = self.server {
                if other_server.listen.is_some() {
                    self_server.listen = other_server.listen;
                }
                if other_server.port.is_some() {
                    self_server.port = other_server.port;
                }
            } else {
                self.server = Some(other_server);
            }
        }
        if let Some(other_endpoints) = other.endpoints {
            if let Some(ref mut self_endpoints) = self.endpoints {
                if other_endpoints.authority_host.is_some() {
                    self_endpoints.authority_host = other_endpoints.authority_host;
                }
                if other_endpoints.graph_endpoint.is_some() {
                    self_endpoints.graph_endpoint = other_endpoints.graph_endpoint;
                }
            } else {
                self.endpoints = Some(other_endpoints);
            }
        }
        self
    }

    /// Validates the merged configuration into [`Settings`].
    ///
    /// Fails when any of tenant, client or secret is missing. Values that
    /// were never set anywhere fall back to the defaults, so this can be
    /// called on a config that was not merged over [`Config::defaults`].
    pub fn validate(self) -> Result<Settings, ConfigError> {
        let mut missing = Vec::new();
        if self.tenant_id.is_none() {
            missing.push("tenant");
        }
        if self.client_id.is_none() {
            missing.push("client");
        }
        if self.client_secret.is_none() {
            missing.push("secret");
        }

        let (tenant_id, client_id, client_secret) =
            match (self.tenant_id, self.client_id, self.client_secret) {
                (Some(tenant), Some(client), Some(secret)) => (tenant, client, secret),
                _ => {
                    return Err(ConfigError::Validation(format!(
                        "Missing required configuration parameters: {}",
                        missing.join(", ")
                    )))
                }
            };

        let server = self.server.unwrap_or_default();
        let endpoints = self.endpoints.unwrap_or_default();

        Ok(Settings {
            tenant_id,
            client_id,
            client_secret,
            timeout: Duration::from_secs(self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            verbose: self.verbose.unwrap_or(false),
            listen_address: server
                .listen
                .unwrap_or_else(|| DEFAULT_LISTEN_ADDRESS.to_string()),
            listen_port: server.port.unwrap_or(DEFAULT_LISTEN_PORT),
            authority_host: parse_endpoint(
                "authority_host",
                endpoints.authority_host.as_deref(),
                DEFAULT_AUTHORITY_HOST,
            )?,
            graph_endpoint: parse_endpoint(
                "graph_endpoint",
                endpoints.graph_endpoint.as_deref(),
                DEFAULT_GRAPH_ENDPOINT,
            )?,
            follow_next_link: self.follow_next_link.unwrap_or(false),
        })
    }

    /// Generates an example configuration file in TOML format.
    ///
    /// Creates a sample configuration with all available options set to
    /// example values. Useful for bootstrapping a new configuration file.
    pub fn example_toml() -> String {
        let example = Config {
            tenant_id: Some("00000000-0000-0000-0000-000000000000".to_string()),
            client_id: Some("11111111-1111-1111-1111-111111111111".to_string()),
            client_secret: Some("change-me".to_string()),
            ..Config::defaults()
        };

        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# Error generating example".to_string())
    }
}

/// Checks that an endpoint parses as a URL and strips any trailing slash.
fn parse_endpoint(field: &str, value: Option<&str>, default: &str) -> Result<String, ConfigError> {
    let raw = value.unwrap_or(default);
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::Validation(format!("Invalid {field} '{raw}': {e}")))?;
    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Validated settings the exporter runs with.
#[derive(Clone)]
pub struct Settings {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    /// Bounds both the token request and every Graph request
    pub timeout: Duration,
    pub verbose: bool,
    pub listen_address: String,
    pub listen_port: u16,
    /// Identity platform host, without trailing slash
    pub authority_host: String,
    /// Microsoft Graph host, without trailing slash
    pub graph_endpoint: String,
    pub follow_next_link: bool,
}

impl Settings {
    /// Settings for the given credentials with every other value defaulted.
    pub fn new(tenant_id: &str, client_id: &str, client_secret: &str) -> Self {
        Settings {
            tenant_id: tenant_id.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            verbose: false,
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
            listen_port: DEFAULT_LISTEN_PORT,
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            graph_endpoint: DEFAULT_GRAPH_ENDPOINT.to_string(),
            follow_next_link: false,
        }
    }

    /// `{authority_host}/{tenant_id}`
    pub fn authority(&self) -> String {
        format!("{}/{}", self.authority_host, self.tenant_id)
    }

    /// `{graph_endpoint}/.default`
    pub fn graph_scope(&self) -> String {
        format!("{}/.default", self.graph_endpoint)
    }

    /// Listening address in `host:port` form.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listen_address, self.listen_port)
    }
}

// The secret never reaches logs.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("timeout", &self.timeout)
            .field("verbose", &self.verbose)
            .field("listen_address", &self.listen_address)
            .field("listen_port", &self.listen_port)
            .field("authority_host", &self.authority_host)
            .field("graph_endpoint", &self.graph_endpoint)
            .field("follow_next_link", &self.follow_next_link)
            .finish()
    }
}

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("IO Error: {0}")]
    Io(String),
    /// TOML or JSON parsing error (invalid syntax, type mismatch, etc.)
    #[error("Parse Error: {0}")]
    Parse(String),
    /// Validation error (missing required fields, invalid values, etc.)
    #[error("Validation Error: {0}")]
    Validation(String),
}

//! Credential expiry metrics.
//!
//! This module turns Graph application records into credential samples and
//! renders them in the Prometheus text exposition format.
//!
//! # Submodules
//!
//! - `credentials` - Eligibility rules and remaining-days computation
//! - `prom` - Per-scrape Prometheus registry and text encoding

pub mod credentials;
pub mod prom;

pub use credentials::{collect_samples, parse_end_date_time, remaining_days, CredentialSample};
pub use prom::{CredentialMetrics, CONTENT_TYPE, DAYS_REMAINING_METRIC};

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

use super::credentials::CredentialSample;
use crate::error::ExporterError;

pub const DAYS_REMAINING_METRIC: &str = "azure_app_credential_days_remaining";
pub const DAYS_REMAINING_HELP: &str =
    "Number of days remaining before Azure application credential expires";
pub const LABELS: [&str; 3] = ["app_name", "app_id", "credential_id"];

/// Content type of the text exposition format served to scrapers.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Metric set for a single scrape.
///
/// A new instance is built for every scrape so label sets of applications
/// that disappeared upstream are not carried over.
pub struct CredentialMetrics {
    registry: Registry,
    days_remaining: GaugeVec,
}

impl CredentialMetrics {
    pub fn new() -> Result<Self, ExporterError> {
        let registry = Registry::new();
        let days_remaining =
            GaugeVec::new(Opts::new(DAYS_REMAINING_METRIC, DAYS_REMAINING_HELP), &LABELS)?;
        registry.register(Box::new(days_remaining.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(CredentialMetrics {
            registry,
            days_remaining,
        })
    }

    /// Sets one gauge per sample; a repeated label set keeps the last value.
    pub fn record(&self, samples: &[CredentialSample]) {
        for sample in samples {
            self.days_remaining
                .with_label_values(&[
                    sample.app_name.as_str(),
                    sample.app_id.as_str(),
                    sample.credential_id.as_str(),
                ])
                .set(sample.days_remaining);
        }
    }

    /// Renders the registry in the text exposition format.
    pub fn encode(&self) -> Result<String, ExporterError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| ExporterError::Metrics(prometheus::Error::Msg(e.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(app_name: &str, credential_id: &str, days_remaining: f64) -> CredentialSample {
        CredentialSample {
            app_name: app_name.to_string(),
            app_id: format!("{}-id", app_name),
            credential_id: credential_id.to_string(),
            days_remaining,
        }
    }

    fn gauge_lines(metrics: &CredentialMetrics) -> Vec<String> {
        metrics
            .encode()
            .unwrap()
            .lines()
            .filter(|line| line.starts_with(DAYS_REMAINING_METRIC))
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_record_sets_labeled_gauge() {
        let metrics = CredentialMetrics::new().unwrap();
        metrics.record(&[sample("App1", "k1", 12.5)]);

        let lines = gauge_lines(&metrics);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("app_name=\"App1\""));
        assert!(lines[0].contains("app_id=\"App1-id\""));
        assert!(lines[0].contains("credential_id=\"k1\""));
        assert!(lines[0].ends_with("} 12.5"));
    }

    #[test]
    fn test_last_write_wins_per_label_set() {
        let metrics = CredentialMetrics::new().unwrap();
        metrics.record(&[sample("App1", "k1", 3.0), sample("App1", "k1", -2.0)]);

        let lines = gauge_lines(&metrics);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("} -2"));
    }

    #[test]
    fn test_fresh_metrics_forget_previous_labels() {
        let first = CredentialMetrics::new().unwrap();
        first.record(&[sample("Gone", "k1", 1.0)]);

        let second = CredentialMetrics::new().unwrap();
        second.record(&[sample("Kept", "k2", 1.0)]);

        let text = second.encode().unwrap();
        assert!(text.contains("app_name=\"Kept\""));
        assert!(!text.contains("Gone"));
    }

    #[test]
    fn test_encode_text_format() {
        let metrics = CredentialMetrics::new().unwrap();
        metrics.record(&[sample("App1", "k1", -4.0)]);

        let text = metrics.encode().unwrap();
        assert!(text.contains(&format!("# HELP {} {}", DAYS_REMAINING_METRIC, DAYS_REMAINING_HELP)));
        assert!(text.contains(&format!("# TYPE {} gauge", DAYS_REMAINING_METRIC)));
        assert!(text.contains("credential_id=\"k1\""));
        assert!(text.contains("} -4\n"));
    }
}

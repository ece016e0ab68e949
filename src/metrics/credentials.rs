use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use log::warn;

use crate::graph::Application;

const SECONDS_PER_DAY: f64 = 86_400.0;
const UNKNOWN: &str = "unknown";

/// Remaining lifetime of one application's credential.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialSample {
    pub app_name: String,
    pub app_id: String,
    pub credential_id: String,
    /// Negative once the credential has expired
    pub days_remaining: f64,
}

impl CredentialSample {
    /// One-line summary with the remaining days rounded to a whole number.
    pub fn verbose_line(&self) -> String {
        format!(
            "{} [{}] => {:.0} days",
            self.app_name, self.app_id, self.days_remaining
        )
    }
}

/// Builds one sample per active application from its first password
/// credential, relative to `now`.
///
/// Applications without password credentials produce nothing. A credential
/// whose `endDateTime` is missing or unreadable is skipped with a warning.
pub fn collect_samples(applications: &[Application], now: DateTime<Utc>) -> Vec<CredentialSample> {
    applications
        .iter()
        .filter(|app| app.is_active())
        .filter_map(|app| {
            let credential = app.first_password_credential.as_ref()?;
            let app_name = label(app.display_name.as_deref());
            let app_id = label(app.app_id.as_deref());
            let credential_id = label(credential.key_id.as_deref());

            let raw_end = credential.end_date_time.as_deref().unwrap_or_default();
            let end = match parse_end_date_time(raw_end) {
                Some(end) => end,
                None => {
                    warn!(
                        "Skipping credential {} of {} [{}]: unreadable endDateTime '{}'",
                        credential_id, app_name, app_id, raw_end
                    );
                    return None;
                }
            };

            Some(CredentialSample {
                app_name,
                app_id,
                credential_id,
                days_remaining: remaining_days(end, now),
            })
        })
        .collect()
}

fn label(value: Option<&str>) -> String {
    value.unwrap_or(UNKNOWN).to_string()
}

/// Fractional days from `now` until `end`.
pub fn remaining_days(end: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    seconds(end - now) / SECONDS_PER_DAY
}

fn seconds(delta: TimeDelta) -> f64 {
    delta.num_seconds() as f64 + f64::from(delta.subsec_nanos()) / 1e9
}

/// Parses a Graph `endDateTime`.
///
/// A trailing `Z` is read as `+00:00`. Any ISO-8601 offset is accepted;
/// values without an offset, and bare dates, are taken as UTC.
pub fn parse_end_date_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let normalized = match raw.strip_suffix('Z').or_else(|| raw.strip_suffix('z')) {
        Some(stripped) => format!("{}+00:00", stripped),
        None => raw.to_string(),
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M%:z") {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn apps(value: serde_json::Value) -> Vec<Application> {
        value
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Application::from_value)
            .collect()
    }

    #[test]
    fn test_first_credential_of_active_application() {
        let samples = collect_samples(
            &apps(json!([{
                "displayName": "App1",
                "appId": "abc",
                "deletedDateTime": null,
                "passwordCredentials": [
                    {"keyId": "k1", "endDateTime": "2025-01-11T00:00:00Z"},
                    {"keyId": "k2", "endDateTime": "2026-01-01T00:00:00Z"}
                ]
            }])),
            now(),
        );

        assert_eq!(
            samples,
            vec![CredentialSample {
                app_name: "App1".to_string(),
                app_id: "abc".to_string(),
                credential_id: "k1".to_string(),
                days_remaining: 10.0,
            }]
        );
    }

    #[test]
    fn test_ineligible_applications_produce_nothing() {
        let samples = collect_samples(
            &apps(json!([
                {
                    "displayName": "Deleted",
                    "deletedDateTime": "2024-12-01T00:00:00Z",
                    "passwordCredentials": [{"keyId": "k", "endDateTime": "2099-01-01T00:00:00Z"}]
                },
                {
                    "displayName": "NoDeletedField",
                    "passwordCredentials": [{"keyId": "k", "endDateTime": "2099-01-01T00:00:00Z"}]
                },
                {
                    "displayName": "NoCredentials",
                    "deletedDateTime": null,
                    "passwordCredentials": []
                }
            ])),
            now(),
        );

        assert!(samples.is_empty());
    }

    #[test]
    fn test_missing_labels_fall_back_to_unknown() {
        let samples = collect_samples(
            &apps(json!([{
                "deletedDateTime": null,
                "passwordCredentials": [{"endDateTime": "2025-01-02T00:00:00Z"}]
            }])),
            now(),
        );

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].app_name, "unknown");
        assert_eq!(samples[0].app_id, "unknown");
        assert_eq!(samples[0].credential_id, "unknown");
    }

    #[test]
    fn test_unreadable_end_date_is_skipped() {
        let samples = collect_samples(
            &apps(json!([
                {"displayName": "A", "deletedDateTime": null,
                 "passwordCredentials": [{"keyId": "k1", "endDateTime": "someday"}]},
                {"displayName": "B", "deletedDateTime": null,
                 "passwordCredentials": [{"keyId": "k2"}]},
                {"displayName": "C", "deletedDateTime": null,
                 "passwordCredentials": [{"keyId": "k3", "endDateTime": "2025-01-02T00:00:00Z"}]}
            ])),
            now(),
        );

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].app_name, "C");
    }

    #[test]
    fn test_remaining_days_crosses_zero_at_expiry() {
        let end = now();
        let before = end - TimeDelta::hours(12);
        let after = end + TimeDelta::hours(36);

        assert_eq!(remaining_days(end, before), 0.5);
        assert_eq!(remaining_days(end, end), 0.0);
        assert_eq!(remaining_days(end, after), -1.5);
    }

    #[test]
    fn test_remaining_days_decreases_over_time() {
        let end = Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap();
        let earlier = remaining_days(end, now());
        let later = remaining_days(end, now() + TimeDelta::milliseconds(1));

        assert!(later < earlier);
    }

    #[test]
    fn test_parse_end_date_time_forms() {
        let expected = Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap();

        assert_eq!(parse_end_date_time("2099-01-01T00:00:00Z"), Some(expected));
        assert_eq!(parse_end_date_time("2099-01-01T00:00:00.000Z"), Some(expected));
        assert_eq!(parse_end_date_time("2099-01-01T02:00:00+02:00"), Some(expected));
        assert_eq!(parse_end_date_time("2099-01-01T00:00:00"), Some(expected));
        assert_eq!(parse_end_date_time("2099-01-01"), Some(expected));
        assert_eq!(parse_end_date_time(""), None);
        assert_eq!(parse_end_date_time("not-a-date"), None);
    }

    #[test]
    fn test_parse_end_date_time_keeps_fraction() {
        let parsed = parse_end_date_time("2025-01-01T00:00:00.5Z").unwrap();
        assert_eq!(remaining_days(parsed, now()), 0.5 / SECONDS_PER_DAY);
    }

    #[test]
    fn test_malformed_later_credential_does_not_drop_application() {
        let samples = collect_samples(
            &apps(json!([{
                "displayName": "App1",
                "appId": "abc",
                "deletedDateTime": null,
                "passwordCredentials": [
                    {"keyId": "k1", "endDateTime": "2025-01-11T00:00:00Z"},
                    {"keyId": 7, "endDateTime": {"not": "a date"}},
                    null
                ]
            }])),
            now(),
        );

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].credential_id, "k1");
        assert_eq!(samples[0].days_remaining, 10.0);
    }

    #[test]
    fn test_non_string_display_name_is_unknown() {
        let samples = collect_samples(
            &apps(json!([{
                "displayName": 42,
                "appId": "abc",
                "deletedDateTime": null,
                "passwordCredentials": [{"keyId": "k1", "endDateTime": "2025-01-02T00:00:00Z"}]
            }])),
            now(),
        );

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].app_name, "unknown");
        assert_eq!(samples[0].app_id, "abc");
    }

    fn sample(days_remaining: f64) -> CredentialSample {
        CredentialSample {
            app_name: "App1".to_string(),
            app_id: "abc".to_string(),
            credential_id: "k1".to_string(),
            days_remaining,
        }
    }

    #[test]
    fn test_verbose_line_rounds_days() {
        assert_eq!(sample(41.7).verbose_line(), "App1 [abc] => 42 days");
        assert_eq!(sample(12.2).verbose_line(), "App1 [abc] => 12 days");
        assert_eq!(sample(-3.6).verbose_line(), "App1 [abc] => -4 days");
        assert_eq!(sample(0.0).verbose_line(), "App1 [abc] => 0 days");
    }
}

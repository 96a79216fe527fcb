use std::time::Duration;

use aws_config::{retry::RetryConfig, timeout::TimeoutConfig, BehaviorVersion, SdkConfig};
use aws_credential_types::Credentials;
use aws_types::region::Region;
use chrono::{DateTime, Utc};

/// Client settings shared by every SDK client the crate builds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AwsSettings {
    pub region: String,
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
}

impl Default for AwsSettings {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(20),
        }
    }
}

impl AwsSettings {
    pub fn with_region(&self, region: &str) -> Self {
        Self { region: region.to_string(), ..self.clone() }
    }
}

pub fn region(name: &str) -> Option<Region> {
    let name = name.trim();
    (!name.is_empty()).then(|| Region::new(name.to_string()))
}

/// Build an SDK config that signs with `credentials` only, ignoring the
/// ambient credential chain.
pub async fn sdk_config(credentials: Credentials, settings: &AwsSettings) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .credentials_provider(credentials)
        .retry_config(RetryConfig::adaptive().with_max_attempts(settings.max_attempts))
        .timeout_config(
            TimeoutConfig::builder().operation_attempt_timeout(settings.attempt_timeout).build(),
        );
    if let Some(region) = region(&settings.region) {
        loader = loader.region(region);
    }
    loader.load().await
}

pub fn to_chrono(value: &aws_smithy_types::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value.secs(), value.subsec_nanos())
}

/// RFC 3339 rendering used in records.
pub fn format_time(value: Option<&aws_smithy_types::DateTime>) -> Option<String> {
    value.and_then(to_chrono).map(|dt| dt.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_region_is_none() {
        assert!(region("  ").is_none());
        assert_eq!(region("eu-west-1").unwrap().as_ref(), "eu-west-1");
    }

    #[test]
    fn converts_smithy_timestamps() {
        let ts = aws_smithy_types::DateTime::from_secs(1_700_000_000);
        assert_eq!(to_chrono(&ts).unwrap().timestamp(), 1_700_000_000);
        assert_eq!(format_time(Some(&ts)).unwrap(), "2023-11-14T22:13:20+00:00");
        assert_eq!(format_time(None), None);
    }

    #[test]
    fn with_region_keeps_other_settings() {
        let base = AwsSettings { max_attempts: 7, ..Default::default() };
        let scoped = base.with_region("ap-southeast-2");
        assert_eq!(scoped.region, "ap-southeast-2");
        assert_eq!(scoped.max_attempts, 7);
    }
}

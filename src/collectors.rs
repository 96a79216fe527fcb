use std::sync::Arc;

use aws_config::SdkConfig;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_types::error::{display::DisplayErrorContext, metadata::ProvideErrorMetadata};
use serde_json::Value;
use tracing::trace;

use crate::{
    aws::{self, AwsSettings},
    collector::{Collector, CollectorError, Record, ResourceKind},
    credentials::ReadOnlyCredential,
};

mod acm;
mod ec2;
mod elb;

pub use acm::{expiration_status, CertificateCollector, ExpirationStatus};
pub use ec2::InstanceCollector;
pub use elb::LoadBalancerCollector;

const PROVIDER_NAME: &str = "cloud-inventory-read-only";

/// Error codes returned when the read-only role lacks a permission.
const DENIED_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "UnauthorizedOperation",
    "AuthFailure",
    "UnrecognizedClientException",
    "InvalidClientTokenId",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectorSettings {
    pub aws: AwsSettings,
    /// Certificates expiring within this many days are flagged `approaching`.
    pub expiry_warning_days: i64,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self { aws: AwsSettings::default(), expiry_warning_days: 30 }
    }
}

/// The bundled AWS collector for `kind`.
pub fn for_kind(kind: ResourceKind, settings: CollectorSettings) -> Arc<dyn Collector> {
    match kind {
        ResourceKind::Certificates => Arc::new(CertificateCollector::new(settings)),
        ResourceKind::Instances => Arc::new(InstanceCollector::new(settings)),
        ResourceKind::LoadBalancers => Arc::new(LoadBalancerCollector::new(settings)),
    }
}

/// SDK config signed by the account's read-only credential.
pub(crate) async fn account_config(
    credential: &ReadOnlyCredential,
    region: &str,
    settings: &AwsSettings,
) -> Result<SdkConfig, CollectorError> {
    let creds = credential
        .credential()
        .sdk_credentials(PROVIDER_NAME)
        .map_err(|err| CollectorError::transient("credential", err.to_string()))?;
    trace!("Building {region} client for account {}", credential.account_id());
    Ok(aws::sdk_config(creds, &settings.with_region(region)).await)
}

pub(crate) fn classify_sdk_error<E, R>(operation: &str, err: SdkError<E, R>) -> CollectorError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(&err).to_string();
    if is_denied_code(err.code()) {
        CollectorError::denied(operation, message)
    } else {
        CollectorError::transient(operation, message)
    }
}

fn is_denied_code(code: Option<&str>) -> bool {
    code.is_some_and(|code| DENIED_CODES.contains(&code))
}

/// Optional text rendered as `N/A` when missing.
pub(crate) fn text_or_na(value: Option<&str>) -> Value {
    Value::String(value.unwrap_or("N/A").to_string())
}

pub(crate) fn time_or_na(value: Option<&aws_smithy_types::DateTime>) -> Value {
    Value::String(aws::format_time(value).unwrap_or_else(|| "N/A".to_string()))
}

pub(crate) fn insert(record: &mut Record, key: &str, value: impl Into<Value>) {
    record.insert(key.to_string(), value.into());
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn classifies_permission_codes() {
        assert!(is_denied_code(Some("UnauthorizedOperation")));
        assert!(is_denied_code(Some("AccessDeniedException")));
        assert!(!is_denied_code(Some("ThrottlingException")));
        assert!(!is_denied_code(Some("RequestLimitExceeded")));
        assert!(!is_denied_code(None));
    }

    #[test]
    fn missing_values_render_as_na() {
        assert_eq!(text_or_na(None), Value::String("N/A".into()));
        assert_eq!(text_or_na(Some("internal")), Value::String("internal".into()));
        assert_eq!(time_or_na(None), Value::String("N/A".into()));
    }

    #[test]
    fn factory_matches_kind() {
        for kind in [ResourceKind::Certificates, ResourceKind::Instances, ResourceKind::LoadBalancers]
        {
            assert_eq!(for_kind(kind, CollectorSettings::default()).kind(), kind);
        }
    }
}

use async_trait::async_trait;
use aws_sdk_acm::{types::CertificateDetail, Client as AcmClient};
use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;
use tracing::debug;

use super::{account_config, classify_sdk_error, insert, text_or_na, time_or_na, CollectorSettings};
use crate::{
    aws,
    collector::{Collector, CollectorError, Record, ResourceKind},
    credentials::ReadOnlyCredential,
};

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExpirationStatus {
    Expired,
    Approaching,
    Valid,
    Unknown,
}

/// Classify a certificate's `NotAfter` against `now`.
///
/// Days are floored, so a certificate that expired an hour ago reports `-1`.
pub fn expiration_status(
    not_after: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    warning_days: i64,
) -> (ExpirationStatus, Option<i64>) {
    let Some(not_after) = not_after else {
        return (ExpirationStatus::Unknown, None);
    };
    let days = (not_after - now).num_seconds().div_euclid(SECONDS_PER_DAY);
    let status = if days < 0 {
        ExpirationStatus::Expired
    } else if days <= warning_days {
        ExpirationStatus::Approaching
    } else {
        ExpirationStatus::Valid
    };
    (status, Some(days))
}

/// ACM certificates with their details and expiration status.
pub struct CertificateCollector {
    settings: CollectorSettings,
}

impl CertificateCollector {
    pub fn new(settings: CollectorSettings) -> Self {
        Self { settings }
    }

    async fn list_arns(&self, client: &AcmClient) -> Result<Vec<String>, CollectorError> {
        let mut arns = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let resp = client
                .list_certificates()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|err| classify_sdk_error("acm:ListCertificates", err))?;

            arns.extend(
                resp.certificate_summary_list()
                    .iter()
                    .filter_map(|summary| summary.certificate_arn().map(str::to_string)),
            );

            match resp.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }
        Ok(arns)
    }
}

#[async_trait]
impl Collector for CertificateCollector {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Certificates
    }

    async fn collect(
        &self,
        credential: &ReadOnlyCredential,
        region: &str,
    ) -> Result<Vec<Record>, CollectorError> {
        let config = account_config(credential, region, &self.settings.aws).await?;
        let client = AcmClient::new(&config);

        let arns = self.list_arns(&client).await?;
        debug!("Found {} certificates in {} ({region})", arns.len(), credential.account_id());

        let now = Utc::now();
        let mut records = Vec::with_capacity(arns.len());
        for arn in arns {
            let resp = client
                .describe_certificate()
                .certificate_arn(&arn)
                .send()
                .await
                .map_err(|err| classify_sdk_error("acm:DescribeCertificate", err))?;
            if let Some(detail) = resp.certificate() {
                records.push(certificate_record(
                    &arn,
                    detail,
                    now,
                    self.settings.expiry_warning_days,
                ));
            }
        }
        Ok(records)
    }
}

fn certificate_record(
    arn: &str,
    detail: &CertificateDetail,
    now: DateTime<Utc>,
    warning_days: i64,
) -> Record {
    let not_after = detail.not_after().and_then(aws::to_chrono);
    let (status, days) = expiration_status(not_after, now, warning_days);

    let mut record = Record::new();
    insert(&mut record, "Certificate ARN", arn);
    insert(&mut record, "Domain Name", text_or_na(detail.domain_name()));
    insert(&mut record, "Subject Alternative Names", detail.subject_alternative_names().join(", "));
    insert(&mut record, "Status", text_or_na(detail.status().map(|s| s.as_str())));
    insert(&mut record, "Type", text_or_na(detail.r#type().map(|t| t.as_str())));
    insert(&mut record, "Key Algorithm", text_or_na(detail.key_algorithm().map(|k| k.as_str())));
    insert(&mut record, "Signature Algorithm", text_or_na(detail.signature_algorithm()));
    insert(&mut record, "Issued At", time_or_na(detail.issued_at()));
    insert(&mut record, "Not Before", time_or_na(detail.not_before()));
    insert(&mut record, "Not After", time_or_na(detail.not_after()));
    insert(
        &mut record,
        "Days Until Expiry",
        days.map(serde_json::Value::from).unwrap_or_else(|| "N/A".into()),
    );
    insert(&mut record, "Expiration Status", status.to_string());
    insert(
        &mut record,
        "Renewal Eligibility",
        text_or_na(detail.renewal_eligibility().map(|r| r.as_str())),
    );
    insert(&mut record, "In Use", !detail.in_use_by().is_empty());
    record
}

use std::time::Duration;

use async_trait::async_trait;
use aws_config::{
    meta::region::RegionProviderChain, retry::RetryConfig, timeout::TimeoutConfig, BehaviorVersion,
    SdkConfig,
};
use aws_sdk_sts::{operation::assume_role::AssumeRoleError, Client as StsClient};
use aws_smithy_runtime_api::client::{orchestrator::HttpResponse, result::SdkError};
use aws_smithy_types::error::{display::DisplayErrorContext, metadata::ProvideErrorMetadata};
use tracing::{debug, trace};

use crate::{
    aws::{self, AwsSettings},
    credentials::{
        AssumeRoleRequest, CredentialSource, IdentityError, RoleAssumer, ScopedCredential,
    },
};

const PROVIDER_NAME: &str = "cloud-inventory";

/// Service error codes that mean "the caller is not allowed", as opposed to
/// "the call did not go through".
const DENIED_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "InvalidClientTokenId",
    "ExpiredToken",
    "UnrecognizedClientException",
    "SignatureDoesNotMatch",
];

/// Assumes roles through AWS STS.
///
/// The root hop uses the ambient credential chain (optionally a named
/// profile); the read-only hop signs with the management credential.
pub struct StsRoleAssumer {
    root_config: SdkConfig,
    settings: AwsSettings,
    duration: Duration,
}

impl StsRoleAssumer {
    pub async fn from_env(profile: Option<&str>, settings: AwsSettings, duration: Duration) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        let region = RegionProviderChain::first_try(aws::region(&settings.region))
            .or_default_provider()
            .or_else("us-east-1");
        let root_config = loader
            .region(region)
            .retry_config(RetryConfig::adaptive().with_max_attempts(settings.max_attempts))
            .timeout_config(
                TimeoutConfig::builder().operation_attempt_timeout(settings.attempt_timeout).build(),
            )
            .load()
            .await;
        Self { root_config, settings, duration }
    }

    async fn client_for(&self, source: CredentialSource<'_>) -> Result<StsClient, IdentityError> {
        match source {
            CredentialSource::Root => Ok(StsClient::new(&self.root_config)),
            CredentialSource::Management(management) => {
                let creds = management.credential().sdk_credentials(PROVIDER_NAME)?;
                let config = aws::sdk_config(creds, &self.settings).await;
                Ok(StsClient::new(&config))
            }
        }
    }
}

#[async_trait]
impl RoleAssumer for StsRoleAssumer {
    async fn assume_role(
        &self,
        source: CredentialSource<'_>,
        request: &AssumeRoleRequest,
    ) -> Result<ScopedCredential, IdentityError> {
        let client = self.client_for(source).await?;
        let duration_secs = i32::try_from(self.duration.as_secs()).unwrap_or(i32::MAX);

        trace!("sts:AssumeRole {} as {}", request.role_arn, request.session_name);
        let output = client
            .assume_role()
            .role_arn(&request.role_arn)
            .role_session_name(&request.session_name)
            .duration_seconds(duration_secs)
            .send()
            .await
            .map_err(|err| classify_assume_role_error(&request.role_arn, err))?;

        let credentials = output.credentials().ok_or_else(|| IdentityError::AccountUnreachable {
            role_arn: request.role_arn.clone(),
            message: "AssumeRole response carried no credentials".into(),
        })?;
        let assumed_arn = output
            .assumed_role_user()
            .map(|user| user.arn().to_string())
            .unwrap_or_else(|| request.role_arn.clone());
        let expires_at = aws::to_chrono(credentials.expiration()).ok_or_else(|| {
            IdentityError::AccountUnreachable {
                role_arn: request.role_arn.clone(),
                message: "AssumeRole response carried an invalid expiration".into(),
            }
        })?;

        debug!("Assumed {assumed_arn} until {expires_at}");
        Ok(ScopedCredential::new(
            credentials.access_key_id(),
            credentials.secret_access_key(),
            credentials.session_token(),
            expires_at,
            assumed_arn,
        ))
    }
}

fn classify_assume_role_error(
    role_arn: &str,
    err: SdkError<AssumeRoleError, HttpResponse>,
) -> IdentityError {
    let message = DisplayErrorContext(&err).to_string();
    if is_denied_code(err.code()) {
        IdentityError::AssumeRoleDenied { role_arn: role_arn.to_string(), message }
    } else {
        IdentityError::AccountUnreachable { role_arn: role_arn.to_string(), message }
    }
}

fn is_denied_code(code: Option<&str>) -> bool {
    code.is_some_and(|code| DENIED_CODES.contains(&code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denied_codes_are_recognised() {
        assert!(is_denied_code(Some("AccessDenied")));
        assert!(is_denied_code(Some("InvalidClientTokenId")));
        assert!(!is_denied_code(Some("Throttling")));
        assert!(!is_denied_code(None));
    }
}

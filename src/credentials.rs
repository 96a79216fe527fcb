//! Two-hop identity chain: root → management role (one per environment) →
//! read-only role (one per account).
//!
//! Each hop is its own trust boundary. A read-only failure is scoped to one
//! account and never touches the memoized management credential.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::SystemTime,
};

use async_trait::async_trait;
use aws_credential_types::Credentials;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::environment::Environment;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Invalid environment '{tag}' (expected one of: {})", Environment::valid_tags())]
    InvalidEnvironment { tag: String },
    #[error("Assume role {role_arn} was denied: {message}")]
    AssumeRoleDenied { role_arn: String, message: String },
    #[error("Credential {arn} expired at {expired_at}")]
    ExpiredCredential { arn: String, expired_at: DateTime<Utc> },
    #[error("Could not reach {role_arn}: {message}")]
    AccountUnreachable { role_arn: String, message: String },
    #[error("Credential {arn} was already released")]
    CredentialReleased { arn: String },
}

struct Secret {
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
}

/// A short-lived token triple plus its expiry and the identity it represents.
///
/// Secret material is dropped on [`ScopedCredential::release`]; a released
/// credential can no longer be turned into SDK credentials.
pub struct ScopedCredential {
    secret: Mutex<Option<Secret>>,
    expires_at: DateTime<Utc>,
    assumed_arn: String,
    released: AtomicBool,
}

impl ScopedCredential {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: impl Into<String>,
        expires_at: DateTime<Utc>,
        assumed_arn: impl Into<String>,
    ) -> Self {
        Self {
            secret: Mutex::new(Some(Secret {
                access_key_id: access_key_id.into(),
                secret_access_key: secret_access_key.into(),
                session_token: session_token.into(),
            })),
            expires_at,
            assumed_arn: assumed_arn.into(),
            released: AtomicBool::new(false),
        }
    }

    pub fn assumed_arn(&self) -> &str {
        &self.assumed_arn
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Drop the secret material. Returns `true` on the first call only.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.secret.lock().unwrap_or_else(PoisonError::into_inner).take();
        true
    }

    /// Fails if the credential was released or has expired.
    pub fn ensure_usable(&self) -> Result<(), IdentityError> {
        if self.is_released() {
            return Err(IdentityError::CredentialReleased { arn: self.assumed_arn.clone() });
        }
        if self.is_expired_at(Utc::now()) {
            return Err(IdentityError::ExpiredCredential {
                arn: self.assumed_arn.clone(),
                expired_at: self.expires_at,
            });
        }
        Ok(())
    }

    /// SDK credentials for building service clients.
    pub fn sdk_credentials(&self, provider_name: &'static str) -> Result<Credentials, IdentityError> {
        self.ensure_usable()?;
        let guard = self.secret.lock().unwrap_or_else(PoisonError::into_inner);
        let secret = guard
            .as_ref()
            .ok_or_else(|| IdentityError::CredentialReleased { arn: self.assumed_arn.clone() })?;
        Ok(Credentials::new(
            &secret.access_key_id,
            &secret.secret_access_key,
            Some(secret.session_token.clone()),
            Some(SystemTime::from(self.expires_at)),
            provider_name,
        ))
    }
}

impl fmt::Debug for ScopedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedCredential")
            .field("assumed_arn", &self.assumed_arn)
            .field("expires_at", &self.expires_at)
            .field("released", &self.is_released())
            .finish_non_exhaustive()
    }
}

/// Credential minted by the root identity for one environment.
#[derive(Debug)]
pub struct ManagementCredential {
    environment: Environment,
    inner: ScopedCredential,
}

impl ManagementCredential {
    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn credential(&self) -> &ScopedCredential {
        &self.inner
    }
}

/// Account-scoped credential minted from a [`ManagementCredential`].
///
/// Released when dropped, so a task that fails, times out or is cancelled
/// never leaves its credential live.
#[derive(Debug)]
pub struct ReadOnlyCredential {
    account_id: String,
    inner: ScopedCredential,
}

impl ReadOnlyCredential {
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn credential(&self) -> &ScopedCredential {
        &self.inner
    }
}

impl Drop for ReadOnlyCredential {
    fn drop(&mut self) {
        if self.inner.release() {
            debug!("Released read-only credential for account {}", self.account_id);
        }
    }
}

/// Who is asking for a role.
#[derive(Clone, Copy, Debug)]
pub enum CredentialSource<'a> {
    /// The ambient root identity of the process.
    Root,
    /// A previously minted management credential.
    Management(&'a ManagementCredential),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssumeRoleRequest {
    pub role_arn: String,
    pub session_name: String,
}

/// The single external call each hop makes.
#[async_trait]
pub trait RoleAssumer: Send + Sync {
    async fn assume_role(
        &self,
        source: CredentialSource<'_>,
        request: &AssumeRoleRequest,
    ) -> Result<ScopedCredential, IdentityError>;
}

/// Environment → management role ARN, configured outside the core.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ManagementRoles {
    roles: HashMap<Environment, String>,
}

impl ManagementRoles {
    pub fn new(roles: HashMap<Environment, String>) -> Self {
        Self { roles }
    }

    pub fn role_for(&self, environment: Environment) -> Result<&str, IdentityError> {
        self.roles
            .get(&environment)
            .map(String::as_str)
            .ok_or_else(|| IdentityError::InvalidEnvironment { tag: environment.to_string() })
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

pub fn read_only_role_arn(account_id: &str, role_name: &str) -> String {
    format!("arn:aws:iam::{account_id}:role/{role_name}")
}

type ManagementSlot = Arc<tokio::sync::OnceCell<Result<Arc<ManagementCredential>, IdentityError>>>;

pub struct IdentityChainResolver {
    assumer: Arc<dyn RoleAssumer>,
    roles: ManagementRoles,
    session_name: String,
    management: Mutex<HashMap<Environment, ManagementSlot>>,
}

impl IdentityChainResolver {
    pub fn new(
        assumer: Arc<dyn RoleAssumer>,
        roles: ManagementRoles,
        session_name: impl Into<String>,
    ) -> Self {
        Self {
            assumer,
            roles,
            session_name: session_name.into(),
            management: Mutex::new(HashMap::new()),
        }
    }

    pub async fn resolve_management_tag(
        &self,
        tag: &str,
    ) -> Result<Arc<ManagementCredential>, IdentityError> {
        let environment: Environment = tag.parse()?;
        self.resolve_management(environment).await
    }

    /// Mint (once per run) the management credential for `environment`.
    ///
    /// Concurrent callers wait on the same attempt; a failed attempt is
    /// remembered and returned to later callers without another call.
    pub async fn resolve_management(
        &self,
        environment: Environment,
    ) -> Result<Arc<ManagementCredential>, IdentityError> {
        let role_arn = self.roles.role_for(environment)?.to_string();
        let slot = {
            let mut slots = self.management.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(environment).or_default())
        };

        slot.get_or_init(|| async {
            let request = AssumeRoleRequest {
                role_arn: role_arn.clone(),
                session_name: format!("{}-mgmt-{}", self.session_name, environment),
            };
            info!("Assuming management role {role_arn} for environment {environment}");
            match self.assumer.assume_role(CredentialSource::Root, &request).await {
                Ok(inner) => Ok(Arc::new(ManagementCredential { environment, inner })),
                Err(err) => {
                    warn!("Management role for {environment} unavailable: {err}");
                    Err(err)
                }
            }
        })
        .await
        .clone()
    }

    /// Mint the read-only credential for one account.
    pub async fn resolve_read_only(
        &self,
        management: &ManagementCredential,
        account_id: &str,
        role_name: &str,
    ) -> Result<ReadOnlyCredential, IdentityError> {
        management.credential().ensure_usable()?;

        let request = AssumeRoleRequest {
            role_arn: read_only_role_arn(account_id, role_name),
            session_name: format!("{}-ro-{}", self.session_name, account_id),
        };
        debug!("Assuming {} from {}", request.role_arn, management.credential().assumed_arn());
        let inner =
            self.assumer.assume_role(CredentialSource::Management(management), &request).await?;
        Ok(ReadOnlyCredential { account_id: account_id.to_string(), inner })
    }

    /// Mark a credential inert. Safe for credentials that were never minted.
    pub fn release(&self, credential: Option<&ScopedCredential>) {
        if let Some(credential) = credential {
            if credential.release() {
                debug!("Released credential {}", credential.assumed_arn());
            }
        }
    }

    /// Release every memoized management credential. Called at run teardown.
    pub fn close(&self) {
        let slots: Vec<ManagementSlot> = {
            let slots = self.management.lock().unwrap_or_else(PoisonError::into_inner);
            slots.values().cloned().collect()
        };
        for slot in slots {
            if let Some(Ok(management)) = slot.get() {
                self.release(Some(management.credential()));
            }
        }
    }
}

impl Drop for IdentityChainResolver {
    fn drop(&mut self) {
        self.close();
    }
}

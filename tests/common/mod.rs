#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use cloud_inventory::{
    collector::{Collector, CollectorError, Record, ResourceKind},
    config::Settings,
    credentials::{
        AssumeRoleRequest, CredentialSource, IdentityError, ReadOnlyCredential, RoleAssumer,
        ScopedCredential,
    },
    engine::RunContext,
    environment::Environment,
};
use serde_json::json;

pub const MANAGEMENT_ROLE: &str = "arn:aws:iam::999999999999:role/dev-admin";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Hop {
    Management(String),
    ReadOnly(String),
}

/// Records every AssumeRole call in order.
#[derive(Default)]
pub struct FakeAssumer {
    pub calls: Mutex<Vec<Hop>>,
    pub deny_accounts: Vec<&'static str>,
    pub fail_management: bool,
    pub expired_management: bool,
}

impl FakeAssumer {
    pub fn calls(&self) -> Vec<Hop> {
        self.calls.lock().unwrap().clone()
    }

    pub fn management_calls(&self) -> usize {
        self.calls().iter().filter(|hop| matches!(hop, Hop::Management(_))).count()
    }

    pub fn read_only_calls(&self) -> usize {
        self.calls().iter().filter(|hop| matches!(hop, Hop::ReadOnly(_))).count()
    }
}

#[async_trait]
impl RoleAssumer for FakeAssumer {
    async fn assume_role(
        &self,
        source: CredentialSource<'_>,
        request: &AssumeRoleRequest,
    ) -> Result<ScopedCredential, IdentityError> {
        let from_root = matches!(source, CredentialSource::Root);
        let hop = if from_root {
            Hop::Management(request.role_arn.clone())
        } else {
            Hop::ReadOnly(request.role_arn.clone())
        };
        self.calls.lock().unwrap().push(hop);
        tokio::task::yield_now().await;

        if from_root && self.fail_management {
            return Err(IdentityError::AssumeRoleDenied {
                role_arn: request.role_arn.clone(),
                message: "AccessDenied".into(),
            });
        }
        if self.deny_accounts.iter().any(|id| request.role_arn.contains(id)) {
            return Err(IdentityError::AssumeRoleDenied {
                role_arn: request.role_arn.clone(),
                message: "AccessDenied".into(),
            });
        }
        let expires_at = if from_root && self.expired_management {
            Utc::now() - Duration::minutes(1)
        } else {
            Utc::now() + Duration::hours(1)
        };
        Ok(ScopedCredential::new("AKIAFAKE", "secret", "token", expires_at, &request.role_arn))
    }
}

/// Returns a fixed number of certificate-like records per account.
#[derive(Default)]
pub struct FakeCollector {
    pub records: Vec<(&'static str, usize)>,
    pub seen: Mutex<Vec<String>>,
}

impl FakeCollector {
    pub fn with_records(records: Vec<(&'static str, usize)>) -> Self {
        Self { records, ..Self::default() }
    }
}

#[async_trait]
impl Collector for FakeCollector {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Certificates
    }

    async fn collect(
        &self,
        credential: &ReadOnlyCredential,
        region: &str,
    ) -> Result<Vec<Record>, CollectorError> {
        let account_id = credential.account_id().to_string();
        self.seen.lock().unwrap().push(account_id.clone());
        let count =
            self.records.iter().find(|(id, _)| *id == account_id).map_or(0, |(_, count)| *count);
        Ok((0..count)
            .map(|n| {
                let value = json!({
                    "DomainName": format!("svc{n}.example.com"),
                    "Region": region,
                });
                value.as_object().cloned().unwrap()
            })
            .collect())
    }
}

pub fn settings() -> Settings {
    let mut settings = Settings { max_concurrency: 2, ..Settings::default() };
    settings.management_roles.insert(Environment::Development, MANAGEMENT_ROLE.to_string());
    settings
}

pub fn context(assumer: &Arc<FakeAssumer>, collector: &Arc<FakeCollector>) -> RunContext {
    RunContext::new(
        Arc::clone(assumer) as Arc<dyn RoleAssumer>,
        Arc::clone(collector) as Arc<dyn Collector>,
        &settings(),
    )
}

//! Fan-out of one collection task per account.
//!
//! Each task mints its account's read-only credential and then calls the
//! collector with it. Every per-account failure ends up as that account's
//! [`Outcome::Failed`]; siblings keep running.

use std::{future::Future, time::Duration};

use serde::{Deserialize, Serialize};
use strum::Display;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::{
    catalog::Account,
    collector::{Collector, CollectorError, Record},
    credentials::{IdentityChainResolver, IdentityError, ManagementCredential},
    pool::{BoundedPool, JobFailure},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    InvalidEnvironment,
    AssumeRoleDenied,
    ExpiredCredential,
    AccountUnreachable,
    CredentialReleased,
    CollectorTransient,
    CollectorDenied,
    TimedOut,
    Cancelled,
    Panicked,
}

/// Why one account produced no inventory. The message is kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl AccountFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

impl From<&IdentityError> for AccountFailure {
    fn from(err: &IdentityError) -> Self {
        let kind = match err {
            IdentityError::InvalidEnvironment { .. } => FailureKind::InvalidEnvironment,
            IdentityError::AssumeRoleDenied { .. } => FailureKind::AssumeRoleDenied,
            IdentityError::ExpiredCredential { .. } => FailureKind::ExpiredCredential,
            IdentityError::AccountUnreachable { .. } => FailureKind::AccountUnreachable,
            IdentityError::CredentialReleased { .. } => FailureKind::CredentialReleased,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<IdentityError> for AccountFailure {
    fn from(err: IdentityError) -> Self {
        Self::from(&err)
    }
}

impl From<CollectorError> for AccountFailure {
    fn from(err: CollectorError) -> Self {
        let kind = if err.is_denied() {
            FailureKind::CollectorDenied
        } else {
            FailureKind::CollectorTransient
        };
        Self::new(kind, err.to_string())
    }
}

impl From<&JobFailure> for AccountFailure {
    fn from(failure: &JobFailure) -> Self {
        let kind = match failure {
            JobFailure::Panicked(_) => FailureKind::Panicked,
            JobFailure::Cancelled => FailureKind::Cancelled,
        };
        Self::new(kind, failure.to_string())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Records(Vec<Record>),
    NoRecords,
    Failed(AccountFailure),
}

impl Outcome {
    pub fn from_records(records: Vec<Record>) -> Self {
        if records.is_empty() {
            Self::NoRecords
        } else {
            Self::Records(records)
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn record_count(&self) -> usize {
        match self {
            Self::Records(records) => records.len(),
            _ => 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PerAccountResult {
    pub account_id: String,
    pub account_name: String,
    pub outcome: Outcome,
}

impl PerAccountResult {
    fn new(account: &Account, outcome: Outcome) -> Self {
        Self { account_id: account.id.clone(), account_name: account.name.clone(), outcome }
    }
}

#[derive(Clone, Debug)]
pub struct Scheduler {
    pool: BoundedPool,
    call_timeout: Option<Duration>,
    deadline: Option<Duration>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self { pool: BoundedPool::default(), call_timeout: None, deadline: None }
    }
}

impl Scheduler {
    pub fn new(max_concurrency: usize) -> Self {
        Self { pool: BoundedPool::new(max_concurrency), ..Self::default() }
    }

    /// Applied separately to the credential mint and to the collector call.
    pub fn with_call_timeout(mut self, call_timeout: Option<Duration>) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Measured from the start of each [`Scheduler::collect_all`] call.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn width(&self) -> usize {
        self.pool.width()
    }

    /// Collect from every account and return one result per account, in
    /// completion order. `progress` is called as each account finishes.
    #[allow(clippy::too_many_arguments)]
    pub async fn collect_all<P>(
        &self,
        accounts: &[Account],
        management: &ManagementCredential,
        resolver: &IdentityChainResolver,
        collector: &dyn Collector,
        role_name: &str,
        region: &str,
        mut progress: P,
    ) -> Vec<PerAccountResult>
    where
        P: FnMut(&Account, &Outcome),
    {
        debug!(
            "Dispatching {} accounts at width {} for {}",
            accounts.len(),
            self.pool.width(),
            collector.kind()
        );
        let jobs = accounts
            .iter()
            .enumerate()
            .map(|(index, account)| {
                (index, self.run_task(account, management, resolver, collector, role_name, region))
            })
            .collect();
        let deadline = self.deadline.map(|limit| Instant::now() + limit);

        let finished = self
            .pool
            .run(jobs, deadline, |index, result| {
                let account = &accounts[*index];
                match result {
                    Ok(outcome) => {
                        log_outcome(account, outcome);
                        progress(account, outcome);
                    }
                    Err(failure) => {
                        let outcome = Outcome::Failed(failure.into());
                        log_outcome(account, &outcome);
                        progress(account, &outcome);
                    }
                }
            })
            .await;

        finished
            .into_iter()
            .map(|(index, result)| {
                let outcome =
                    result.unwrap_or_else(|failure| Outcome::Failed(AccountFailure::from(&failure)));
                PerAccountResult::new(&accounts[index], outcome)
            })
            .collect()
    }

    async fn run_task(
        &self,
        account: &Account,
        management: &ManagementCredential,
        resolver: &IdentityChainResolver,
        collector: &dyn Collector,
        role_name: &str,
        region: &str,
    ) -> Outcome {
        let minted = within(
            self.call_timeout,
            "assuming the read-only role",
            resolver.resolve_read_only(management, &account.id, role_name),
        )
        .await;
        let credential = match minted {
            Ok(Ok(credential)) => credential,
            Ok(Err(err)) => return Outcome::Failed(err.into()),
            Err(failure) => return Outcome::Failed(failure),
        };

        let collected =
            within(self.call_timeout, "collecting", collector.collect(&credential, region)).await;
        match collected {
            Ok(Ok(records)) => Outcome::from_records(records),
            Ok(Err(err)) => Outcome::Failed(err.into()),
            Err(failure) => Outcome::Failed(failure),
        }
    }
}

async fn within<F: Future>(
    limit: Option<Duration>,
    step: &str,
    fut: F,
) -> Result<F::Output, AccountFailure> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            AccountFailure::new(
                FailureKind::TimedOut,
                format!("{step} took longer than {}", humantime::format_duration(limit)),
            )
        }),
        None => Ok(fut.await),
    }
}

fn log_outcome(account: &Account, outcome: &Outcome) {
    match outcome {
        Outcome::Records(records) => {
            debug!("{} ({}): {} records", account.name, account.id, records.len())
        }
        Outcome::NoRecords => debug!("{} ({}): no records", account.name, account.id),
        Outcome::Failed(failure) => match failure.kind {
            FailureKind::CollectorDenied | FailureKind::AssumeRoleDenied | FailureKind::Panicked => {
                error!("{} ({}) failed [{}]: {}", account.name, account.id, failure.kind, failure.message)
            }
            _ => warn!("{} ({}) failed [{}]: {}", account.name, account.id, failure.kind, failure.message),
        },
    }
}

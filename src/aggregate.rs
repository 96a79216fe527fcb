//! Merge per-account results into per-product reports.
//!
//! Entries come back in catalog order no matter in which order accounts
//! finished. An account that was checked and had nothing is kept with a
//! `no-records` status so sinks can tell it apart from one never checked.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use tracing::warn;

use crate::{
    catalog::Account,
    collector::{Record, ResourceKind},
    environment::Environment,
    filter::SkippedAccount,
    scheduler::{AccountFailure, FailureKind, Outcome, PerAccountResult},
};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum EntryStatus {
    Collected { records: Vec<Record> },
    NoRecords,
    Failed { kind: FailureKind, message: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AccountEntry {
    #[serde(skip)]
    pub account_name: String,
    pub account_id: String,
    #[serde(flatten)]
    pub status: EntryStatus,
}

impl AccountEntry {
    fn from_result(result: PerAccountResult) -> Self {
        let status = match result.outcome {
            Outcome::Records(records) => EntryStatus::Collected { records },
            Outcome::NoRecords => EntryStatus::NoRecords,
            Outcome::Failed(AccountFailure { kind, message }) => EntryStatus::Failed { kind, message },
        };
        Self { account_name: result.account_name, account_id: result.account_id, status }
    }

    pub fn records(&self) -> &[Record] {
        match &self.status {
            EntryStatus::Collected { records } => records.as_slice(),
            _ => &[],
        }
    }

    pub fn failure(&self) -> Option<(FailureKind, &str)> {
        match &self.status {
            EntryStatus::Failed { kind, message } => Some((*kind, message.as_str())),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub account_id: String,
    pub account_name: String,
    pub reason: String,
}

impl From<SkippedAccount> for SkippedEntry {
    fn from(skipped: SkippedAccount) -> Self {
        Self {
            account_id: skipped.account.id,
            account_name: skipped.account.name,
            reason: skipped.reason,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ProductReport {
    Collected {
        #[serde(serialize_with = "entries_by_name")]
        accounts: Vec<AccountEntry>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        skipped: Vec<SkippedEntry>,
    },
    /// No account of the product matched the target environment.
    Skipped {
        skipped: Vec<SkippedEntry>,
    },
    /// The environment's management credential could not be obtained.
    Failed {
        kind: FailureKind,
        reason: String,
    },
}

fn entries_by_name<S: Serializer>(entries: &[AccountEntry], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_map(entries.iter().map(|entry| (&entry.account_name, entry)))
}

impl ProductReport {
    pub fn accounts(&self) -> &[AccountEntry] {
        match self {
            Self::Collected { accounts, .. } => accounts.as_slice(),
            _ => &[],
        }
    }

    /// Look an account up by its display name.
    pub fn get(&self, account_name: &str) -> Option<&AccountEntry> {
        self.accounts().iter().find(|entry| entry.account_name == account_name)
    }

    pub fn skipped(&self) -> &[SkippedEntry] {
        match self {
            Self::Collected { skipped, .. } | Self::Skipped { skipped } => skipped.as_slice(),
            Self::Failed { .. } => &[],
        }
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        summary.add_product(self);
        summary
    }
}

/// Build the report of one product from its scheduler results.
///
/// `included` is the filtered account list in catalog order.
pub fn aggregate(
    product: &str,
    included: &[Account],
    skipped: Vec<SkippedAccount>,
    results: Vec<PerAccountResult>,
) -> ProductReport {
    let mut by_id: HashMap<String, PerAccountResult> = HashMap::with_capacity(results.len());
    for result in results {
        if !included.iter().any(|account| account.id == result.account_id) {
            warn!("{product}: ignoring result for unexpected account {}", result.account_id);
            continue;
        }
        if let Some(previous) = by_id.insert(result.account_id.clone(), result) {
            warn!("{product}: duplicate result for account {}", previous.account_id);
        }
    }

    let accounts = included
        .iter()
        .map(|account| {
            let result = by_id.remove(&account.id).unwrap_or_else(|| PerAccountResult {
                account_id: account.id.clone(),
                account_name: account.name.clone(),
                outcome: Outcome::Failed(AccountFailure::new(
                    FailureKind::Cancelled,
                    "no result was recorded for this account",
                )),
            });
            AccountEntry::from_result(result)
        })
        .collect();

    ProductReport::Collected {
        accounts,
        skipped: skipped.into_iter().map(SkippedEntry::from).collect(),
    }
}

/// The whole run: one report per product, in catalog order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InventoryReport {
    pub environment: Environment,
    pub kind: ResourceKind,
    pub generated_at: DateTime<Utc>,
    #[serde(serialize_with = "products_in_order")]
    pub products: Vec<(String, ProductReport)>,
}

fn products_in_order<S: Serializer>(
    products: &[(String, ProductReport)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(products.iter().map(|(name, report)| (name, report)))
}

impl InventoryReport {
    pub fn new(environment: Environment, kind: ResourceKind) -> Self {
        Self { environment, kind, generated_at: Utc::now(), products: Vec::new() }
    }

    pub fn push(&mut self, product: impl Into<String>, report: ProductReport) {
        self.products.push((product.into(), report));
    }

    pub fn product(&self, name: &str) -> Option<&ProductReport> {
        self.products.iter().find(|(product, _)| product == name).map(|(_, report)| report)
    }

    /// True when the environment's management credential was unavailable.
    pub fn has_environment_failure(&self) -> bool {
        self.products.iter().any(|(_, report)| matches!(report, ProductReport::Failed { .. }))
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for (_, report) in &self.products {
            summary.add_product(report);
        }
        summary
    }
}

/// Counts shown at the end of a run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub inventoried: usize,
    pub with_records: usize,
    pub records: usize,
    pub failed: usize,
    pub skipped: usize,
    pub products_skipped: usize,
    pub products_failed: usize,
    pub failures_by_kind: BTreeMap<String, usize>,
}

impl Summary {
    fn add_product(&mut self, report: &ProductReport) {
        match report {
            ProductReport::Collected { accounts, skipped } => {
                self.skipped += skipped.len();
                for entry in accounts {
                    match &entry.status {
                        EntryStatus::Collected { records } => {
                            self.inventoried += 1;
                            self.with_records += 1;
                            self.records += records.len();
                        }
                        EntryStatus::NoRecords => self.inventoried += 1,
                        EntryStatus::Failed { kind, .. } => {
                            self.failed += 1;
                            *self.failures_by_kind.entry(kind.to_string()).or_default() += 1;
                        }
                    }
                }
            }
            ProductReport::Skipped { skipped } => {
                self.products_skipped += 1;
                self.skipped += skipped.len();
            }
            ProductReport::Failed { .. } => self.products_failed += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn record(n: usize) -> Record {
        let mut record = Record::new();
        record.insert("Domain Name".into(), format!("site-{n}.example.com").into());
        record
    }

    fn result(id: &str, name: &str, outcome: Outcome) -> PerAccountResult {
        PerAccountResult { account_id: id.into(), account_name: name.into(), outcome }
    }

    #[test]
    fn records_and_denied_marker_side_by_side() {
        let included =
            vec![Account::new("111", "prod-billing"), Account::new("222", "prod-billing-dr")];
        let results = vec![
            result(
                "222",
                "prod-billing-dr",
                Outcome::Failed(AccountFailure::new(
                    FailureKind::CollectorDenied,
                    "acm:ListCertificates denied: AccessDeniedException",
                )),
            ),
            result("111", "prod-billing", Outcome::Records(vec![record(1), record(2), record(3)])),
        ];

        let report = aggregate("billing", &included, Vec::new(), results);
        assert_eq!(report.get("prod-billing").unwrap().records().len(), 3);
        assert_eq!(
            report.get("prod-billing-dr").unwrap().failure(),
            Some((
                FailureKind::CollectorDenied,
                "acm:ListCertificates denied: AccessDeniedException"
            ))
        );
        let names: Vec<_> = report.accounts().iter().map(|e| e.account_name.as_str()).collect();
        assert_eq!(names, vec!["prod-billing", "prod-billing-dr"]);
    }

    #[test]
    fn lookup_returns_exactly_what_was_produced() {
        let included: Vec<_> =
            (0..6).map(|i| Account::new(format!("{i}"), format!("acct-{i}"))).collect();
        let produced: Vec<_> = included
            .iter()
            .enumerate()
            .rev()
            .map(|(i, account)| {
                let outcome = match i % 3 {
                    0 => Outcome::from_records((0..i + 1).map(record).collect()),
                    1 => Outcome::NoRecords,
                    _ => Outcome::Failed(AccountFailure::new(FailureKind::TimedOut, "slow")),
                };
                result(&account.id, &account.name, outcome)
            })
            .collect();

        let report = aggregate("p", &included, Vec::new(), produced.clone());
        for produced_result in produced {
            let entry = report.get(&produced_result.account_name).unwrap();
            let expected = AccountEntry::from_result(produced_result);
            assert_eq!(entry, &expected);
        }
        assert_eq!(report.accounts().len(), 6);
    }

    #[test]
    fn missing_results_are_marked_and_strays_dropped() {
        let included = vec![Account::new("1", "a"), Account::new("2", "b")];
        let results = vec![result("1", "a", Outcome::NoRecords), result("9", "z", Outcome::NoRecords)];

        let report = aggregate("p", &included, Vec::new(), results);
        assert_eq!(report.accounts().len(), 2);
        assert_eq!(report.get("b").unwrap().failure().map(|(k, _)| k), Some(FailureKind::Cancelled));
        assert!(report.get("z").is_none());
    }

    #[test]
    fn serializes_entries_keyed_by_account_name() {
        let included = vec![Account::new("111", "prod-billing"), Account::new("333", "prod-empty")];
        let skipped = vec![SkippedAccount {
            account: Account::new("222", "dev-billing"),
            reason: "name contains 'dev'".into(),
        }];
        let results = vec![
            result("333", "prod-empty", Outcome::NoRecords),
            result("111", "prod-billing", Outcome::Records(vec![record(1)])),
        ];

        let mut report = InventoryReport::new(Environment::Production, ResourceKind::Certificates);
        report.push("billing", aggregate("billing", &included, skipped, results));
        report.push("search", ProductReport::Skipped { skipped: Vec::new() });

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["environment"], "pro");
        assert_eq!(value["kind"], "certificates");
        assert_eq!(
            value["products"]["billing"],
            json!({
                "status": "collected",
                "accounts": {
                    "prod-billing": {
                        "account_id": "111",
                        "status": "collected",
                        "records": [{"Domain Name": "site-1.example.com"}]
                    },
                    "prod-empty": {"account_id": "333", "status": "no-records"}
                },
                "skipped": [{
                    "account_id": "222",
                    "account_name": "dev-billing",
                    "reason": "name contains 'dev'"
                }]
            })
        );
        assert_eq!(value["products"]["search"], json!({"status": "skipped", "skipped": []}));
        let keys: Vec<_> =
            value["products"]["billing"]["accounts"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["prod-billing", "prod-empty"]);
    }

    #[test]
    fn summary_counts() {
        let included = vec![Account::new("1", "a"), Account::new("2", "b"), Account::new("3", "c")];
        let results = vec![
            result("1", "a", Outcome::Records(vec![record(1), record(2)])),
            result("2", "b", Outcome::NoRecords),
            result(
                "3",
                "c",
                Outcome::Failed(AccountFailure::new(FailureKind::AssumeRoleDenied, "denied")),
            ),
        ];
        let mut report = InventoryReport::new(Environment::Development, ResourceKind::Instances);
        report.push("one", aggregate("one", &included, Vec::new(), results));
        report.push(
            "two",
            ProductReport::Failed { kind: FailureKind::AccountUnreachable, reason: "down".into() },
        );

        let summary = report.summary();
        assert_eq!(summary.inventoried, 2);
        assert_eq!(summary.with_records, 1);
        assert_eq!(summary.records, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.products_failed, 1);
        assert_eq!(summary.failures_by_kind["assume-role-denied"], 1);
        assert!(report.has_environment_failure());
    }
}

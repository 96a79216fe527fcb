mod common;

use std::sync::Arc;

use cloud_inventory::{
    aggregate::{EntryStatus, ProductReport},
    catalog::Catalog,
    environment::Environment,
    scheduler::FailureKind,
};
use common::{context, FakeAssumer, FakeCollector, Hop};
use pretty_assertions::assert_eq;

fn catalog() -> Catalog {
    Catalog::from_json_str(
        r#"{
            "payments": {"111": "dev-payments", "222": "dev-billing", "333": "prod-billing"},
            "identity": {"444": "pro-identity"}
        }"#,
    )
    .unwrap()
}

#[tokio::test]
async fn collects_included_accounts_and_isolates_denied_ones() {
    let assumer = Arc::new(FakeAssumer { deny_accounts: vec!["222"], ..FakeAssumer::default() });
    let collector = Arc::new(FakeCollector::with_records(vec![("111", 3)]));
    let context = context(&assumer, &collector);

    let plan = context.plan(&catalog(), Environment::Development);
    let mut progressed = Vec::new();
    let report = context
        .run(Environment::Development, plan, |product, account, _| {
            progressed.push(format!("{product}/{}", account.id));
        })
        .await;
    context.close();

    progressed.sort();
    assert_eq!(progressed, vec!["payments/111", "payments/222"]);

    let payments = report.product("payments").unwrap();
    let names: Vec<&str> = payments.accounts().iter().map(|e| e.account_name.as_str()).collect();
    assert_eq!(names, vec!["dev-payments", "dev-billing"]);
    assert_eq!(payments.get("dev-payments").unwrap().records().len(), 3);
    let (kind, message) = payments.get("dev-billing").unwrap().failure().unwrap();
    assert_eq!(kind, FailureKind::AssumeRoleDenied);
    assert!(message.contains("222"), "{message}");
    assert_eq!(payments.skipped().len(), 1);
    assert_eq!(payments.skipped()[0].account_id, "333");

    assert!(matches!(report.product("identity"), Some(ProductReport::Skipped { .. })));
    assert!(!report.has_environment_failure());

    let summary = report.summary();
    assert_eq!(summary.inventoried, 2);
    assert_eq!(summary.records, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.products_skipped, 1);
}

#[tokio::test]
async fn management_is_assumed_once_and_before_any_account() {
    let assumer = Arc::new(FakeAssumer::default());
    let collector = Arc::new(FakeCollector::default());
    let context = context(&assumer, &collector);

    let catalog = Catalog::from_json_str(
        r#"{
            "a": {"111": "dev-a", "112": "dev-a2"},
            "b": {"221": "dev-b"}
        }"#,
    )
    .unwrap();
    let plan = context.plan(&catalog, Environment::Development);
    let report = context.run(Environment::Development, plan, |_, _, _| {}).await;

    let calls = assumer.calls();
    assert_eq!(assumer.management_calls(), 1);
    assert_eq!(calls[0], Hop::Management(common::MANAGEMENT_ROLE.to_string()));
    assert_eq!(assumer.read_only_calls(), 3);
    assert!(calls.contains(&Hop::ReadOnly("arn:aws:iam::221:role/read-only-role".into())));

    for (_, product) in &report.products {
        for entry in product.accounts() {
            assert_eq!(entry.status, EntryStatus::NoRecords);
        }
    }
}

#[tokio::test]
async fn expired_management_marks_accounts_without_calling_them() {
    let assumer = Arc::new(FakeAssumer { expired_management: true, ..FakeAssumer::default() });
    let collector = Arc::new(FakeCollector::default());
    let context = context(&assumer, &collector);

    let plan = context.plan(&catalog(), Environment::Development);
    let report = context.run(Environment::Development, plan, |_, _, _| {}).await;

    assert_eq!(assumer.read_only_calls(), 0);
    assert!(collector.seen.lock().unwrap().is_empty());
    let payments = report.product("payments").unwrap();
    assert_eq!(payments.accounts().len(), 2);
    for entry in payments.accounts() {
        assert_eq!(entry.failure().unwrap().0, FailureKind::ExpiredCredential);
    }
}

#[tokio::test]
async fn management_failure_fails_every_product_with_accounts() {
    let assumer = Arc::new(FakeAssumer { fail_management: true, ..FakeAssumer::default() });
    let collector = Arc::new(FakeCollector::default());
    let context = context(&assumer, &collector);

    let plan = context.plan(&catalog(), Environment::Development);
    let report = context.run(Environment::Development, plan, |_, _, _| {}).await;

    assert_eq!(assumer.management_calls(), 1);
    assert_eq!(assumer.read_only_calls(), 0);
    assert!(report.has_environment_failure());
    match report.product("payments") {
        Some(ProductReport::Failed { kind, reason }) => {
            assert_eq!(*kind, FailureKind::AssumeRoleDenied);
            assert!(reason.contains("dev-admin"), "{reason}");
        }
        other => panic!("unexpected report {other:?}"),
    }
    assert!(matches!(report.product("identity"), Some(ProductReport::Skipped { .. })));
}

#[tokio::test]
async fn unconfigured_environment_fails_without_any_call() {
    let assumer = Arc::new(FakeAssumer::default());
    let collector = Arc::new(FakeCollector::default());
    let context = context(&assumer, &collector);

    let catalog = Catalog::from_json_str(r#"{"poc": {"555": "poc-sandbox"}}"#).unwrap();
    let plan = context.plan(&catalog, Environment::ProofOfConcept);
    let report = context.run(Environment::ProofOfConcept, plan, |_, _, _| {}).await;

    assert!(assumer.calls().is_empty());
    assert!(matches!(
        report.product("poc"),
        Some(ProductReport::Failed { kind: FailureKind::InvalidEnvironment, .. })
    ));
}

#[tokio::test]
async fn nothing_to_collect_needs_no_credentials() {
    let assumer = Arc::new(FakeAssumer::default());
    let collector = Arc::new(FakeCollector::default());
    let context = context(&assumer, &collector);

    let catalog = Catalog::from_json_str(r#"{"identity": {"444": "pro-identity"}}"#).unwrap();
    let plan = context.plan(&catalog, Environment::Development);
    let report = context.run(Environment::Development, plan, |_, _, _| {}).await;

    assert!(assumer.calls().is_empty());
    assert_eq!(report.summary().products_skipped, 1);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["products"]["identity"]["status"], "skipped");
}

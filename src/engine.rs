//! Drives one inventory run: filter, management credential, fan-out,
//! aggregation.
//!
//! All per-run state lives in [`RunContext`], which is built at the start of a
//! run and closed at the end of it.

use std::sync::Arc;

use tracing::{error, info};

use crate::{
    aggregate::{aggregate, InventoryReport, ProductReport, SkippedEntry},
    catalog::{Account, Catalog},
    collector::Collector,
    collectors,
    config::Settings,
    credentials::{IdentityChainResolver, RoleAssumer},
    environment::Environment,
    filter::{filter_accounts, FilterOutcome, FilterPolicy},
    scheduler::{AccountFailure, Outcome, Scheduler},
    sts::StsRoleAssumer,
};

/// The accounts one product contributes to a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductPlan {
    pub product: String,
    pub selection: FilterOutcome,
}

/// Apply the account filter to every product, in catalog order.
pub fn plan(catalog: &Catalog, environment: Environment, policy: FilterPolicy) -> Vec<ProductPlan> {
    catalog
        .products()
        .iter()
        .map(|product| ProductPlan {
            product: product.name.clone(),
            selection: filter_accounts(&product.accounts, environment, policy),
        })
        .collect()
}

pub fn planned_accounts(plan: &[ProductPlan]) -> usize {
    plan.iter().map(|p| p.selection.included.len()).sum()
}

pub struct RunContext {
    resolver: IdentityChainResolver,
    collector: Arc<dyn Collector>,
    scheduler: Scheduler,
    read_only_role: String,
    region: String,
    filter_policy: FilterPolicy,
}

impl RunContext {
    pub fn new(
        assumer: Arc<dyn RoleAssumer>,
        collector: Arc<dyn Collector>,
        settings: &Settings,
    ) -> Self {
        Self {
            resolver: IdentityChainResolver::new(
                assumer,
                settings.management_roles(),
                settings.session_name.clone(),
            ),
            collector,
            scheduler: settings.scheduler(),
            read_only_role: settings.read_only_role.clone(),
            region: settings.region.clone(),
            filter_policy: settings.filter_policy,
        }
    }

    /// Context backed by STS and the bundled collector for `kind`.
    pub async fn aws(settings: &Settings, kind: crate::collector::ResourceKind) -> Self {
        let assumer = StsRoleAssumer::from_env(
            settings.profile.as_deref(),
            settings.aws(),
            settings.credential_duration(),
        )
        .await;
        let collector = collectors::for_kind(kind, settings.collector_settings());
        Self::new(Arc::new(assumer), collector, settings)
    }

    pub fn resolver(&self) -> &IdentityChainResolver {
        &self.resolver
    }

    pub fn filter_policy(&self) -> FilterPolicy {
        self.filter_policy
    }

    pub fn plan(&self, catalog: &Catalog, environment: Environment) -> Vec<ProductPlan> {
        plan(catalog, environment, self.filter_policy)
    }

    /// Run every planned product one after another.
    ///
    /// The management credential is only requested when at least one product
    /// has accounts left after filtering. If it cannot be obtained, every such
    /// product is reported as failed.
    pub async fn run<P>(
        &self,
        environment: Environment,
        plan: Vec<ProductPlan>,
        mut progress: P,
    ) -> InventoryReport
    where
        P: FnMut(&str, &Account, &Outcome),
    {
        let mut report = InventoryReport::new(environment, self.collector.kind());
        let needs_credentials = plan.iter().any(|p| !p.selection.is_empty());
        let management = if needs_credentials {
            Some(self.resolver.resolve_management(environment).await)
        } else {
            None
        };

        for ProductPlan { product, selection } in plan {
            let FilterOutcome { included, skipped } = selection;
            if included.is_empty() {
                info!("{product}: no accounts match {environment}, skipping");
                report.push(
                    product,
                    ProductReport::Skipped {
                        skipped: skipped.into_iter().map(SkippedEntry::from).collect(),
                    },
                );
                continue;
            }

            let management = match &management {
                Some(Ok(management)) => management,
                Some(Err(err)) => {
                    error!("{product}: management credential for {environment} unavailable: {err}");
                    let failure = AccountFailure::from(err);
                    report.push(
                        product,
                        ProductReport::Failed { kind: failure.kind, reason: failure.message },
                    );
                    continue;
                }
                None => continue,
            };

            info!("{product}: collecting {} from {} accounts", self.collector.kind(), included.len());
            let results = self
                .scheduler
                .collect_all(
                    &included,
                    management,
                    &self.resolver,
                    self.collector.as_ref(),
                    &self.read_only_role,
                    &self.region,
                    |account, outcome| progress(&product, account, outcome),
                )
                .await;
            let product_report = aggregate(&product, &included, skipped, results);
            let summary = product_report.summary();
            info!(
                "{product}: {} inventoried, {} failed, {} skipped",
                summary.inventoried, summary.failed, summary.skipped
            );
            report.push(product, product_report);
        }
        report
    }

    /// Release every credential the run still holds.
    pub fn close(&self) {
        self.resolver.close();
    }
}

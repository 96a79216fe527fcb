use std::{
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::{
    aggregate::{InventoryReport, ProductReport},
    cli::{commands::output::OutputArgs, global::GlobalArgs},
    collector::{Record, ResourceKind},
    engine::ProductPlan,
    environment::Environment,
    filter::FilterPolicy,
    util::{file_safe_name, get_writer_for_file_or_stdout},
};
mod json_format;
mod pretty_format;
pub mod styles;

use styles::{StyledObject, Styles};

use crate::cli::commands::output::ReportOutputFormat;

/// Render a finished run: the console report in the chosen format, plus the
/// optional JSON file and per-product files.
pub fn run(
    global_args: &GlobalArgs,
    report: &InventoryReport,
    output_args: &OutputArgs,
    elapsed: Option<Duration>,
) -> Result<()> {
    let styles = Styles::new(global_args.use_color(std::io::stdout()));
    let reporter = InventoryReporter { report, styles, elapsed };

    let writer = get_writer_for_file_or_stdout::<&Path>(None)?;
    reporter.report(output_args.format, writer)?;

    if let Some(path) = &output_args.json_out {
        let writer = get_writer_for_file_or_stdout(Some(path))
            .with_context(|| format!("Failed to create {}", path.display()))?;
        reporter.json_format(writer)?;
        info!("Wrote report to {}", path.display());
    }

    if let Some(dir) = &output_args.out_dir {
        let written = write_product_files(report, dir)?;
        info!("Wrote {} product files to {}", written.len(), dir.display());
    }
    Ok(())
}

pub trait Reportable {
    type Format;

    fn report<W: Write>(&self, format: Self::Format, writer: W) -> Result<()>;
}

pub struct InventoryReporter<'a> {
    pub report: &'a InventoryReport,
    pub styles: Styles,
    pub elapsed: Option<Duration>,
}

impl Reportable for InventoryReporter<'_> {
    type Format = ReportOutputFormat;

    fn report<W: Write>(&self, format: Self::Format, writer: W) -> Result<()> {
        match format {
            ReportOutputFormat::Pretty => self.pretty_format(writer),
            ReportOutputFormat::Json => self.json_format(writer),
        }
    }
}

impl InventoryReporter<'_> {
    fn style_heading<D>(&self, val: D) -> StyledObject<D> {
        self.styles.style_heading.apply_to(val)
    }

    fn style_product<D>(&self, val: D) -> StyledObject<D> {
        self.styles.style_product.apply_to(val)
    }

    fn style_ok<D>(&self, val: D) -> StyledObject<D> {
        self.styles.style_ok.apply_to(val)
    }

    fn style_failed<D>(&self, val: D) -> StyledObject<D> {
        self.styles.style_failed.apply_to(val)
    }

    fn style_skipped<D>(&self, val: D) -> StyledObject<D> {
        self.styles.style_skipped.apply_to(val)
    }

    fn style_metadata<D>(&self, val: D) -> StyledObject<D> {
        self.styles.style_metadata.apply_to(val)
    }
}

/// What `accounts` prints: the filter's decision for every product.
pub struct PlanReporter<'a> {
    pub environment: Environment,
    pub policy: FilterPolicy,
    pub plan: &'a [ProductPlan],
    pub styles: Styles,
}

impl Reportable for PlanReporter<'_> {
    type Format = ReportOutputFormat;

    fn report<W: Write>(&self, format: Self::Format, writer: W) -> Result<()> {
        match format {
            ReportOutputFormat::Pretty => self.pretty_format(writer),
            ReportOutputFormat::Json => self.json_format(writer),
        }
    }
}

/// Records of one product, grouped by account name. Accounts without records
/// are left out.
#[derive(Serialize)]
struct ProductFile<'a> {
    product: &'a str,
    environment: Environment,
    kind: ResourceKind,
    generated_at: chrono::DateTime<chrono::Utc>,
    accounts: serde_json::Map<String, serde_json::Value>,
}

fn product_file<'a>(
    report: &InventoryReport,
    product: &'a str,
    data: &ProductReport,
) -> Result<Option<ProductFile<'a>>> {
    let mut accounts = serde_json::Map::new();
    for entry in data.accounts() {
        let records: &[Record] = entry.records();
        if !records.is_empty() {
            accounts.insert(entry.account_name.clone(), serde_json::to_value(records)?);
        }
    }
    if accounts.is_empty() {
        return Ok(None);
    }
    Ok(Some(ProductFile {
        product,
        environment: report.environment,
        kind: report.kind,
        generated_at: report.generated_at,
        accounts,
    }))
}

/// Write `{product}_{kind}.json` for every product with at least one record.
pub fn write_product_files(report: &InventoryReport, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let mut written = Vec::new();
    for (product, data) in &report.products {
        let Some(file) = product_file(report, product, data)? else {
            continue;
        };
        let path = dir.join(format!("{}_{}.json", file_safe_name(product), report.kind));
        let mut writer = get_writer_for_file_or_stdout(Some(&path))
            .with_context(|| format!("Failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(&mut writer, &file)?;
        writeln!(writer)?;
        writer.flush()?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        aggregate::aggregate,
        catalog::Account,
        scheduler::{AccountFailure, FailureKind, Outcome, PerAccountResult},
    };

    pub(super) fn sample_report() -> InventoryReport {
        let mut record = Record::new();
        record.insert("Domain Name".into(), "example.com".into());
        let included = vec![Account::new("111", "prod-billing"), Account::new("222", "prod-billing-dr")];
        let results = vec![
            PerAccountResult {
                account_id: "111".into(),
                account_name: "prod-billing".into(),
                outcome: Outcome::Records(vec![record]),
            },
            PerAccountResult {
                account_id: "222".into(),
                account_name: "prod-billing-dr".into(),
                outcome: Outcome::Failed(AccountFailure::new(
                    FailureKind::CollectorDenied,
                    "acm:ListCertificates denied: AccessDeniedException",
                )),
            },
        ];
        let mut report = InventoryReport::new(Environment::Production, ResourceKind::Certificates);
        report.push("billing", aggregate("billing", &included, Vec::new(), results));
        report.push("search", ProductReport::Skipped { skipped: Vec::new() });
        report
    }

    #[test]
    fn writes_one_file_per_product_with_records() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_product_files(&sample_report(), dir.path()).unwrap();
        assert_eq!(written, vec![dir.path().join("billing_certificates.json")]);

        let contents = std::fs::read_to_string(&written[0]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value["product"], "billing");
        assert_eq!(value["accounts"]["prod-billing"][0]["Domain Name"], "example.com");
        assert!(value["accounts"].get("prod-billing-dr").is_none());
    }
}

use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
};

use serde_json::Value;

use super::*;
use crate::{
    aggregate::{AccountEntry, EntryStatus, SkippedEntry},
    util::Counted,
};

// Record fields the breakdown reads. The collectors own these names.
const DOMAIN_NAME: &str = "Domain Name";
const DAYS_UNTIL_EXPIRY: &str = "Days Until Expiry";
const EXPIRATION_STATUS: &str = "Expiration Status";
const STATE: &str = "State";
const TYPE: &str = "Type";

impl InventoryReporter<'_> {
    pub fn pretty_format<W: Write>(&self, mut writer: W) -> Result<()> {
        let report = self.report;
        writeln!(
            writer,
            "{}",
            self.style_heading(format!(
                "Inventory of {} in {} ({})",
                report.kind,
                report.environment,
                report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
            ))
        )?;
        writeln!(writer)?;

        for (product, data) in &report.products {
            writeln!(writer, "{}", PrettyProduct(self, product, data))?;
        }

        let summary = report.summary();
        writeln!(
            writer,
            "{} {} inventoried ({}), {} failed, {} skipped by filter",
            self.style_heading("Summary:"),
            Counted::regular(summary.inventoried, "account"),
            Counted::regular(summary.records, "record"),
            summary.failed,
            summary.skipped,
        )?;
        if summary.products_skipped > 0 || summary.products_failed > 0 {
            writeln!(
                writer,
                "         {} skipped, {} failed",
                Counted::regular(summary.products_skipped, "product"),
                summary.products_failed,
            )?;
        }
        if !summary.failures_by_kind.is_empty() {
            let kinds: Vec<String> = summary
                .failures_by_kind
                .iter()
                .map(|(kind, count)| format!("{kind}: {count}"))
                .collect();
            writeln!(writer, "         failures by kind: {}", kinds.join(", "))?;
        }
        self.write_breakdown(&mut writer)?;
        if let Some(elapsed) = self.elapsed {
            let elapsed = Duration::from_millis(elapsed.as_millis() as u64);
            writeln!(writer, "         finished in {}", humantime::format_duration(elapsed))?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// A certificate that is expired or about to be.
struct Expiring<'a> {
    days: Option<i64>,
    expired: bool,
    domain: &'a str,
    product: &'a str,
    account: &'a str,
}

impl InventoryReporter<'_> {
    fn records(&self) -> impl Iterator<Item = (&str, &AccountEntry, &Record)> + '_ {
        self.report.products.iter().flat_map(|(product, data)| {
            data.accounts().iter().flat_map(move |entry| {
                entry.records().iter().map(move |record| (product.as_str(), entry, record))
            })
        })
    }

    /// Counts by the field that matters for the resource kind, plus the
    /// certificates needing attention.
    fn write_breakdown<W: Write>(&self, writer: &mut W) -> Result<()> {
        let (field, label) = match self.report.kind {
            ResourceKind::Certificates => (EXPIRATION_STATUS, "by expiration status"),
            ResourceKind::Instances => (STATE, "by state"),
            ResourceKind::LoadBalancers => (TYPE, "by type"),
        };
        let counts = count_by(self.records().map(|(_, _, record)| record), field);
        if counts.is_empty() {
            return Ok(());
        }
        let counts: Vec<String> =
            counts.iter().map(|(value, count)| format!("{value}: {count}")).collect();
        writeln!(writer, "         {} {label}: {}", self.report.kind, counts.join(", "))?;

        if self.report.kind == ResourceKind::Certificates {
            self.write_expiring(writer)?;
        }
        Ok(())
    }

    fn write_expiring<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut expiring: Vec<Expiring<'_>> = self
            .records()
            .filter_map(|(product, entry, record)| {
                let expired = match text_field(record, EXPIRATION_STATUS) {
                    "expired" => true,
                    "approaching" => false,
                    _ => return None,
                };
                Some(Expiring {
                    days: record.get(DAYS_UNTIL_EXPIRY).and_then(Value::as_i64),
                    expired,
                    domain: text_field(record, DOMAIN_NAME),
                    product,
                    account: entry.account_name.as_str(),
                })
            })
            .collect();
        if expiring.is_empty() {
            return Ok(());
        }
        expiring.sort_by_key(|cert| (!cert.expired, cert.days));

        writeln!(writer)?;
        writeln!(writer, "{}", self.style_heading("Certificates needing attention"))?;
        for cert in &expiring {
            let days = cert.days.map_or_else(|| "N/A".to_string(), |days| days.to_string());
            let location = format!("{} / {}", cert.product, cert.account);
            if cert.expired {
                writeln!(
                    writer,
                    " |Expired.......: {} ({}) {}",
                    cert.domain,
                    self.style_metadata(location),
                    self.style_failed(format!("{days} days"))
                )?;
            } else {
                writeln!(
                    writer,
                    " |Approaching...: {} ({}) {}",
                    cert.domain,
                    self.style_metadata(location),
                    self.style_skipped(format!("{days} days left"))
                )?;
            }
        }
        Ok(())
    }
}

fn text_field<'a>(record: &'a Record, field: &str) -> &'a str {
    record.get(field).and_then(Value::as_str).unwrap_or("N/A")
}

fn count_by<'a>(records: impl Iterator<Item = &'a Record>, field: &str) -> BTreeMap<&'a str, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(text_field(record, field)).or_default() += 1;
    }
    counts
}

struct PrettyProduct<'a>(&'a InventoryReporter<'a>, &'a str, &'a ProductReport);

impl Display for PrettyProduct<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let PrettyProduct(reporter, product, data) = self;
        match data {
            ProductReport::Collected { accounts, skipped } => {
                writeln!(f, "{}", reporter.style_product(product))?;
                for entry in accounts {
                    write!(f, "{}", PrettyEntry(reporter, entry))?;
                }
                for entry in skipped {
                    write_skipped(f, reporter, entry)?;
                }
            }
            ProductReport::Skipped { skipped } => {
                writeln!(
                    f,
                    "{} {}",
                    reporter.style_product(product),
                    reporter.style_skipped("(no matching accounts)")
                )?;
                for entry in skipped {
                    write_skipped(f, reporter, entry)?;
                }
            }
            ProductReport::Failed { kind, reason } => {
                writeln!(f, "{}", reporter.style_product(product))?;
                writeln!(f, " |Failed........: {}", reporter.style_failed(kind))?;
                writeln!(f, " |__Reason......: {reason}")?;
            }
        }
        Ok(())
    }
}

fn write_skipped(
    f: &mut Formatter<'_>,
    reporter: &InventoryReporter<'_>,
    entry: &SkippedEntry,
) -> FmtResult {
    writeln!(
        f,
        " |Skipped.......: {} ({}) {}",
        entry.account_name,
        reporter.style_metadata(&entry.account_id),
        reporter.style_skipped(&entry.reason)
    )
}

struct PrettyEntry<'a>(&'a InventoryReporter<'a>, &'a AccountEntry);

impl Display for PrettyEntry<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let PrettyEntry(reporter, entry) = self;
        let account =
            format!("{} ({})", entry.account_name, reporter.style_metadata(&entry.account_id));
        match &entry.status {
            EntryStatus::Collected { records } => writeln!(
                f,
                " |Inventoried...: {account} {}",
                reporter.style_ok(Counted::regular(records.len(), "record"))
            ),
            EntryStatus::NoRecords => {
                writeln!(f, " |Inventoried...: {account} {}", reporter.style_ok("no records"))
            }
            EntryStatus::Failed { kind, message } => {
                writeln!(f, " |Failed........: {account} {}", reporter.style_failed(kind))?;
                writeln!(f, " |__Reason......: {message}")
            }
        }
    }
}

impl PlanReporter<'_> {
    pub fn pretty_format<W: Write>(&self, mut writer: W) -> Result<()> {
        let heading = self.styles.style_heading.apply_to(format!(
            "Accounts for {} ({} filter)",
            self.environment,
            match self.policy {
                FilterPolicy::Legacy => "legacy",
                FilterPolicy::Strict => "strict",
            }
        ));
        writeln!(writer, "{heading}")?;
        writeln!(writer)?;

        let mut included = 0;
        let mut skipped = 0;
        for plan in self.plan {
            writeln!(writer, "{}", self.styles.style_product.apply_to(&plan.product))?;
            for account in &plan.selection.included {
                writeln!(
                    writer,
                    " |Included......: {} ({})",
                    account.name,
                    self.styles.style_metadata.apply_to(&account.id)
                )?;
            }
            for entry in &plan.selection.skipped {
                writeln!(
                    writer,
                    " |Skipped.......: {} ({}) {}",
                    entry.account.name,
                    self.styles.style_metadata.apply_to(&entry.account.id),
                    self.styles.style_skipped.apply_to(&entry.reason)
                )?;
            }
            writeln!(writer)?;
            included += plan.selection.included.len();
            skipped += plan.selection.skipped.len();
        }
        writeln!(
            writer,
            "{} {} included, {} skipped",
            self.styles.style_heading.apply_to("Summary:"),
            Counted::regular(included, "account"),
            skipped
        )?;
        writer.flush()?;
        Ok(())
    }
}

use super::*;
use crate::aggregate::Summary;

impl InventoryReporter<'_> {
    pub fn json_format<W: Write>(&self, mut writer: W) -> Result<()> {
        #[derive(Serialize)]
        struct Document<'a> {
            #[serde(flatten)]
            report: &'a InventoryReport,
            summary: Summary,
        }

        let document = Document { report: self.report, summary: self.report.summary() };
        serde_json::to_writer_pretty(&mut writer, &document)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}

impl PlanReporter<'_> {
    pub fn json_format<W: Write>(&self, mut writer: W) -> Result<()> {
        #[derive(Serialize)]
        struct Document {
            environment: Environment,
            filter_policy: FilterPolicy,
            products: serde_json::Map<String, serde_json::Value>,
        }

        let mut products = serde_json::Map::new();
        for plan in self.plan {
            products.insert(plan.product.clone(), serde_json::to_value(&plan.selection)?);
        }
        let document = Document {
            environment: self.environment,
            filter_policy: self.policy,
            products,
        };
        serde_json::to_writer_pretty(&mut writer, &document)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}

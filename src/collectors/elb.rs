use async_trait::async_trait;
use aws_sdk_elasticloadbalancing::{
    types::LoadBalancerDescription, Client as ClassicElbClient,
};
use aws_sdk_elasticloadbalancingv2::{
    types::{LoadBalancer, LoadBalancerTypeEnum},
    Client as ElbV2Client,
};
use tracing::debug;

use super::{account_config, classify_sdk_error, insert, text_or_na, time_or_na, CollectorSettings};
use crate::{
    collector::{Collector, CollectorError, Record, ResourceKind},
    credentials::ReadOnlyCredential,
};

/// Application, network and gateway load balancers (ELBv2) followed by
/// classic load balancers.
///
/// Either listing failing fails the whole account; a half-listed account would
/// look complete in the report.
pub struct LoadBalancerCollector {
    settings: CollectorSettings,
}

impl LoadBalancerCollector {
    pub fn new(settings: CollectorSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Collector for LoadBalancerCollector {
    fn kind(&self) -> ResourceKind {
        ResourceKind::LoadBalancers
    }

    async fn collect(
        &self,
        credential: &ReadOnlyCredential,
        region: &str,
    ) -> Result<Vec<Record>, CollectorError> {
        let config = account_config(credential, region, &self.settings.aws).await?;
        let mut records = Vec::new();

        let v2 = ElbV2Client::new(&config);
        let mut marker: Option<String> = None;
        loop {
            let resp = v2
                .describe_load_balancers()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|err| classify_sdk_error("elbv2:DescribeLoadBalancers", err))?;
            records.extend(resp.load_balancers().iter().map(v2_record));
            match resp.next_marker() {
                Some(next) if !next.is_empty() => marker = Some(next.to_string()),
                _ => break,
            }
        }
        let v2_count = records.len();

        let classic = ClassicElbClient::new(&config);
        let mut marker: Option<String> = None;
        loop {
            let resp = classic
                .describe_load_balancers()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|err| classify_sdk_error("elb:DescribeLoadBalancers", err))?;
            records.extend(resp.load_balancer_descriptions().iter().map(classic_record));
            match resp.next_marker() {
                Some(next) if !next.is_empty() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        debug!(
            "Found {v2_count} ELBv2 and {} classic load balancers in {} ({region})",
            records.len() - v2_count,
            credential.account_id()
        );
        Ok(records)
    }
}

fn v2_type_label(kind: Option<&LoadBalancerTypeEnum>) -> &'static str {
    match kind {
        Some(LoadBalancerTypeEnum::Application) => "ALB",
        Some(LoadBalancerTypeEnum::Network) => "NLB",
        Some(LoadBalancerTypeEnum::Gateway) => "GWLB",
        _ => "ELBv2",
    }
}

fn v2_record(lb: &LoadBalancer) -> Record {
    let mut record = Record::new();
    insert(&mut record, "Name", text_or_na(lb.load_balancer_name()));
    insert(&mut record, "Type", v2_type_label(lb.r#type()));
    insert(&mut record, "ARN", text_or_na(lb.load_balancer_arn()));
    insert(&mut record, "DNS Name", text_or_na(lb.dns_name()));
    insert(
        &mut record,
        "State",
        text_or_na(lb.state().and_then(|s| s.code()).map(|c| c.as_str())),
    );
    insert(&mut record, "Scheme", text_or_na(lb.scheme().map(|s| s.as_str())));
    insert(&mut record, "VPC ID", text_or_na(lb.vpc_id()));
    insert(&mut record, "Created Time", time_or_na(lb.created_time()));
    record
}

fn classic_record(lb: &LoadBalancerDescription) -> Record {
    let mut record = Record::new();
    insert(&mut record, "Name", text_or_na(lb.load_balancer_name()));
    insert(&mut record, "Type", "CLB");
    insert(&mut record, "ARN", "N/A");
    insert(&mut record, "DNS Name", text_or_na(lb.dns_name()));
    insert(&mut record, "State", "N/A");
    insert(&mut record, "Scheme", text_or_na(lb.scheme()));
    insert(&mut record, "VPC ID", text_or_na(lb.vpc_id()));
    insert(&mut record, "Created Time", time_or_na(lb.created_time()));
    record
}

#[cfg(test)]
mod tests {
    use aws_sdk_elasticloadbalancingv2::types::{
        LoadBalancerSchemeEnum, LoadBalancerState, LoadBalancerStateEnum,
    };
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn v2_and_classic_share_columns() {
        let alb = LoadBalancer::builder()
            .load_balancer_name("public-api")
            .r#type(LoadBalancerTypeEnum::Application)
            .state(LoadBalancerState::builder().code(LoadBalancerStateEnum::Active).build())
            .scheme(LoadBalancerSchemeEnum::InternetFacing)
            .build();
        let clb = LoadBalancerDescription::builder()
            .load_balancer_name("legacy")
            .scheme("internal")
            .build();

        let alb = v2_record(&alb);
        let clb = classic_record(&clb);
        assert_eq!(alb.keys().collect::<Vec<_>>(), clb.keys().collect::<Vec<_>>());
        assert_eq!(alb["Type"], "ALB");
        assert_eq!(alb["State"], "active");
        assert_eq!(alb["Scheme"], "internet-facing");
        assert_eq!(clb["Type"], "CLB");
        assert_eq!(clb["ARN"], "N/A");
        assert_eq!(clb["Scheme"], "internal");
    }

    #[test]
    fn labels_v2_types() {
        assert_eq!(v2_type_label(Some(&LoadBalancerTypeEnum::Network)), "NLB");
        assert_eq!(v2_type_label(Some(&LoadBalancerTypeEnum::Gateway)), "GWLB");
        assert_eq!(v2_type_label(None), "ELBv2");
    }
}

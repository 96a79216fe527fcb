use async_trait::async_trait;
use aws_sdk_ec2::{types::Instance, Client as Ec2Client};
use tracing::debug;

use super::{account_config, classify_sdk_error, insert, text_or_na, time_or_na, CollectorSettings};
use crate::{
    collector::{Collector, CollectorError, Record, ResourceKind},
    credentials::ReadOnlyCredential,
};

/// EC2 instances across every reservation in the region.
pub struct InstanceCollector {
    settings: CollectorSettings,
}

impl InstanceCollector {
    pub fn new(settings: CollectorSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Collector for InstanceCollector {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Instances
    }

    async fn collect(
        &self,
        credential: &ReadOnlyCredential,
        region: &str,
    ) -> Result<Vec<Record>, CollectorError> {
        let config = account_config(credential, region, &self.settings.aws).await?;
        let client = Ec2Client::new(&config);

        let mut records = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let resp = client
                .describe_instances()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|err| classify_sdk_error("ec2:DescribeInstances", err))?;

            for reservation in resp.reservations() {
                records.extend(reservation.instances().iter().map(instance_record));
            }

            match resp.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!("Found {} instances in {} ({region})", records.len(), credential.account_id());
        Ok(records)
    }
}

fn instance_record(instance: &Instance) -> Record {
    let name = instance
        .tags()
        .iter()
        .find(|tag| tag.key() == Some("Name"))
        .and_then(|tag| tag.value());
    let tags = instance
        .tags()
        .iter()
        .map(|tag| format!("{}:{}", tag.key().unwrap_or_default(), tag.value().unwrap_or_default()))
        .collect::<Vec<_>>()
        .join(", ");

    let mut record = Record::new();
    insert(&mut record, "Instance ID", text_or_na(instance.instance_id()));
    insert(&mut record, "Name", text_or_na(name));
    insert(&mut record, "Type", text_or_na(instance.instance_type().map(|t| t.as_str())));
    insert(
        &mut record,
        "State",
        text_or_na(instance.state().and_then(|s| s.name()).map(|n| n.as_str())),
    );
    insert(
        &mut record,
        "Availability Zone",
        text_or_na(instance.placement().and_then(|p| p.availability_zone())),
    );
    insert(&mut record, "Private IP", text_or_na(instance.private_ip_address()));
    insert(&mut record, "Public IP", text_or_na(instance.public_ip_address()));
    insert(&mut record, "VPC ID", text_or_na(instance.vpc_id()));
    insert(&mut record, "Subnet ID", text_or_na(instance.subnet_id()));
    insert(&mut record, "Image ID", text_or_na(instance.image_id()));
    insert(&mut record, "Platform", text_or_na(instance.platform_details()));
    insert(&mut record, "Launch Time", time_or_na(instance.launch_time()));
    insert(&mut record, "Tags", tags);
    record
}

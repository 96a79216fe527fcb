use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

use crate::credentials::ReadOnlyCredential;

/// Collector-defined record. The engine never looks inside.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Resource kinds the bundled collectors can inventory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, ValueEnum, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// TLS certificates from ACM
    #[value(alias = "certs")]
    Certificates,
    /// EC2 instances
    #[value(alias = "ec2")]
    Instances,
    /// Application, network, gateway and classic load balancers
    #[value(alias = "lb")]
    LoadBalancers,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectorError {
    /// Throttling, network faults and any other operational failure.
    #[error("{operation} failed: {message}")]
    Transient { operation: String, message: String },
    /// The read-only role is not allowed to make the call.
    #[error("{operation} denied: {message}")]
    Denied { operation: String, message: String },
}

impl CollectorError {
    pub fn transient(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient { operation: operation.into(), message: message.into() }
    }

    pub fn denied(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Denied { operation: operation.into(), message: message.into() }
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied { .. })
    }
}

/// Lists one resource kind in one account.
#[async_trait]
pub trait Collector: Send + Sync {
    fn kind(&self) -> ResourceKind;

    async fn collect(
        &self,
        credential: &ReadOnlyCredential,
        region: &str,
    ) -> Result<Vec<Record>, CollectorError>;
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn kinds_render_kebab_case() {
        assert_eq!(ResourceKind::LoadBalancers.to_string(), "load-balancers");
        assert_eq!(serde_json::to_string(&ResourceKind::Certificates).unwrap(), "\"certificates\"");
    }

    #[test]
    fn error_categories_are_distinct() {
        let denied = CollectorError::denied("acm:ListCertificates", "AccessDeniedException");
        let transient = CollectorError::transient("acm:ListCertificates", "Throttling");
        assert!(denied.is_denied());
        assert!(!transient.is_denied());
        assert_eq!(denied.to_string(), "acm:ListCertificates denied: AccessDeniedException");
    }
}

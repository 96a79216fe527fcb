//! Run settings, read from an optional YAML file and overridden by CLI flags.

use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{
    aws::AwsSettings, collectors::CollectorSettings, credentials::ManagementRoles,
    environment::Environment, filter::FilterPolicy, scheduler::Scheduler,
};

/// STS accepts session durations between 15 minutes and 12 hours.
pub const MIN_CREDENTIAL_SECS: u64 = 900;
pub const MAX_CREDENTIAL_SECS: u64 = 43_200;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse settings from {path}{location}: {source}")]
    Parse {
        path: PathBuf,
        location: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Management role ARN assumed from the root identity, per environment.
    pub management_roles: BTreeMap<Environment, String>,
    /// Role name assumed inside every target account.
    pub read_only_role: String,
    pub region: String,
    pub session_name: String,
    pub credential_duration_secs: u64,
    pub max_concurrency: usize,
    pub call_timeout_secs: Option<u64>,
    pub deadline_secs: Option<u64>,
    pub filter_policy: FilterPolicy,
    pub expiry_warning_days: i64,
    /// Named profile for the root identity; the default chain when unset.
    pub profile: Option<String>,
    pub max_attempts: u32,
    pub attempt_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            management_roles: BTreeMap::new(),
            read_only_role: "read-only-role".to_string(),
            region: "us-east-1".to_string(),
            session_name: "cloud-inventory".to_string(),
            credential_duration_secs: 3600,
            max_concurrency: Scheduler::default().width(),
            call_timeout_secs: None,
            deadline_secs: None,
            filter_policy: FilterPolicy::default(),
            expiry_warning_days: 30,
            profile: None,
            max_attempts: 3,
            attempt_timeout_secs: 20,
        }
    }
}

/// Flag values that take precedence over the settings file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub region: Option<String>,
    pub read_only_role: Option<String>,
    pub max_concurrency: Option<usize>,
    pub call_timeout_secs: Option<u64>,
    pub deadline_secs: Option<u64>,
    pub filter_policy: Option<FilterPolicy>,
    pub profile: Option<String>,
}

impl Settings {
    /// Load from `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let settings = Self::from_yaml_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            location: source.location().map_or(String::new(), |loc| {
                format!(" at line {} column {}", loc.line(), loc.column())
            }),
            source,
        })?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, serde_yaml::Error> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents)
    }

    pub fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(region) = overrides.region {
            self.region = region;
        }
        if let Some(role) = overrides.read_only_role {
            self.read_only_role = role;
        }
        if let Some(width) = overrides.max_concurrency {
            self.max_concurrency = width;
        }
        if overrides.call_timeout_secs.is_some() {
            self.call_timeout_secs = overrides.call_timeout_secs;
        }
        if overrides.deadline_secs.is_some() {
            self.deadline_secs = overrides.deadline_secs;
        }
        if let Some(policy) = overrides.filter_policy {
            self.filter_policy = policy;
        }
        if overrides.profile.is_some() {
            self.profile = overrides.profile;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: &str| ConfigError::Invalid { field, reason: reason.to_string() };
        if self.max_concurrency == 0 {
            return Err(invalid("max_concurrency", "must be at least 1"));
        }
        if !(MIN_CREDENTIAL_SECS..=MAX_CREDENTIAL_SECS).contains(&self.credential_duration_secs) {
            return Err(ConfigError::Invalid {
                field: "credential_duration_secs",
                reason: format!(
                    "{} is outside {MIN_CREDENTIAL_SECS}..={MAX_CREDENTIAL_SECS}",
                    self.credential_duration_secs
                ),
            });
        }
        if self.read_only_role.trim().is_empty() {
            return Err(invalid("read_only_role", "must not be empty"));
        }
        if self.region.trim().is_empty() {
            return Err(invalid("region", "must not be empty"));
        }
        if self.session_name.trim().is_empty() {
            return Err(invalid("session_name", "must not be empty"));
        }
        if self.call_timeout_secs == Some(0) {
            return Err(invalid("call_timeout_secs", "must be positive when set"));
        }
        if self.deadline_secs == Some(0) {
            return Err(invalid("deadline_secs", "must be positive when set"));
        }
        if self.expiry_warning_days < 0 {
            return Err(invalid("expiry_warning_days", "must not be negative"));
        }
        if self.max_attempts == 0 {
            return Err(invalid("max_attempts", "must be at least 1"));
        }
        if let Some((env, _)) = self.management_roles.iter().find(|(_, arn)| !arn.starts_with("arn:")) {
            return Err(ConfigError::Invalid {
                field: "management_roles",
                reason: format!("role for {env} is not an ARN"),
            });
        }
        Ok(())
    }

    pub fn management_roles(&self) -> ManagementRoles {
        ManagementRoles::new(
            self.management_roles
                .iter()
                .map(|(env, arn)| (*env, arn.clone()))
                .collect::<HashMap<_, _>>(),
        )
    }

    pub fn aws(&self) -> AwsSettings {
        AwsSettings {
            region: self.region.clone(),
            max_attempts: self.max_attempts,
            attempt_timeout: Duration::from_secs(self.attempt_timeout_secs),
        }
    }

    pub fn collector_settings(&self) -> CollectorSettings {
        CollectorSettings { aws: self.aws(), expiry_warning_days: self.expiry_warning_days }
    }

    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(self.max_concurrency)
            .with_call_timeout(self.call_timeout_secs.map(Duration::from_secs))
            .with_deadline(self.deadline_secs.map(Duration::from_secs))
    }

    pub fn credential_duration(&self) -> Duration {
        Duration::from_secs(self.credential_duration_secs)
    }
}

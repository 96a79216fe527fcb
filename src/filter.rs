//! Select the accounts of a product that belong to one environment.
//!
//! An explicit `environment` attribute on a catalog entry always wins. Entries
//! without one are classified from their display name, which is only a naming
//! convention and breaks as soon as a name carries no marker (or two).

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::{catalog::Account, environment::Environment};

/// How display-name markers are interpreted for accounts without an explicit
/// environment attribute.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FilterPolicy {
    /// Production excludes names carrying a non-production marker; every other
    /// environment excludes names carrying the production marker. Unmarked
    /// names are included everywhere.
    #[default]
    Legacy,
    /// Include only names carrying the target marker and no other marker.
    Strict,
}

/// Why an account was left out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedAccount {
    pub account: Account,
    pub reason: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FilterOutcome {
    pub included: Vec<Account>,
    pub skipped: Vec<SkippedAccount>,
}

impl FilterOutcome {
    pub fn is_empty(&self) -> bool {
        self.included.is_empty()
    }
}

pub fn filter_accounts(
    accounts: &[Account],
    target: Environment,
    policy: FilterPolicy,
) -> FilterOutcome {
    let mut outcome = FilterOutcome::default();
    for account in accounts {
        match exclusion_reason(account, target, policy) {
            None => outcome.included.push(account.clone()),
            Some(reason) => {
                outcome.skipped.push(SkippedAccount { account: account.clone(), reason })
            }
        }
    }
    outcome
}

fn exclusion_reason(account: &Account, target: Environment, policy: FilterPolicy) -> Option<String> {
    if let Some(env) = account.environment {
        return (env != target).then(|| format!("tagged as {env}"));
    }

    let name = account.name.to_ascii_lowercase();
    let found: Vec<Environment> =
        Environment::iter().filter(|env| name.contains(env.marker())).collect();

    match policy {
        FilterPolicy::Legacy => {
            if target.is_production() {
                found
                    .iter()
                    .find(|env| !env.is_production())
                    .map(|env| format!("name carries the '{}' marker", env.marker()))
            } else {
                found
                    .contains(&Environment::Production)
                    .then(|| "name carries the 'pro' marker".to_string())
            }
        }
        FilterPolicy::Strict => match found.as_slice() {
            [only] if *only == target => None,
            [] => Some("name carries no environment marker".to_string()),
            [only] => Some(format!("name carries the '{}' marker", only.marker())),
            _ => Some("name carries more than one environment marker".to_string()),
        },
    }
}

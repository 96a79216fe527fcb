use std::{fmt, str::FromStr};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};

use crate::credentials::IdentityError;

/// Deployment environment an account belongs to.
///
/// The short tag (`pro`, `pre`, `dev`, `poc`) is also the marker substring
/// searched for in account display names when the catalog does not carry an
/// explicit environment attribute.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    ValueEnum,
    Serialize,
    Deserialize,
)]
pub enum Environment {
    /// Production accounts
    #[value(name = "pro", alias = "production")]
    #[serde(rename = "pro", alias = "production")]
    Production,
    /// Pre-production / staging accounts
    #[value(name = "pre", alias = "staging", alias = "pre-production")]
    #[serde(rename = "pre", alias = "staging", alias = "pre-production")]
    PreProduction,
    /// Development accounts
    #[value(name = "dev", alias = "development")]
    #[serde(rename = "dev", alias = "development")]
    Development,
    /// Proof-of-concept accounts
    #[value(name = "poc", alias = "proof-of-concept")]
    #[serde(rename = "poc", alias = "proof-of-concept")]
    ProofOfConcept,
}

impl Environment {
    pub fn tag(self) -> &'static str {
        match self {
            Environment::Production => "pro",
            Environment::PreProduction => "pre",
            Environment::Development => "dev",
            Environment::ProofOfConcept => "poc",
        }
    }

    /// Lower-case substring that identifies this environment in a display name.
    pub fn marker(self) -> &'static str {
        self.tag()
    }

    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Comma separated list of the accepted tags, for error messages.
    pub fn valid_tags() -> String {
        Environment::iter().map(Environment::tag).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Environment {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pro" | "prod" | "production" => Ok(Environment::Production),
            "pre" | "staging" | "pre-production" | "preprod" => Ok(Environment::PreProduction),
            "dev" | "development" => Ok(Environment::Development),
            "poc" | "proof-of-concept" => Ok(Environment::ProofOfConcept),
            _ => Err(IdentityError::InvalidEnvironment { tag: s.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_tags_and_aliases() {
        assert_eq!("pro".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("Production".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("staging".parse::<Environment>().unwrap(), Environment::PreProduction);
        assert_eq!(" dev ".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("proof-of-concept".parse::<Environment>().unwrap(), Environment::ProofOfConcept);
    }

    #[test]
    fn unknown_tag_is_invalid_environment() {
        let err = "qa".parse::<Environment>().unwrap_err();
        assert!(matches!(err, IdentityError::InvalidEnvironment { ref tag } if tag == "qa"));
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for env in Environment::iter() {
            assert_eq!(env.to_string().parse::<Environment>().unwrap(), env);
        }
        assert_eq!(Environment::valid_tags(), "pro, pre, dev, poc");
    }

    #[test]
    fn serde_uses_short_tags() {
        let json = serde_json::to_string(&Environment::PreProduction).unwrap();
        assert_eq!(json, "\"pre\"");
        let parsed: Environment = serde_json::from_str("\"staging\"").unwrap();
        assert_eq!(parsed, Environment::PreProduction);
    }
}

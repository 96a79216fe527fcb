use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::environment::Environment;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read account catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Account catalog is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Malformed account catalog at {location}: {detail}")]
    Shape { location: String, detail: String },
    #[error("Unknown environment '{tag}' for account {account_id} in product {product}")]
    UnknownEnvironment { product: String, account_id: String, tag: String },
}

/// One account entry of a product.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    /// Explicit environment attribute. When absent the account filter falls
    /// back to display-name markers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
}

impl Account {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into(), environment: None }
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Product {
    pub name: String,
    pub accounts: Vec<Account>,
}

/// Products and their accounts, in file order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| CatalogError::Read { path: path.to_path_buf(), source })?;
        let catalog = Self::from_json_str(&raw)?;
        debug!(
            "Loaded catalog {} with {} products and {} accounts",
            path.display(),
            catalog.products.len(),
            catalog.account_count()
        );
        Ok(catalog)
    }

    /// Parse `{ product: { accountId: name | { "name": .., "environment": .. } } }`.
    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let root: Value = serde_json::from_str(raw)?;
        let Value::Object(products) = root else {
            return Err(shape("$", "expected an object of products"));
        };

        let mut out = Vec::with_capacity(products.len());
        for (product, accounts) in products {
            let Value::Object(accounts) = accounts else {
                return Err(shape(&product, "expected an object of account id to account name"));
            };

            let mut parsed: Vec<Account> = Vec::with_capacity(accounts.len());
            for (account_id, entry) in accounts {
                let account = parse_account(&product, account_id, entry)?;
                // Reports key accounts by display name within a product.
                if let Some(first) = parsed.iter().find(|a| a.name == account.name) {
                    return Err(shape(
                        &format!("{product}.{}", account.id),
                        &format!(
                            "display name '{}' is already used by account {}",
                            account.name, first.id
                        ),
                    ));
                }
                parsed.push(account);
            }
            out.push(Product { name: product, accounts: parsed });
        }

        Ok(Self { products: out })
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn product(&self, name: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.name == name)
    }

    pub fn account_count(&self) -> usize {
        self.products.iter().map(|p| p.accounts.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

fn parse_account(product: &str, account_id: String, entry: Value) -> Result<Account, CatalogError> {
    let location = format!("{product}.{account_id}");
    if account_id.trim().is_empty() {
        return Err(shape(&location, "account id must not be empty"));
    }

    let (name, environment) = match entry {
        Value::String(name) => (name, None),
        Value::Object(mut fields) => {
            let name = match fields.remove("name") {
                Some(Value::String(name)) => name,
                _ => return Err(shape(&location, "expected a string 'name' field")),
            };
            let environment = match fields.remove("environment") {
                None | Some(Value::Null) => None,
                Some(Value::String(tag)) => Some(tag.parse::<Environment>().map_err(|_| {
                    CatalogError::UnknownEnvironment {
                        product: product.to_string(),
                        account_id: account_id.clone(),
                        tag,
                    }
                })?),
                Some(_) => return Err(shape(&location, "'environment' must be a string")),
            };
            (name, environment)
        }
        _ => return Err(shape(&location, "expected a display name or an account object")),
    };

    if name.trim().is_empty() {
        return Err(shape(&location, "account display name must not be empty"));
    }

    Ok(Account { id: account_id, name, environment })
}

fn shape(location: &str, detail: &str) -> CatalogError {
    CatalogError::Shape { location: location.to_string(), detail: detail.to_string() }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_plain_names_in_file_order() {
        let catalog = Catalog::from_json_str(
            r#"{
                "zeta": {"333": "dev-zeta", "111": "prod-zeta"},
                "billing": {"222": "prod-billing"}
            }"#,
        )
        .unwrap();

        let names: Vec<_> = catalog.products().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "billing"]);
        let ids: Vec<_> = catalog.products()[0].accounts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["333", "111"]);
        assert_eq!(catalog.account_count(), 3);
    }

    #[test]
    fn parses_explicit_environment_attribute() {
        let catalog = Catalog::from_json_str(
            r#"{"billing": {"111": {"name": "billing-core", "environment": "production"}}}"#,
        )
        .unwrap();
        assert_eq!(
            catalog.product("billing").unwrap().accounts,
            vec![Account::new("111", "billing-core").with_environment(Environment::Production)]
        );
    }

    #[test]
    fn rejects_unknown_environment_attribute() {
        let err = Catalog::from_json_str(
            r#"{"billing": {"111": {"name": "billing-core", "environment": "qa"}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::UnknownEnvironment { ref tag, .. } if tag == "qa"));
    }

    #[test]
    fn rejects_wrong_shapes() {
        assert!(matches!(Catalog::from_json_str("[]"), Err(CatalogError::Shape { .. })));
        assert!(matches!(
            Catalog::from_json_str(r#"{"billing": ["111"]}"#),
            Err(CatalogError::Shape { .. })
        ));
        assert!(matches!(
            Catalog::from_json_str(r#"{"billing": {"111": 7}}"#),
            Err(CatalogError::Shape { .. })
        ));
        assert!(matches!(
            Catalog::from_json_str(r#"{"billing": {"111": "  "}}"#),
            Err(CatalogError::Shape { .. })
        ));
        assert!(matches!(Catalog::from_json_str("{"), Err(CatalogError::Parse(_))));
    }

    #[test]
    fn rejects_display_name_shared_within_a_product() {
        let err = Catalog::from_json_str(
            r#"{"billing": {"111": "prod-shared", "222": {"name": "prod-shared"}}}"#,
        )
        .unwrap_err();
        match err {
            CatalogError::Shape { location, detail } => {
                assert_eq!(location, "billing.222");
                assert!(detail.contains("prod-shared") && detail.contains("111"), "{detail}");
            }
            other => panic!("unexpected error {other:?}"),
        }

        let catalog = Catalog::from_json_str(
            r#"{"billing": {"111": "prod-shared"}, "search": {"222": "prod-shared"}}"#,
        )
        .unwrap();
        assert_eq!(catalog.account_count(), 2);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Catalog::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, CatalogError::Read { .. }));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"billing": {{"111": "prod-billing"}}}}"#).unwrap();
        let catalog = Catalog::load(file.path()).unwrap();
        assert_eq!(catalog.products().len(), 1);
    }
}

//! OAuth access scopes.

use crate::error::ConfigError;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A set of OAuth access scopes.
///
/// Write scopes imply their read counterpart (`write_products` grants
/// `read_products`), so a set always contains the implied scopes of its
/// members. Scopes serialize as a sorted, comma-separated string, which is
/// the format Shopify returns from the token endpoint.
///
/// ```rust
/// use shopify_app::AuthScopes;
///
/// let granted: AuthScopes = "write_products, read_orders".parse().unwrap();
/// let required: AuthScopes = "read_products".parse().unwrap();
/// assert!(granted.covers(&required));
/// assert_eq!(granted.to_string(), "read_orders,read_products,write_products");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct AuthScopes {
    scopes: BTreeSet<String>,
}

impl AuthScopes {
    /// Creates an empty scope set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Returns `true` if `scope` (or a scope implying it) is in the set.
    #[must_use]
    pub fn has(&self, scope: &str) -> bool {
        self.scopes.contains(scope.trim())
    }

    /// Returns `true` if every scope in `other` is in this set.
    #[must_use]
    pub fn covers(&self, other: &Self) -> bool {
        other.scopes.is_subset(&self.scopes)
    }

    /// Returns an iterator over the scopes in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.scopes.iter().map(String::as_str)
    }

    fn with_implied(scopes: BTreeSet<String>) -> Self {
        let implied: Vec<String> = scopes
            .iter()
            .filter_map(|scope| {
                scope
                    .strip_prefix("unauthenticated_write_")
                    .map(|rest| format!("unauthenticated_read_{rest}"))
                    .or_else(|| scope.strip_prefix("write_").map(|rest| format!("read_{rest}")))
            })
            .collect();

        let mut scopes = scopes;
        scopes.extend(implied);
        Self { scopes }
    }
}

impl FromStr for AuthScopes {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut scopes = BTreeSet::new();

        for scope in s.split(',').map(str::trim).filter(|scope| !scope.is_empty()) {
            if !scope.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(ConfigError::InvalidScopes {
                    reason: format!("Invalid characters in scope: '{scope}'"),
                });
            }
            scopes.insert(scope.to_string());
        }

        Ok(Self::with_implied(scopes))
    }
}

impl fmt::Display for AuthScopes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self.iter().collect::<Vec<_>>().join(",");
        f.write_str(&joined)
    }
}

impl Serialize for AuthScopes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AuthScopes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

//! Parameters handed to adapter factories.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Free-form adapter parameters (`key = "value"` pairs from the setup file).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdapterParams(BTreeMap<String, String>);

impl AdapterParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Parse a parameter, returning `Ok(None)` if it is absent.
    pub fn parse<T: FromStr>(&self, key: &str) -> Result<Option<T>, T::Err> {
        self.get(key).map(str::parse).transpose()
    }
}

impl FromIterator<(String, String)> for AdapterParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Named groups of ledger endpoints (e.g. `validators`, `rpc`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointGroups(BTreeMap<String, Vec<String>>);

impl EndpointGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named group.
    pub fn with_group(mut self, name: impl Into<String>, endpoints: Vec<String>) -> Self {
        self.0.insert(name.into(), endpoints);
        self
    }

    pub fn group(&self, name: &str) -> Option<&[String]> {
        self.0.get(name).map(Vec::as_slice)
    }

    /// Every endpoint across all groups, in group-name order.
    pub fn all(&self) -> Vec<String> {
        self.0.values().flatten().cloned().collect()
    }
}

/// `key=value` environment strings given to a node on its command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment(Vec<String>);

impl Environment {
    pub fn new(entries: Vec<String>) -> Self {
        Self(entries)
    }

    /// Value of the last entry named `key`. A bare `key` yields `""`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().rev().find_map(|entry| match entry.split_once('=') {
            Some((k, v)) if k == key => Some(v),
            None if entry == key => Some(""),
            _ => None,
        })
    }

    pub fn entries(&self) -> &[String] {
        &self.0
    }
}

/// What a secondary knows about the ledger when it builds its client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionView {
    /// Endpoints of the ledger under test.
    pub endpoints: EndpointGroups,

    /// Adapter parameters from the primary's setup file.
    pub parameters: AdapterParams,

    /// The secondary's own environment strings.
    pub env: Environment,

    /// Tags the secondary was started with.
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_parse() {
        let params = AdapterParams::new().with("delay_ms", "25").with("name", "x");
        assert_eq!(params.parse::<u64>("delay_ms").unwrap(), Some(25));
        assert_eq!(params.parse::<u64>("missing").unwrap(), None);
        assert!(params.parse::<u64>("name").is_err());
    }

    #[test]
    fn test_environment_last_entry_wins() {
        let env = Environment::new(vec![
            "fail_at=3".to_string(),
            "verbose".to_string(),
            "fail_at=5".to_string(),
        ]);
        assert_eq!(env.get("fail_at"), Some("5"));
        assert_eq!(env.get("verbose"), Some(""));
        assert_eq!(env.get("absent"), None);
    }

    #[test]
    fn test_endpoint_groups_all() {
        let groups = EndpointGroups::new()
            .with_group("b", vec!["10.0.0.2:80".to_string()])
            .with_group("a", vec!["10.0.0.1:80".to_string()]);
        assert_eq!(groups.all(), vec!["10.0.0.1:80", "10.0.0.2:80"]);
        assert!(groups.group("c").is_none());
    }
}

//! # Loosely typed descriptor parameters
//!
//! Descriptors carry arbitrary nested YAML under keys such as `vars`,
//! `params` and `env`. Rather than passing `serde_yaml::Value` around, the
//! YAML is decoded once into an explicit tree of [`Param`] values keyed by
//! strings, then kept inside the strongly typed environment structures.
//!
//! The only operation the engine needs on that tree is [`Params::merge`]: a
//! deep merge where mappings are merged key by key and any other value set
//! by the incoming side replaces the existing one ("closer wins").

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value as YamlValue;

/// A node of the parameter tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Param {
    /// Any YAML scalar, kept in its textual form. `null` becomes an empty string.
    Scalar(String),
    Sequence(Vec<Param>),
    Mapping(Params),
}

impl Param {
    /// Returns the scalar text, if this is a scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Param::Scalar(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns the nested mapping, if this is a mapping.
    pub fn as_mapping(&self) -> Option<&Params> {
        match self {
            Param::Mapping(m) => Some(m),
            _ => None,
        }
    }

    fn from_yaml(value: &YamlValue) -> Result<Self, String> {
        Ok(match value {
            YamlValue::Null => Param::Scalar(String::new()),
            YamlValue::Bool(b) => Param::Scalar(b.to_string()),
            YamlValue::Number(n) => Param::Scalar(n.to_string()),
            YamlValue::String(s) => Param::Scalar(s.clone()),
            YamlValue::Sequence(seq) => Param::Sequence(
                seq.iter()
                    .map(Param::from_yaml)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            YamlValue::Mapping(_) => Param::Mapping(Params::from_yaml(value)?),
            YamlValue::Tagged(tagged) => Param::from_yaml(&tagged.value)?,
        })
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Scalar(s) => write!(f, "{}", s),
            other => {
                let yaml = serde_yaml::to_string(other).map_err(|_| fmt::Error)?;
                write!(f, "{}", yaml.trim_end())
            }
        }
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Scalar(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Scalar(value)
    }
}

/// A mapping of string keys to [`Param`] values, ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, Param>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a YAML document; `null` yields an empty mapping.
    pub fn from_yaml(value: &YamlValue) -> Result<Self, String> {
        match value {
            YamlValue::Null => Ok(Self::new()),
            YamlValue::Mapping(mapping) => {
                let mut params = Self::new();
                for (key, value) in mapping {
                    let key = match key {
                        YamlValue::String(s) => s.clone(),
                        YamlValue::Bool(b) => b.to_string(),
                        YamlValue::Number(n) => n.to_string(),
                        other => return Err(format!("unsupported mapping key {:?}", other)),
                    };
                    params.0.insert(key, Param::from_yaml(value)?);
                }
                Ok(params)
            }
            YamlValue::Tagged(tagged) => Self::from_yaml(&tagged.value),
            other => Err(format!("expected a mapping, found {:?}", other)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Param> {
        self.0.get(key)
    }

    /// Looks up a dotted path such as `aws.region`.
    pub fn get_path(&self, path: &str) -> Option<&Param> {
        let mut parts = path.split('.');
        let mut current = self.0.get(parts.next()?)?;
        for part in parts {
            current = current.as_mapping()?.0.get(part)?;
        }
        Some(current)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Param>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Param)> {
        self.0.iter()
    }

    /// Deep-merges `other` into `self`; values from `other` win.
    pub fn merge(&mut self, other: &Params) {
        for (key, incoming) in &other.0 {
            match (self.0.get_mut(key), incoming) {
                (Some(Param::Mapping(existing)), Param::Mapping(incoming)) => {
                    existing.merge(incoming);
                }
                _ => {
                    self.0.insert(key.clone(), incoming.clone());
                }
            }
        }
    }

    /// Returns a copy of `self` with `other` merged over it.
    pub fn merged(&self, other: &Params) -> Params {
        let mut result = self.clone();
        result.merge(other);
        result
    }
}

impl From<Params> for Param {
    fn from(value: Params) -> Self {
        Param::Mapping(value)
    }
}

impl<'de> Deserialize<'de> for Params {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = YamlValue::deserialize(deserializer)?;
        Params::from_yaml(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Params {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_decode_nested_tree() {
        let params = parse(
            r#"
region: eu-west-1
count: 3
enabled: true
empty:
tags: [a, b]
network:
  cidr: 10.0.0.0/16
"#,
        );

        assert_eq!(params.get("region"), Some(&Param::from("eu-west-1")));
        assert_eq!(params.get("count"), Some(&Param::from("3")));
        assert_eq!(params.get("enabled"), Some(&Param::from("true")));
        assert_eq!(params.get("empty"), Some(&Param::from("")));
        assert_eq!(
            params.get("tags"),
            Some(&Param::Sequence(vec![Param::from("a"), Param::from("b")]))
        );
        assert_eq!(
            params.get_path("network.cidr").and_then(Param::as_str),
            Some("10.0.0.0/16")
        );
    }

    #[test]
    fn test_decode_null_document_is_empty() {
        let params = parse("~");
        assert!(params.is_empty());
    }

    #[test]
    fn test_decode_rejects_non_mapping() {
        let result = serde_yaml::from_str::<Params>("- a\n- b\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_merge_incoming_wins_on_scalars() {
        let mut base = parse("a: 1\nb: 2\n");
        base.merge(&parse("b: 3\nc: 4\n"));

        assert_eq!(base.get("a"), Some(&Param::from("1")));
        assert_eq!(base.get("b"), Some(&Param::from("3")));
        assert_eq!(base.get("c"), Some(&Param::from("4")));
    }

    #[test]
    fn test_merge_is_deep_for_mappings() {
        let mut base = parse("aws:\n  region: eu\n  zone: a\n");
        base.merge(&parse("aws:\n  zone: b\n"));

        assert_eq!(base.get_path("aws.region"), Some(&Param::from("eu")));
        assert_eq!(base.get_path("aws.zone"), Some(&Param::from("b")));
    }

    #[test]
    fn test_merge_replaces_sequences() {
        let mut base = parse("list: [a, b]\n");
        base.merge(&parse("list: [c]\n"));
        assert_eq!(base.get("list"), Some(&Param::Sequence(vec![Param::from("c")])));
    }

    #[test]
    fn test_serializes_as_plain_json_tree() {
        let params = parse("a: x\nb:\n  c: [1, 2]\n");
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json, serde_json::json!({"a": "x", "b": {"c": ["1", "2"]}}));
    }

    #[test]
    fn test_display_scalar() {
        assert_eq!(Param::from("value").to_string(), "value");
    }
}

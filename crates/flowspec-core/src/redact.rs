// SPDX-License-Identifier: MIT OR Apache-2.0
//! Redaction of sensitive header and query keys.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Replacement value used by [`RedactionPolicy::Mask`].
pub const MASK_VALUE: &str = "***";

/// Replacement value used by [`RedactionPolicy::Hash`].
///
/// A fixed placeholder, not a real digest.
pub const HASH_VALUE: &str = "<hashed>";

/// How a matched sensitive key is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionPolicy {
    /// Remove the entry entirely.
    #[default]
    Drop,
    /// Replace every value with [`MASK_VALUE`].
    Mask,
    /// Replace every value with [`HASH_VALUE`].
    Hash,
}

impl RedactionPolicy {
    /// Parse a policy name; unknown names fall back to [`RedactionPolicy::Drop`].
    #[must_use]
    pub fn parse_lossy(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "mask" => Self::Mask,
            "hash" => Self::Hash,
            _ => Self::Drop,
        }
    }
}

/// One sensitive key together with its policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionRule {
    /// Key to match, case-insensitively, in headers and query parameters.
    pub key: String,
    /// Treatment applied on match.
    pub policy: RedactionPolicy,
}

/// The full redaction configuration for an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionConfig {
    /// Rules applied to every record before emission.
    pub rules: Vec<RedactionRule>,
}

impl RedactionConfig {
    /// Build a configuration applying one policy to all listed keys.
    #[must_use]
    pub fn uniform(keys: &[String], policy: RedactionPolicy) -> Self {
        Self {
            rules: keys
                .iter()
                .map(|k| RedactionRule {
                    key: k.clone(),
                    policy,
                })
                .collect(),
        }
    }

    /// Whether any rule is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The policy for `key`, if any rule matches it case-insensitively.
    #[must_use]
    pub fn policy_for(&self, key: &str) -> Option<RedactionPolicy> {
        self.rules
            .iter()
            .find(|r| r.key.eq_ignore_ascii_case(key))
            .map(|r| r.policy)
    }

    /// Apply this configuration to a multi-valued mapping in place.
    pub fn apply(&self, map: &mut BTreeMap<String, Vec<String>>) {
        if self.is_empty() {
            return;
        }
        let keys: Vec<String> = map.keys().cloned().collect();
        for key in keys {
            match self.policy_for(&key) {
                None => {}
                Some(RedactionPolicy::Drop) => {
                    map.remove(&key);
                }
                Some(RedactionPolicy::Mask) => {
                    if let Some(values) = map.get_mut(&key) {
                        for v in values.iter_mut() {
                            *v = MASK_VALUE.to_string();
                        }
                    }
                }
                Some(RedactionPolicy::Hash) => {
                    if let Some(values) = map.get_mut(&key) {
                        for v in values.iter_mut() {
                            *v = HASH_VALUE.to_string();
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
            .collect()
    }

    #[test]
    fn drop_removes_the_entry() {
        let cfg = RedactionConfig::uniform(&["token".into()], RedactionPolicy::Drop);
        let mut m = map(&[("token", &["abc"]), ("id", &["7"])]);
        cfg.apply(&mut m);
        assert!(!m.contains_key("token"));
        assert_eq!(m["id"], vec!["7"]);
    }

    #[test]
    fn mask_replaces_every_value() {
        let cfg = RedactionConfig::uniform(&["authorization".into()], RedactionPolicy::Mask);
        let mut m = map(&[("authorization", &["Bearer x", "Bearer y"])]);
        cfg.apply(&mut m);
        assert_eq!(m["authorization"], vec![MASK_VALUE, MASK_VALUE]);
    }

    #[test]
    fn hash_uses_fixed_placeholder() {
        let cfg = RedactionConfig::uniform(&["session".into()], RedactionPolicy::Hash);
        let mut m = map(&[("session", &["deadbeef"])]);
        cfg.apply(&mut m);
        assert_eq!(m["session"], vec![HASH_VALUE]);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let cfg = RedactionConfig::uniform(&["X-Api-Key".into()], RedactionPolicy::Drop);
        let mut m = map(&[("x-api-key", &["k"])]);
        cfg.apply(&mut m);
        assert!(m.is_empty());
    }

    #[test]
    fn unknown_policy_name_defaults_to_drop() {
        assert_eq!(RedactionPolicy::parse_lossy("mask"), RedactionPolicy::Mask);
        assert_eq!(RedactionPolicy::parse_lossy("HASH"), RedactionPolicy::Hash);
        assert_eq!(RedactionPolicy::parse_lossy("scrub"), RedactionPolicy::Drop);
    }

    #[test]
    fn mixed_rules_apply_per_key() {
        let cfg = RedactionConfig {
            rules: vec![
                RedactionRule {
                    key: "token".into(),
                    policy: RedactionPolicy::Drop,
                },
                RedactionRule {
                    key: "user".into(),
                    policy: RedactionPolicy::Mask,
                },
            ],
        };
        let mut m = map(&[("token", &["t"]), ("user", &["alice"]), ("page", &["2"])]);
        cfg.apply(&mut m);
        assert!(!m.contains_key("token"));
        assert_eq!(m["user"], vec![MASK_VALUE]);
        assert_eq!(m["page"], vec!["2"]);
    }
}

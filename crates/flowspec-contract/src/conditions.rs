// SPDX-License-Identifier: MIT OR Apache-2.0
//! Named assertion sets that preserve declaration order.
//!
//! Assertions are authored as a YAML mapping from assertion name to a
//! declarative expression. A `BTreeMap` would re-sort them; the report must
//! list assertions in declaration order, so this type keeps the document
//! order intact while still serialising back to a mapping.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// An ordered set of `(name, expression)` assertion pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionSet(pub Vec<(String, Value)>);

impl ConditionSet {
    /// Whether no assertions are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of declared assertions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over `(name, expression)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl Serialize for ConditionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, expr) in &self.0 {
            map.serialize_entry(name, expr)?;
        }
        map.end()
    }
}

struct ConditionSetVisitor;

impl<'de> Visitor<'de> for ConditionSetVisitor {
    type Value = ConditionSet;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a mapping from assertion name to expression")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((name, expr)) = access.next_entry::<String, Value>()? {
            entries.push((name, expr));
        }
        Ok(ConditionSet(entries))
    }
}

impl<'de> Deserialize<'de> for ConditionSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ConditionSetVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn declaration_order_survives_yaml_roundtrip() {
        let yaml = "zeta: {\"==\": [1, 1]}\nalpha: {\"!=\": [1, 2]}\nmiddle: true\n";
        let set: ConditionSet = serde_yaml::from_str(yaml).unwrap();
        let names: Vec<&str> = set.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["zeta", "alpha", "middle"]);

        let back = serde_yaml::to_string(&set).unwrap();
        let zeta = back.find("zeta").unwrap();
        let alpha = back.find("alpha").unwrap();
        assert!(zeta < alpha, "serialized order must match declaration order");
    }

    #[test]
    fn expressions_deserialize_as_json_values() {
        let yaml = "status_ok: {\"in\": [{\"var\": \"span.attributes.http.status_code\"}, [200, 201]]}\n";
        let set: ConditionSet = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(set.len(), 1);
        let (name, expr) = set.iter().next().unwrap();
        assert_eq!(name, "status_ok");
        assert_eq!(
            expr,
            &json!({"in": [{"var": "span.attributes.http.status_code"}, [200, 201]]})
        );
    }

    #[test]
    fn empty_set_is_empty() {
        let set = ConditionSet::default();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
    }
}

//! Cache records produced by agent runs.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Attribute map of a cached entity.
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Relationships of a cached entity: namespace to related ids.
pub type Relationships = BTreeMap<String, BTreeSet<String>>;

/// One cached entity within a namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheData {
    /// Identifier, unique within its namespace.
    pub id: String,
    /// Observed attributes.
    #[serde(default)]
    pub attributes: Attributes,
    /// Links to entities in other namespaces.
    #[serde(default)]
    pub relationships: Relationships,
}

impl CacheData {
    /// Creates an entity with no attributes or relationships.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: Attributes::new(),
            relationships: Relationships::new(),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Adds a relationship to `id` in `namespace`.
    #[must_use]
    pub fn with_relationship(mut self, namespace: impl Into<String>, id: impl Into<String>) -> Self {
        self.relationships
            .entry(namespace.into())
            .or_default()
            .insert(id.into());
        self
    }
}

/// Everything one agent run observed.
///
/// Maps namespace to entities, plus optional explicit evictions. The merge
/// authority of each namespace is not carried here: it comes from the data
/// types the producing agent declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheResult {
    data: BTreeMap<String, Vec<CacheData>>,
    evictions: BTreeMap<String, BTreeSet<String>>,
}

impl CacheResult {
    /// Creates an empty result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds entities to a namespace.
    ///
    /// Registers the namespace even when `items` is empty, which for an
    /// authoritative namespace means "nothing exists any more".
    #[must_use]
    pub fn with_data(mut self, namespace: impl Into<String>, items: impl IntoIterator<Item = CacheData>) -> Self {
        self.data.entry(namespace.into()).or_default().extend(items);
        self
    }

    /// Requests eviction of `id` from `namespace`.
    #[must_use]
    pub fn with_eviction(mut self, namespace: impl Into<String>, id: impl Into<String>) -> Self {
        self.evictions
            .entry(namespace.into())
            .or_default()
            .insert(id.into());
        self
    }

    /// Adds one entity to a namespace.
    pub fn push(&mut self, namespace: impl Into<String>, item: CacheData) {
        self.data.entry(namespace.into()).or_default().push(item);
    }

    /// Entities keyed by namespace.
    #[must_use]
    pub const fn data(&self) -> &BTreeMap<String, Vec<CacheData>> {
        &self.data
    }

    /// Explicit evictions keyed by namespace.
    #[must_use]
    pub const fn evictions(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.evictions
    }

    /// Entities of one namespace, if present.
    #[must_use]
    pub fn get(&self, namespace: &str) -> Option<&[CacheData]> {
        self.data.get(namespace).map(Vec::as_slice)
    }

    /// Total number of entities across namespaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.values().map(Vec::len).sum()
    }

    /// True when the result holds no entities and no evictions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0 && self.evictions.is_empty()
    }

    /// Splits into entities and evictions.
    #[must_use]
    pub fn into_parts(self) -> (BTreeMap<String, Vec<CacheData>>, BTreeMap<String, BTreeSet<String>>) {
        (self.data, self.evictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates_per_namespace() {
        let result = CacheResult::new()
            .with_data("instances", [CacheData::new("i-1")])
            .with_data("instances", [CacheData::new("i-2")])
            .with_data("loadBalancers", []);

        assert_eq!(result.len(), 2);
        assert_eq!(result.get("instances").map(<[CacheData]>::len), Some(2));
        assert_eq!(result.get("loadBalancers").map(<[CacheData]>::len), Some(0));
        assert!(result.get("serverGroups").is_none());
    }

    #[test]
    fn relationships_are_deduplicated() {
        let data = CacheData::new("i-1")
            .with_relationship("loadBalancers", "lb-1")
            .with_relationship("loadBalancers", "lb-1")
            .with_attribute("zone", "us-east-1a");

        assert_eq!(data.relationships["loadBalancers"].len(), 1);
        assert_eq!(data.attributes["zone"], serde_json::json!("us-east-1a"));
    }

    #[test]
    fn evictions_only_is_not_empty() {
        let result = CacheResult::new().with_eviction("instances", "i-9");
        assert_eq!(result.len(), 0);
        assert!(!result.is_empty());
    }
}

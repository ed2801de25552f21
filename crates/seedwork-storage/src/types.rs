//! Definition and result types used by the port traits.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A collection definition as it appears in a schema template.
///
/// Only `collection` and `meta.group` carry meaning for reconciliation;
/// everything else is passed through to the backend untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionDef {
    /// Collection name.
    pub collection: String,
    /// Collection metadata (may contain `group`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    /// Database-level schema information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    /// Any other attributes.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CollectionDef {
    /// Creates a bare collection definition.
    #[must_use]
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            meta: None,
            schema: None,
            extra: Map::new(),
        }
    }

    /// Sets the parent group.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        let meta = self
            .meta
            .get_or_insert_with(|| Value::Object(Map::new()));
        if let Some(obj) = meta.as_object_mut() {
            obj.insert("group".to_string(), Value::String(group.into()));
        }
        self
    }

    /// Returns the parent group this collection is nested under, if any.
    pub fn group(&self) -> Option<&str> {
        self.meta.as_ref()?.get("group")?.as_str()
    }
}

/// A collection as reported by the live backend listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub collection: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl CollectionInfo {
    #[must_use]
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            meta: None,
        }
    }
}

/// A field definition, identified by `(collection, field)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub collection: String,
    pub field: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FieldDef {
    #[must_use]
    pub fn new(collection: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            field: field.into(),
            field_type: None,
            meta: None,
            schema: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn with_type(mut self, field_type: impl Into<String>) -> Self {
        self.field_type = Some(field_type.into());
        self
    }

    /// Identity used in logs: `collection-field`.
    pub fn key(&self) -> String {
        format!("{}-{}", self.collection, self.field)
    }
}

/// A relation definition, identified by `(collection, field, related_collection)`.
///
/// Backends look relations up by `(collection, field)`; a field carries at most
/// one relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDef {
    pub collection: String,
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_collection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RelationDef {
    #[must_use]
    pub fn new(
        collection: impl Into<String>,
        field: impl Into<String>,
        related_collection: Option<&str>,
    ) -> Self {
        Self {
            collection: collection.into(),
            field: field.into(),
            related_collection: related_collection.map(str::to_string),
            meta: None,
            schema: None,
            extra: Map::new(),
        }
    }

    /// Identity used in logs: `collection-field-related`.
    pub fn key(&self) -> String {
        format!(
            "{}-{}-{}",
            self.collection,
            self.field,
            self.related_collection.as_deref().unwrap_or("")
        )
    }
}

/// A read-by-query request against an item collection.
///
/// Filters are equality matches combined with AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemQuery {
    pub filters: Vec<(String, Value)>,
    pub limit: Option<usize>,
}

impl ItemQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality filter.
    #[must_use]
    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Limits the number of returned records.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns `true` if `record` satisfies every filter.
    pub fn matches(&self, record: &Value) -> bool {
        self.filters
            .iter()
            .all(|(field, expected)| record.get(field) == Some(expected))
    }
}

/// Whether a write created a new object or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteOutcome {
    Created,
    Updated,
}

impl fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
        }
    }
}

/// Counts of a batch upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub created: usize,
    pub updated: usize,
}

impl BatchOutcome {
    /// Counts one record's outcome.
    pub fn record(&mut self, outcome: WriteOutcome) {
        match outcome {
            WriteOutcome::Created => self.created += 1,
            WriteOutcome::Updated => self.updated += 1,
        }
    }

    /// Total number of records written.
    pub fn total(&self) -> usize {
        self.created + self.updated
    }
}

/// Returns the primary key of a record (`id`, string or number) as a string.
pub fn record_id(record: &Value) -> Option<String> {
    match record.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collection_group_extraction() {
        let def: CollectionDef = serde_json::from_value(json!({
            "collection": "articles",
            "meta": { "group": "content", "icon": "article" },
            "schema": { "name": "articles" }
        }))
        .unwrap();
        assert_eq!(def.group(), Some("content"));

        let def: CollectionDef =
            serde_json::from_value(json!({ "collection": "content", "meta": null })).unwrap();
        assert_eq!(def.group(), None);

        let def: CollectionDef = serde_json::from_value(
            json!({ "collection": "content", "meta": { "group": null } }),
        )
        .unwrap();
        assert_eq!(def.group(), None);

        assert_eq!(CollectionDef::new("b").with_group("a").group(), Some("a"));
    }

    #[test]
    fn test_unknown_attributes_survive_round_trip() {
        let raw = json!({
            "collection": "articles",
            "field": "title",
            "type": "string",
            "meta": { "interface": "input" },
            "schema": { "is_nullable": false },
            "custom": { "keep": true }
        });
        let field: FieldDef = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(field.field_type.as_deref(), Some("string"));
        assert_eq!(field.extra["custom"], json!({ "keep": true }));
        assert_eq!(serde_json::to_value(&field).unwrap(), raw);
    }

    #[test]
    fn test_relation_key_without_related_collection() {
        let rel = RelationDef::new("articles", "tags", None);
        assert_eq!(rel.key(), "articles-tags-");
        let rel = RelationDef::new("articles", "author", Some("directus_users"));
        assert_eq!(rel.key(), "articles-author-directus_users");
    }

    #[test]
    fn test_item_query_matches() {
        let query = ItemQuery::new().with_filter("admin_access", true);
        assert!(query.matches(&json!({ "id": "r1", "admin_access": true })));
        assert!(!query.matches(&json!({ "id": "r2", "admin_access": false })));
        assert!(!query.matches(&json!({ "id": "r3" })));
        assert!(ItemQuery::new().matches(&json!({})));
    }

    #[test]
    fn test_record_id() {
        assert_eq!(record_id(&json!({ "id": "abc" })).as_deref(), Some("abc"));
        assert_eq!(record_id(&json!({ "id": 7 })).as_deref(), Some("7"));
        assert_eq!(record_id(&json!({ "id": null })), None);
        assert_eq!(record_id(&json!({ "name": "x" })), None);
    }

    #[test]
    fn test_batch_outcome_counts() {
        let mut outcome = BatchOutcome::default();
        outcome.record(WriteOutcome::Created);
        outcome.record(WriteOutcome::Updated);
        outcome.record(WriteOutcome::Updated);
        assert_eq!(outcome.created, 1);
        assert_eq!(outcome.updated, 2);
        assert_eq!(outcome.total(), 3);
    }
}

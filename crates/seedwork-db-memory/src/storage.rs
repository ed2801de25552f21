use crate::journal::{JournalEntry, JournalSummary, Operation};
use indexmap::IndexMap;
use seedwork_storage::{CollectionDef, FieldDef, RelationDef, StorageError};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

/// Key for fields and relations: `(collection, field)`.
pub type MemberKey = (String, String);

pub(crate) fn member_target(collection: &str, field: &str) -> String {
    format!("{collection}.{field}")
}

/// In-memory content backend.
///
/// This backend provides:
/// - Collections, fields and relations with the existence rules a real host enforces
///   (a collection's group must exist, fields need their collection, no duplicate creates)
/// - Item collections keyed by record `id`, plus singleton records
/// - A journal of every port call, in call order
/// - Fault injection per operation and target
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    pub(crate) collections: RwLock<IndexMap<String, CollectionDef>>,
    pub(crate) fields: RwLock<IndexMap<MemberKey, FieldDef>>,
    pub(crate) relations: RwLock<IndexMap<MemberKey, RelationDef>>,
    pub(crate) items: RwLock<HashMap<String, IndexMap<String, Value>>>,
    pub(crate) singletons: RwLock<HashMap<String, Value>>,
    journal: RwLock<Vec<JournalEntry>>,
    failures: RwLock<HashSet<(Operation, String)>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend that already contains the named (ungrouped) collections.
    pub fn with_collections<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let collections = names
            .into_iter()
            .map(|name| {
                let name = name.into();
                (name.clone(), CollectionDef::new(name))
            })
            .collect();
        Self {
            collections: RwLock::new(collections),
            ..Self::default()
        }
    }

    /// Inserts records directly, bypassing the journal.
    pub async fn seed_items(&self, collection: &str, records: Vec<Value>) {
        let mut items = self.items.write().await;
        let table = items.entry(collection.to_string()).or_default();
        for record in records {
            let id = seedwork_storage::record_id(&record)
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            table.insert(id, record);
        }
    }

    /// Makes every call of `operation` against `target` fail with `StorageError::Rejected`.
    pub async fn fail_on(&self, operation: Operation, target: impl Into<String>) {
        self.failures.write().await.insert((operation, target.into()));
    }

    pub(crate) async fn check_fault(
        &self,
        operation: Operation,
        target: &str,
    ) -> Result<(), StorageError> {
        if self
            .failures
            .read()
            .await
            .contains(&(operation, target.to_string()))
        {
            return Err(StorageError::rejected(format!(
                "injected failure for {operation} on {target}"
            )));
        }
        Ok(())
    }

    pub(crate) async fn record(
        &self,
        operation: Operation,
        target: &str,
        created: usize,
        succeeded: bool,
    ) {
        let mut entry = JournalEntry::new(operation, target);
        entry.created = created;
        entry.succeeded = succeeded;
        self.journal.write().await.push(entry);
    }

    /// Returns every recorded call, in order.
    pub async fn journal(&self) -> Vec<JournalEntry> {
        self.journal.read().await.clone()
    }

    /// Summarizes the journal.
    pub async fn journal_summary(&self) -> JournalSummary {
        JournalSummary::from_entries(&self.journal.read().await)
    }

    /// Clears the journal, keeping the stored state.
    pub async fn clear_journal(&self) {
        self.journal.write().await.clear();
    }

    /// Names of all stored collections, in insertion order.
    pub async fn collection_names(&self) -> Vec<String> {
        self.collections.read().await.keys().cloned().collect()
    }

    pub async fn collection(&self, name: &str) -> Option<CollectionDef> {
        self.collections.read().await.get(name).cloned()
    }

    pub async fn field(&self, collection: &str, field: &str) -> Option<FieldDef> {
        self.fields
            .read()
            .await
            .get(&(collection.to_string(), field.to_string()))
            .cloned()
    }

    pub async fn relation(&self, collection: &str, field: &str) -> Option<RelationDef> {
        self.relations
            .read()
            .await
            .get(&(collection.to_string(), field.to_string()))
            .cloned()
    }

    /// All records of an item collection, in insertion order.
    pub async fn items(&self, collection: &str) -> Vec<Value> {
        self.items
            .read()
            .await
            .get(collection)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn singleton(&self, collection: &str) -> Option<Value> {
        self.singletons.read().await.get(collection).cloned()
    }
}

//! Port trait implementations for [`InMemoryBackend`].

use async_trait::async_trait;
use seedwork_storage::{
    Backend, BatchOutcome, CollectionDef, CollectionInfo, CollectionStore, FieldDef, FieldStore,
    ItemQuery, ItemStore, RelationDef, RelationStore, StorageError, WriteOutcome, record_id,
};
use serde_json::Value;

use crate::journal::Operation;
use crate::storage::{InMemoryBackend, member_target};

fn created_count(outcome: &Result<WriteOutcome, StorageError>) -> usize {
    usize::from(matches!(outcome, Ok(WriteOutcome::Created)))
}

#[async_trait]
impl CollectionStore for InMemoryBackend {
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>, StorageError> {
        let listed = self
            .collections
            .read()
            .await
            .values()
            .map(|def| CollectionInfo {
                collection: def.collection.clone(),
                meta: def.meta.clone(),
            })
            .collect();
        self.record(Operation::ListCollections, "", 0, true).await;
        Ok(listed)
    }

    async fn upsert_collection(&self, def: &CollectionDef) -> Result<WriteOutcome, StorageError> {
        let result: Result<WriteOutcome, StorageError> = async {
            self.check_fault(Operation::UpsertCollection, &def.collection)
                .await?;
            let mut collections = self.collections.write().await;
            if let Some(group) = def.group() {
                if group != def.collection && !collections.contains_key(group) {
                    return Err(StorageError::rejected(format!(
                        "group \"{group}\" of collection \"{}\" does not exist",
                        def.collection
                    )));
                }
            }
            let outcome = if collections.contains_key(&def.collection) {
                WriteOutcome::Updated
            } else {
                WriteOutcome::Created
            };
            collections.insert(def.collection.clone(), def.clone());
            Ok(outcome)
        }
        .await;
        self.record(
            Operation::UpsertCollection,
            &def.collection,
            created_count(&result),
            result.is_ok(),
        )
        .await;
        result
    }
}

#[async_trait]
impl FieldStore for InMemoryBackend {
    async fn read_field(
        &self,
        collection: &str,
        field: &str,
    ) -> Result<Option<FieldDef>, StorageError> {
        let target = member_target(collection, field);
        let result = match self.check_fault(Operation::ReadField, &target).await {
            Ok(()) => Ok(self.field(collection, field).await),
            Err(e) => Err(e),
        };
        self.record(Operation::ReadField, &target, 0, result.is_ok())
            .await;
        result
    }

    async fn create_field(&self, def: &FieldDef) -> Result<(), StorageError> {
        let target = member_target(&def.collection, &def.field);
        let result: Result<(), StorageError> = async {
            self.check_fault(Operation::CreateField, &target).await?;
            if !self.collections.read().await.contains_key(&def.collection) {
                return Err(StorageError::rejected(format!(
                    "collection \"{}\" does not exist",
                    def.collection
                )));
            }
            let mut fields = self.fields.write().await;
            let key = (def.collection.clone(), def.field.clone());
            if fields.contains_key(&key) {
                return Err(StorageError::already_exists("field", &target));
            }
            fields.insert(key, def.clone());
            Ok(())
        }
        .await;
        self.record(
            Operation::CreateField,
            &target,
            usize::from(result.is_ok()),
            result.is_ok(),
        )
        .await;
        result
    }

    async fn update_field(&self, def: &FieldDef) -> Result<(), StorageError> {
        let target = member_target(&def.collection, &def.field);
        let result: Result<(), StorageError> = async {
            self.check_fault(Operation::UpdateField, &target).await?;
            let mut fields = self.fields.write().await;
            match fields.get_mut(&(def.collection.clone(), def.field.clone())) {
                Some(existing) => {
                    *existing = def.clone();
                    Ok(())
                }
                None => Err(StorageError::not_found("field", &target)),
            }
        }
        .await;
        self.record(Operation::UpdateField, &target, 0, result.is_ok())
            .await;
        result
    }
}

#[async_trait]
impl RelationStore for InMemoryBackend {
    async fn read_relation(
        &self,
        collection: &str,
        field: &str,
    ) -> Result<Option<RelationDef>, StorageError> {
        let target = member_target(collection, field);
        let result = match self.check_fault(Operation::ReadRelation, &target).await {
            Ok(()) => Ok(self.relation(collection, field).await),
            Err(e) => Err(e),
        };
        self.record(Operation::ReadRelation, &target, 0, result.is_ok())
            .await;
        result
    }

    async fn create_relation(&self, def: &RelationDef) -> Result<(), StorageError> {
        let target = member_target(&def.collection, &def.field);
        let result: Result<(), StorageError> = async {
            self.check_fault(Operation::CreateRelation, &target).await?;
            {
                let collections = self.collections.read().await;
                let missing = std::iter::once(def.collection.as_str())
                    .chain(def.related_collection.as_deref())
                    .find(|name| !collections.contains_key(*name));
                if let Some(name) = missing {
                    return Err(StorageError::rejected(format!(
                        "collection \"{name}\" does not exist"
                    )));
                }
            }
            let mut relations = self.relations.write().await;
            let key = (def.collection.clone(), def.field.clone());
            if relations.contains_key(&key) {
                return Err(StorageError::already_exists("relation", &target));
            }
            relations.insert(key, def.clone());
            Ok(())
        }
        .await;
        self.record(
            Operation::CreateRelation,
            &target,
            usize::from(result.is_ok()),
            result.is_ok(),
        )
        .await;
        result
    }

    async fn update_relation(&self, def: &RelationDef) -> Result<(), StorageError> {
        let target = member_target(&def.collection, &def.field);
        let result: Result<(), StorageError> = async {
            self.check_fault(Operation::UpdateRelation, &target).await?;
            let mut relations = self.relations.write().await;
            match relations.get_mut(&(def.collection.clone(), def.field.clone())) {
                Some(existing) => {
                    *existing = def.clone();
                    Ok(())
                }
                None => Err(StorageError::not_found("relation", &target)),
            }
        }
        .await;
        self.record(Operation::UpdateRelation, &target, 0, result.is_ok())
            .await;
        result
    }
}

#[async_trait]
impl ItemStore for InMemoryBackend {
    async fn read_items(
        &self,
        collection: &str,
        query: &ItemQuery,
    ) -> Result<Vec<Value>, StorageError> {
        let result = match self.check_fault(Operation::ReadItems, collection).await {
            Ok(()) => {
                let items = self.items.read().await;
                let matching = items
                    .get(collection)
                    .into_iter()
                    .flat_map(|table| table.values())
                    .filter(|record| query.matches(record))
                    .take(query.limit.unwrap_or(usize::MAX))
                    .cloned()
                    .collect();
                Ok(matching)
            }
            Err(e) => Err(e),
        };
        self.record(Operation::ReadItems, collection, 0, result.is_ok())
            .await;
        result
    }

    async fn upsert_singleton(
        &self,
        collection: &str,
        record: &Value,
    ) -> Result<WriteOutcome, StorageError> {
        let result: Result<WriteOutcome, StorageError> = async {
            self.check_fault(Operation::UpsertSingleton, collection)
                .await?;
            if !record.is_object() {
                return Err(StorageError::rejected(format!(
                    "singleton payload for {collection} must be an object"
                )));
            }
            let previous = self
                .singletons
                .write()
                .await
                .insert(collection.to_string(), record.clone());
            Ok(if previous.is_some() {
                WriteOutcome::Updated
            } else {
                WriteOutcome::Created
            })
        }
        .await;
        self.record(
            Operation::UpsertSingleton,
            collection,
            created_count(&result),
            result.is_ok(),
        )
        .await;
        result
    }

    async fn upsert_many(
        &self,
        collection: &str,
        records: &[Value],
    ) -> Result<BatchOutcome, StorageError> {
        let result: Result<BatchOutcome, StorageError> = async {
            self.check_fault(Operation::UpsertMany, collection).await?;
            let mut items = self.items.write().await;
            let table = items.entry(collection.to_string()).or_default();
            let mut outcome = BatchOutcome::default();
            let mut failed = 0;
            let mut first = None;
            for (position, record) in records.iter().enumerate() {
                if !record.is_object() {
                    failed += 1;
                    first.get_or_insert_with(|| {
                        StorageError::rejected(format!(
                            "record {position} of {collection} is not an object"
                        ))
                    });
                    continue;
                }
                let mut record = record.clone();
                let id = match record_id(&record) {
                    Some(id) => id,
                    None => {
                        let id = uuid::Uuid::new_v4().to_string();
                        if let Some(obj) = record.as_object_mut() {
                            obj.insert("id".to_string(), Value::String(id.clone()));
                        }
                        id
                    }
                };
                let previous = table.insert(id, record);
                outcome.record(if previous.is_some() {
                    WriteOutcome::Updated
                } else {
                    WriteOutcome::Created
                });
            }
            match first {
                None => Ok(outcome),
                Some(first) => Err(StorageError::PartialBatch {
                    created: outcome.created,
                    updated: outcome.updated,
                    failed,
                    first: Box::new(first),
                }),
            }
        }
        .await;
        let created = match &result {
            Ok(outcome) => outcome.created,
            Err(StorageError::PartialBatch { created, .. }) => *created,
            Err(_) => 0,
        };
        self.record(Operation::UpsertMany, collection, created, result.is_ok())
            .await;
        result
    }
}

impl Backend for InMemoryBackend {
    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_collection_upsert_reports_create_then_update() {
        let backend = InMemoryBackend::new();
        let def = CollectionDef::new("articles");
        assert_eq!(
            backend.upsert_collection(&def).await.unwrap(),
            WriteOutcome::Created
        );
        assert_eq!(
            backend.upsert_collection(&def).await.unwrap(),
            WriteOutcome::Updated
        );
        assert_eq!(backend.collection_names().await, vec!["articles"]);
    }

    #[tokio::test]
    async fn test_collection_with_missing_group_is_rejected() {
        let backend = InMemoryBackend::new();
        let err = backend
            .upsert_collection(&CollectionDef::new("articles").with_group("content"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Rejected { .. }));

        backend
            .upsert_collection(&CollectionDef::new("content"))
            .await
            .unwrap();
        backend
            .upsert_collection(&CollectionDef::new("articles").with_group("content"))
            .await
            .unwrap();

        let journal = backend.journal().await;
        assert_eq!(journal.len(), 3);
        assert!(!journal[0].succeeded);
        assert_eq!(journal[2].created, 1);
    }

    #[tokio::test]
    async fn test_field_create_requires_collection_and_rejects_duplicates() {
        let backend = InMemoryBackend::with_collections(["articles"]);
        let orphan = FieldDef::new("missing", "title");
        assert!(backend.create_field(&orphan).await.is_err());

        let field = FieldDef::new("articles", "title").with_type("string");
        backend.create_field(&field).await.unwrap();
        let err = backend.create_field(&field).await.unwrap_err();
        assert!(err.is_already_exists());

        let updated = FieldDef::new("articles", "title").with_type("text");
        backend.update_field(&updated).await.unwrap();
        assert_eq!(
            backend
                .read_field("articles", "title")
                .await
                .unwrap()
                .and_then(|f| f.field_type),
            Some("text".to_string())
        );

        let err = backend
            .update_field(&FieldDef::new("articles", "body"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_relation_requires_both_collections() {
        let backend = InMemoryBackend::with_collections(["articles"]);
        let rel = RelationDef::new("articles", "author", Some("authors"));
        assert!(backend.create_relation(&rel).await.is_err());

        backend
            .upsert_collection(&CollectionDef::new("authors"))
            .await
            .unwrap();
        backend.create_relation(&rel).await.unwrap();
        assert!(
            backend
                .read_relation("articles", "author")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_upsert_many_keys_on_id() {
        let backend = InMemoryBackend::new();
        let records = vec![
            json!({ "id": "r1", "name": "Editor" }),
            json!({ "id": 2, "name": "Viewer" }),
        ];
        let first = backend
            .upsert_many("directus_roles", &records)
            .await
            .unwrap();
        assert_eq!(first, BatchOutcome { created: 2, updated: 0 });

        let second = backend
            .upsert_many("directus_roles", &records)
            .await
            .unwrap();
        assert_eq!(second, BatchOutcome { created: 0, updated: 2 });
        assert_eq!(backend.items("directus_roles").await.len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_many_writes_around_a_bad_record() {
        let backend = InMemoryBackend::new();
        let records = vec![
            json!({ "id": "r1", "name": "Editor" }),
            json!("not a record"),
            json!({ "id": "r3", "name": "Viewer" }),
        ];
        let err = backend
            .upsert_many("directus_roles", &records)
            .await
            .unwrap_err();

        match err {
            StorageError::PartialBatch {
                created,
                updated,
                failed,
                first,
            } => {
                assert_eq!((created, updated, failed), (2, 0, 1));
                assert!(first.to_string().contains("record 1 of directus_roles"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(backend.items("directus_roles").await.len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_many_without_id_always_creates() {
        let backend = InMemoryBackend::new();
        let records = vec![json!({ "language": "en-US", "key": "hello" })];
        backend.upsert_many("directus_translations", &records).await.unwrap();
        backend.upsert_many("directus_translations", &records).await.unwrap();
        let stored = backend.items("directus_translations").await;
        assert_eq!(stored.len(), 2);
        assert!(stored[0]["id"].is_string());
    }

    #[tokio::test]
    async fn test_singleton_replaces_record() {
        let backend = InMemoryBackend::new();
        let outcome = backend
            .upsert_singleton("directus_settings", &json!({ "project_name": "A" }))
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Created);
        let outcome = backend
            .upsert_singleton("directus_settings", &json!({ "project_color": "#fff" }))
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Updated);
        assert_eq!(
            backend.singleton("directus_settings").await,
            Some(json!({ "project_color": "#fff" }))
        );
        assert!(
            backend
                .upsert_singleton("directus_settings", &json!([1, 2]))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_read_items_filters_and_limits() {
        let backend = InMemoryBackend::new();
        backend
            .seed_items(
                "directus_roles",
                vec![
                    json!({ "id": "a", "admin_access": true }),
                    json!({ "id": "b", "admin_access": false }),
                    json!({ "id": "c", "admin_access": true }),
                ],
            )
            .await;
        let query = ItemQuery::new().with_filter("admin_access", true);
        let admins = backend.read_items("directus_roles", &query).await.unwrap();
        assert_eq!(admins.len(), 2);

        let limited = backend
            .read_items("directus_roles", &query.with_limit(1))
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
        assert!(
            backend
                .read_items("directus_panels", &ItemQuery::new())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_injected_failure_is_journaled() {
        let backend = InMemoryBackend::new();
        backend.fail_on(Operation::UpsertMany, "directus_flows").await;
        assert!(
            backend
                .upsert_many("directus_flows", &[json!({ "id": "f" })])
                .await
                .is_err()
        );
        let journal = backend.journal().await;
        assert_eq!(journal.len(), 1);
        assert!(!journal[0].succeeded);
        assert!(backend.items("directus_flows").await.is_empty());
    }
}

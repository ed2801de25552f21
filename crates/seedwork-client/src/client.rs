use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use seedwork_storage::{
    Backend, BatchOutcome, CollectionDef, CollectionInfo, CollectionStore, FieldDef, FieldStore,
    ItemQuery, ItemStore, RelationDef, RelationStore, StorageError, WriteOutcome, record_id,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::endpoints::Endpoint;

/// Connection settings for [`RestBackend`].
#[derive(Debug, Clone)]
pub struct RestConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl RestConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Backend that talks to a running host over its REST API.
///
/// The host answers a read of a single missing object with 403, the same as
/// for a forbidden one. Existence is therefore decided from list reads, which
/// come back empty when nothing matches.
pub struct RestBackend {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl RestBackend {
    pub fn new(config: RestConfig) -> Result<Self, StorageError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            StorageError::connection(format!("Invalid base URL {}: {e}", config.base_url))
        })?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StorageError::connection(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url,
            token: config.token,
        })
    }

    fn request(&self, method: Method, endpoint: &Endpoint) -> reqwest::RequestBuilder {
        tracing::debug!(method = %method, path = %endpoint, "backend request");
        let req = self.http.request(method, endpoint.url(&self.base_url));
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn fetch(
        &self,
        endpoint: &Endpoint,
        query: &[(String, String)],
    ) -> Result<Value, StorageError> {
        let resp = self
            .request(Method::GET, endpoint)
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;
        handle_response(resp).await
    }

    /// GET of a listing scoped to a parent that may not exist yet.
    /// 403 and 404 both mean the parent is absent, so the listing is empty.
    async fn fetch_scoped<T: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
    ) -> Result<Vec<T>, StorageError> {
        let resp = self
            .request(Method::GET, endpoint)
            .send()
            .await
            .map_err(transport_error)?;
        if matches!(resp.status(), StatusCode::NOT_FOUND | StatusCode::FORBIDDEN) {
            return Ok(Vec::new());
        }
        list_from(endpoint, handle_response(resp).await?)
    }

    async fn write(
        &self,
        method: Method,
        endpoint: &Endpoint,
        body: &Value,
    ) -> Result<Value, StorageError> {
        let resp = self
            .request(method, endpoint)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        handle_response(resp).await
    }

    async fn record_exists(&self, collection: &str, id: &str) -> Result<bool, StorageError> {
        let query = ItemQuery::new().with_filter("id", id).with_limit(1);
        let found = self.read_items(collection, &query).await?;
        Ok(!found.is_empty())
    }

    async fn upsert_record(
        &self,
        collection: &str,
        record: &Value,
    ) -> Result<WriteOutcome, StorageError> {
        if let Some(id) = record_id(record) {
            if self.record_exists(collection, &id).await? {
                self.write(Method::PATCH, &Endpoint::item(collection, &id), record)
                    .await?;
                return Ok(WriteOutcome::Updated);
            }
        }
        self.write(Method::POST, &Endpoint::items(collection), record)
            .await?;
        Ok(WriteOutcome::Created)
    }
}

fn transport_error(e: reqwest::Error) -> StorageError {
    StorageError::connection(e.to_string())
}

fn to_body<T: Serialize>(value: &T) -> Result<Value, StorageError> {
    serde_json::to_value(value)
        .map_err(|e| StorageError::internal(format!("Failed to serialize payload: {e}")))
}

fn list_from<T: DeserializeOwned>(endpoint: &Endpoint, data: Value) -> Result<Vec<T>, StorageError> {
    match data {
        Value::Null => Ok(Vec::new()),
        data => serde_json::from_value(data)
            .map_err(|e| StorageError::internal(format!("Unexpected response for {endpoint}: {e}"))),
    }
}

async fn handle_response(resp: reqwest::Response) -> Result<Value, StorageError> {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();

    if !status.is_success() {
        return Err(StorageError::rejected(format!(
            "HTTP {status}: {}",
            error_message(&body)
        )));
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    let json: Value = serde_json::from_str(&body)
        .map_err(|e| StorageError::internal(format!("Failed to parse response JSON: {e}")))?;
    Ok(match json {
        Value::Object(mut obj) if obj.contains_key("data") => {
            obj.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    })
}

/// Extracts `errors[0].message` from an error body, falling back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            json.pointer("/errors/0/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

fn query_params(query: &ItemQuery) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = query
        .filters
        .iter()
        .map(|(field, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (format!("filter[{field}][_eq]"), value)
        })
        .collect();
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

#[async_trait]
impl CollectionStore for RestBackend {
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>, StorageError> {
        let endpoint = Endpoint::collections();
        list_from(&endpoint, self.fetch(&endpoint, &[]).await?)
    }

    async fn upsert_collection(&self, def: &CollectionDef) -> Result<WriteOutcome, StorageError> {
        let body = to_body(def)?;
        let exists = self
            .list_collections()
            .await?
            .iter()
            .any(|live| live.collection == def.collection);
        if exists {
            self.write(Method::PATCH, &Endpoint::collection(&def.collection), &body)
                .await?;
            Ok(WriteOutcome::Updated)
        } else {
            self.write(Method::POST, &Endpoint::collections(), &body)
                .await?;
            Ok(WriteOutcome::Created)
        }
    }
}

#[async_trait]
impl FieldStore for RestBackend {
    async fn read_field(
        &self,
        collection: &str,
        field: &str,
    ) -> Result<Option<FieldDef>, StorageError> {
        let fields: Vec<FieldDef> = self.fetch_scoped(&Endpoint::fields(collection)).await?;
        Ok(fields.into_iter().find(|def| def.field == field))
    }

    async fn create_field(&self, def: &FieldDef) -> Result<(), StorageError> {
        self.write(Method::POST, &Endpoint::fields(&def.collection), &to_body(def)?)
            .await?;
        Ok(())
    }

    async fn update_field(&self, def: &FieldDef) -> Result<(), StorageError> {
        let endpoint = Endpoint::field(&def.collection, &def.field);
        self.write(Method::PATCH, &endpoint, &to_body(def)?).await?;
        Ok(())
    }
}

#[async_trait]
impl RelationStore for RestBackend {
    async fn read_relation(
        &self,
        collection: &str,
        field: &str,
    ) -> Result<Option<RelationDef>, StorageError> {
        let relations: Vec<RelationDef> = self
            .fetch_scoped(&Endpoint::relations_of(collection))
            .await?;
        Ok(relations.into_iter().find(|def| def.field == field))
    }

    async fn create_relation(&self, def: &RelationDef) -> Result<(), StorageError> {
        self.write(Method::POST, &Endpoint::relations(), &to_body(def)?)
            .await?;
        Ok(())
    }

    async fn update_relation(&self, def: &RelationDef) -> Result<(), StorageError> {
        let endpoint = Endpoint::relation(&def.collection, &def.field);
        self.write(Method::PATCH, &endpoint, &to_body(def)?).await?;
        Ok(())
    }
}

#[async_trait]
impl ItemStore for RestBackend {
    async fn read_items(
        &self,
        collection: &str,
        query: &ItemQuery,
    ) -> Result<Vec<Value>, StorageError> {
        let data = self
            .fetch(&Endpoint::items(collection), &query_params(query))
            .await?;
        Ok(match data {
            Value::Null => Vec::new(),
            Value::Array(records) => records,
            record => vec![record],
        })
    }

    async fn upsert_singleton(
        &self,
        collection: &str,
        record: &Value,
    ) -> Result<WriteOutcome, StorageError> {
        // Singletons always exist on the host; PATCH replaces the provided keys.
        self.write(Method::PATCH, &Endpoint::items(collection), record)
            .await?;
        Ok(WriteOutcome::Updated)
    }

    async fn upsert_many(
        &self,
        collection: &str,
        records: &[Value],
    ) -> Result<BatchOutcome, StorageError> {
        let mut outcome = BatchOutcome::default();
        let mut failed = 0;
        let mut first = None;
        for record in records {
            match self.upsert_record(collection, record).await {
                Ok(written) => outcome.record(written),
                Err(e) => {
                    tracing::debug!(collection, error = %e, "record upsert failed");
                    failed += 1;
                    first.get_or_insert(e);
                }
            }
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
}

impl Backend for RestBackend {
    fn backend_name(&self) -> &'static str {
        "rest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend_for(server: &MockServer) -> RestBackend {
        RestBackend::new(RestConfig::new(server.uri()).with_token("secret")).unwrap()
    }

    fn forbidden() -> Value {
        json!({ "errors": [{ "message": "You don't have permission to access this." }] })
    }

    #[tokio::test]
    async fn test_list_collections_unwraps_data_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    { "collection": "directus_users", "meta": null },
                    { "collection": "articles", "meta": { "group": "content" } }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let listed = backend_for(&server).list_collections().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[1].collection, "articles");
    }

    #[tokio::test]
    async fn test_upsert_collection_creates_when_missing_from_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "collection": "directus_users" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/collections/articles"))
            .respond_with(ResponseTemplate::new(403).set_body_json(forbidden()))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/collections"))
            .and(body_json(json!({ "collection": "articles" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "data": { "collection": "articles" } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let outcome = backend_for(&server)
            .upsert_collection(&CollectionDef::new("articles"))
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Created);
    }

    #[tokio::test]
    async fn test_upsert_collection_patches_when_listed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "collection": "articles" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/collections/articles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = backend_for(&server)
            .upsert_collection(&CollectionDef::new("articles"))
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Updated);
    }

    #[tokio::test]
    async fn test_read_field_finds_member_in_collection_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fields/articles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    { "collection": "articles", "field": "id", "type": "integer" },
                    { "collection": "articles", "field": "title", "type": "string" }
                ]
            })))
            .mount(&server)
            .await;

        let backend = backend_for(&server);
        let title = backend.read_field("articles", "title").await.unwrap();
        assert_eq!(title.map(|f| f.field_type), Some(Some("string".to_string())));
        assert!(backend.read_field("articles", "body").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_forbidden_member_lookup_means_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fields/articles"))
            .respond_with(ResponseTemplate::new(403).set_body_json(forbidden()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/relations/articles"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let backend = backend_for(&server);
        assert!(backend.read_field("articles", "title").await.unwrap().is_none());
        assert!(backend.read_relation("articles", "author").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_relation_matches_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/relations/articles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    { "collection": "articles", "field": "author", "related_collection": "directus_users" }
                ]
            })))
            .mount(&server)
            .await;

        let relation = backend_for(&server)
            .read_relation("articles", "author")
            .await
            .unwrap();
        assert_eq!(
            relation.and_then(|r| r.related_collection).as_deref(),
            Some("directus_users")
        );
    }

    #[tokio::test]
    async fn test_rejection_carries_backend_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/fields/articles"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "errors": [{ "message": "Field \"title\" already exists" }]
            })))
            .mount(&server)
            .await;

        let err = backend_for(&server)
            .create_field(&FieldDef::new("articles", "title"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Rejected { .. }));
        assert!(err.to_string().contains("Field \"title\" already exists"));
    }

    #[tokio::test]
    async fn test_read_items_sends_equality_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/roles"))
            .and(query_param("filter[admin_access][_eq]", "true"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "id": "admin-role", "admin_access": true }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let query = ItemQuery::new()
            .with_filter("admin_access", true)
            .with_limit(5);
        let records = backend_for(&server)
            .read_items("directus_roles", &query)
            .await
            .unwrap();
        assert_eq!(records, vec![json!({ "id": "admin-role", "admin_access": true })]);
    }

    #[tokio::test]
    async fn test_upsert_many_patches_known_ids_and_posts_the_rest() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/roles"))
            .and(query_param("filter[id][_eq]", "known"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [{ "id": "known" }] })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/roles"))
            .and(query_param("filter[id][_eq]", "fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/roles/known"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/roles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
            .expect(2)
            .mount(&server)
            .await;

        let outcome = backend_for(&server)
            .upsert_many(
                "directus_roles",
                &[
                    json!({ "id": "known", "name": "Editor" }),
                    json!({ "id": "fresh", "name": "Viewer" }),
                    json!({ "name": "No id" }),
                ],
            )
            .await
            .unwrap();
        assert_eq!(outcome, BatchOutcome { created: 2, updated: 1 });
    }

    #[tokio::test]
    async fn test_upsert_many_creates_when_read_one_is_forbidden() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/roles/editor"))
            .respond_with(ResponseTemplate::new(403).set_body_json(forbidden()))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/roles"))
            .and(query_param("filter[id][_eq]", "editor"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/roles"))
            .and(body_json(json!({ "id": "editor", "name": "Editor" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = backend_for(&server)
            .upsert_many("directus_roles", &[json!({ "id": "editor", "name": "Editor" })])
            .await
            .unwrap();
        assert_eq!(outcome, BatchOutcome { created: 1, updated: 0 });
    }

    #[tokio::test]
    async fn test_upsert_many_continues_past_a_rejected_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items/articles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/items/articles"))
            .and(body_json(json!({ "id": 2, "title": "" })))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "errors": [{ "message": "Value for field \"title\" can't be empty" }]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/items/articles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
            .expect(2)
            .mount(&server)
            .await;

        let err = backend_for(&server)
            .upsert_many(
                "articles",
                &[
                    json!({ "id": 1, "title": "One" }),
                    json!({ "id": 2, "title": "" }),
                    json!({ "id": 3, "title": "Three" }),
                ],
            )
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
                assert!(first.to_string().contains("can't be empty"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_ids_are_percent_encoded_in_paths() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items/articles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [{ "id": "a/b?c" }] })))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/items/articles/a%2Fb%3Fc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = backend_for(&server)
            .upsert_many("articles", &[json!({ "id": "a/b?c", "title": "Odd id" })])
            .await
            .unwrap();
        assert_eq!(outcome, BatchOutcome { created: 0, updated: 1 });
    }

    #[tokio::test]
    async fn test_singleton_is_patched() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/settings"))
            .and(body_json(json!({ "project_name": "Demo" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = backend_for(&server)
            .upsert_singleton("directus_settings", &json!({ "project_name": "Demo" }))
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Updated);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_a_connection_error() {
        let backend = RestBackend::new(
            RestConfig::new("http://127.0.0.1:1").with_timeout(Duration::from_secs(2)),
        )
        .unwrap();
        let err = backend.list_collections().await.unwrap_err();
        assert!(matches!(err, StorageError::Connection { .. }));
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let err = RestBackend::new(RestConfig::new("not a url")).err().unwrap();
        assert!(matches!(err, StorageError::Connection { .. }));
    }

    #[test]
    fn test_error_message_falls_back_to_body() {
        assert_eq!(error_message("gateway timeout"), "gateway timeout");
        assert_eq!(
            error_message(r#"{"errors":[{"message":"Forbidden"}]}"#),
            "Forbidden"
        );
    }
}

// movievec/src/weaviate/mod.rs
// HTTP client for the Weaviate-style vector store: liveness/meta, schema
// lifecycle, batched object insert, and the GraphQL read path.

pub mod query;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::error::{LoaderError, Result};
use crate::schema::CollectionSchema;
use query::{QueryRequest, QueryResponse, parse_query_response};

/// One object ready for insertion: property map, deterministic identifier,
/// and an optional caller-computed vector.
#[derive(Debug, Clone, Serialize)]
pub struct StoreObject {
    pub id:         Uuid,
    pub properties: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector:     Option<Vec<f32>>,
}

/// A per-object insert failure. Collected, never fatal.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BatchFailure {
    pub id:      Uuid,
    pub message: String,
}

/// Client for one store instance. The underlying connection pool is owned
/// by this value and released when it drops, on success and failure alike.
pub struct WeaviateStore {
    client:   reqwest::Client,
    endpoint: url::Url,
}

impl WeaviateStore {
    /// Builds the HTTP client from the configuration and verifies the store
    /// is live. Unreachable or unhealthy stores fail here, not at first use.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &config.api_key {
            headers.insert(
                reqwest::header::AUTHORIZATION,
                header_value(&format!("Bearer {}", api_key))?,
            );
        }
        for (name, value) in &config.vendor_headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                LoaderError::Configuration(format!("invalid header name {:?}: {}", name, e))
            })?;
            headers.insert(name, header_value(value)?);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| LoaderError::Configuration(format!("failed to build client: {}", e)))?;

        let store = WeaviateStore {
            client,
            endpoint: config.endpoint.clone(),
        };

        let response = store
            .client
            .get(store.url("/v1/.well-known/live")?)
            .send()
            .await
            .map_err(|e| LoaderError::Network(format!("store is unreachable: {}", e)))?;
        if !response.status().is_success() {
            return Err(LoaderError::Network(format!(
                "store liveness check returned {}",
                response.status()
            )));
        }

        info!("Connected to vector store at {}", store.endpoint);
        Ok(store)
    }

    /// Server metadata (version, enabled modules).
    pub async fn meta(&self) -> Result<Value> {
        let response = self
            .client
            .get(self.url("/v1/meta")?)
            .send()
            .await
            .map_err(|e| LoaderError::Network(format!("meta request failed: {}", e)))?;
        self.expect_success(response, "meta").await?.json().await.map_err(|e| {
            LoaderError::Store(format!("bad meta response: {}", e))
        })
    }

    pub async fn collection_exists(&self, name: &str) -> Result<bool> {
        let response = self
            .client
            .get(self.url(&format!("/v1/schema/{}", name))?)
            .send()
            .await
            .map_err(|e| LoaderError::Network(format!("schema lookup failed: {}", e)))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(LoaderError::Store(format!(
                "schema lookup for {} returned {}",
                name, status
            ))),
        }
    }

    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("/v1/schema/{}", name))?)
            .send()
            .await
            .map_err(|e| LoaderError::Network(format!("collection delete failed: {}", e)))?;
        self.expect_success(response, "collection delete").await?;
        info!("Deleted collection {}", name);
        Ok(())
    }

    pub async fn create_collection(&self, schema: &CollectionSchema) -> Result<()> {
        let response = self
            .client
            .post(self.url("/v1/schema")?)
            .json(&schema.to_value())
            .send()
            .await
            .map_err(|e| LoaderError::Network(format!("collection create failed: {}", e)))?;
        self.expect_success(response, "collection create").await?;
        info!("Created collection {}", schema.name);
        Ok(())
    }

    /// Drops any existing collection with this schema's name, then creates
    /// it fresh. Each run starts from an empty collection.
    pub async fn recreate_collection(&self, schema: &CollectionSchema) -> Result<()> {
        if self.collection_exists(&schema.name).await? {
            warn!("Collection {} exists, deleting it first", schema.name);
            self.delete_collection(&schema.name).await?;
        }
        self.create_collection(schema).await
    }

    /// Submits one batch as a single logical operation and reports
    /// per-object failures. A failed object never fails the call; transport
    /// or whole-request errors do.
    pub async fn insert_batch(
        &self,
        collection: &str,
        objects: Vec<StoreObject>,
    ) -> Result<Vec<BatchFailure>> {
        let ids: Vec<Uuid> = objects.iter().map(|o| o.id).collect();
        let payload: Vec<Value> = objects
            .into_iter()
            .map(|o| {
                let mut object = json!({
                    "class": collection,
                    "id": o.id.to_string(),
                    "properties": o.properties,
                });
                if let Some(vector) = o.vector {
                    object["vector"] = json!(vector);
                }
                object
            })
            .collect();

        let response = self
            .client
            .post(self.url("/v1/batch/objects")?)
            .json(&json!({ "objects": payload }))
            .send()
            .await
            .map_err(|e| LoaderError::Network(format!("batch insert failed: {}", e)))?;
        let body: Value = self
            .expect_success(response, "batch insert")
            .await?
            .json()
            .await
            .map_err(|e| LoaderError::Store(format!("bad batch response: {}", e)))?;

        Ok(parse_batch_response(&ids, &body))
    }

    /// Executes one GraphQL read query.
    pub async fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let response = self
            .client
            .post(self.url("/v1/graphql")?)
            .json(&json!({ "query": request.to_graphql() }))
            .send()
            .await
            .map_err(|e| LoaderError::Network(format!("query request failed: {}", e)))?;
        let body: Value = self
            .expect_success(response, "query")
            .await?
            .json()
            .await
            .map_err(|e| LoaderError::Store(format!("bad query response: {}", e)))?;
        parse_query_response(&request.collection, body)
    }

    fn url(&self, path: &str) -> Result<url::Url> {
        self.endpoint
            .join(path)
            .map_err(|e| LoaderError::Configuration(format!("invalid store path {}: {}", path, e)))
    }

    async fn expect_success(
        &self,
        response: reqwest::Response,
        operation: &str,
    ) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(LoaderError::Store(format!(
            "{} returned {}: {}",
            operation, status, body
        )))
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| LoaderError::Configuration(format!("invalid header value: {}", e)))
}

/// Extracts per-object failures from a batch response. The store echoes one
/// result entry per submitted object, in order; entries without an error
/// block succeeded.
pub fn parse_batch_response(ids: &[Uuid], body: &Value) -> Vec<BatchFailure> {
    let Some(results) = body.as_array() else {
        return Vec::new();
    };

    let mut failures = Vec::new();
    for (i, result) in results.iter().enumerate() {
        let Some(errors) = result.pointer("/result/errors/error").and_then(|e| e.as_array())
        else {
            continue;
        };
        if errors.is_empty() {
            continue;
        }
        let message = errors[0]
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown insert error")
            .to_string();
        let id = result
            .get("id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            .or_else(|| ids.get(i).copied())
            .unwrap_or_default();
        failures.push(BatchFailure { id, message });
    }
    failures
}

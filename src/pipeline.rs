// movievec/src/pipeline.rs
// The ingestion batcher: groups normalized records into fixed-size batches,
// submits each batch, and accumulates per-object failures without aborting
// the run. Everything else in this repo is a one-shot call; this is the one
// component with multi-step state.

use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{LoaderError, Result};
use crate::normalize::{NormalizedRecord, stable_uuid};
use crate::weaviate::{BatchFailure, StoreObject, WeaviateStore};

/// Where vectors come from: computed by the store's vectorizer module, or
/// supplied by the caller (one per record, joined by row order).
#[derive(Debug, Clone)]
pub enum VectorizationStrategy {
    ServiceComputed,
    Provided(Vec<Vec<f32>>),
}

/// Destination for one batch of objects. The store implements this; tests
/// substitute their own.
#[async_trait]
pub trait BatchSink: Send + Sync {
    /// Submits one batch as a single logical operation, returning the
    /// per-object failures within it.
    async fn submit(&self, objects: Vec<StoreObject>) -> Result<Vec<BatchFailure>>;
}

/// A [`WeaviateStore`] bound to one collection name.
pub struct CollectionWriter<'a> {
    store:      &'a WeaviateStore,
    collection: String,
}

impl<'a> CollectionWriter<'a> {
    pub fn new(store: &'a WeaviateStore, collection: &str) -> Self {
        CollectionWriter {
            store,
            collection: collection.to_string(),
        }
    }
}

#[async_trait]
impl BatchSink for CollectionWriter<'_> {
    async fn submit(&self, objects: Vec<StoreObject>) -> Result<Vec<BatchFailure>> {
        self.store.insert_batch(&self.collection, objects).await
    }
}

/// Accumulated per-object failures across every batch of a run. A non-empty
/// log means a degraded but completed run, never a rollback.
#[derive(Debug, Default, Serialize)]
pub struct FailureLog {
    total_objects: usize,
    failures:      Vec<BatchFailure>,
}

impl FailureLog {
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn total_objects(&self) -> usize {
        self.total_objects
    }

    pub fn failures(&self) -> &[BatchFailure] {
        &self.failures
    }

    /// Representative error for end-of-run reporting.
    pub fn first(&self) -> Option<&BatchFailure> {
        self.failures.first()
    }

    /// Writes the failure summary as JSON.
    pub fn save_report(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| LoaderError::Io(std::io::Error::other(e)))?;
        std::fs::write(path, json)?;
        info!("Ingestion report saved to {}", path.display());
        Ok(())
    }
}

/// Batches `records` into groups of `batch_size` and submits each group to
/// `sink`. Per-object failures are logged and do not stop the remaining
/// objects or batches; transport and store-level errors abort.
pub async fn ingest(
    records: &[NormalizedRecord],
    strategy: VectorizationStrategy,
    sink: &dyn BatchSink,
    batch_size: usize,
) -> Result<FailureLog> {
    if batch_size == 0 {
        return Err(LoaderError::Configuration(
            "batch size must be at least 1".to_string(),
        ));
    }
    let vectors = match &strategy {
        VectorizationStrategy::ServiceComputed => None,
        VectorizationStrategy::Provided(vectors) => {
            if vectors.len() != records.len() {
                return Err(LoaderError::Configuration(format!(
                    "{} vectors provided for {} records; row order is the join key",
                    vectors.len(),
                    records.len()
                )));
            }
            Some(vectors)
        },
    };

    let mut log = FailureLog {
        total_objects: records.len(),
        failures: Vec::new(),
    };

    let mut buffer: Vec<StoreObject> = Vec::with_capacity(batch_size);
    for (i, record) in records.iter().enumerate() {
        buffer.push(StoreObject {
            id:         stable_uuid(record.tmdb_id),
            properties: record.to_properties(),
            vector:     vectors.map(|v| v[i].clone()),
        });

        if buffer.len() == batch_size || i + 1 == records.len() {
            let batch = std::mem::take(&mut buffer);
            let submitted = batch.len();
            let failures = sink.submit(batch).await?;
            if failures.is_empty() {
                info!("Submitted batch of {} objects", submitted);
            } else {
                warn!(
                    "Submitted batch of {} objects, {} failed",
                    submitted,
                    failures.len()
                );
            }
            log.failures.extend(failures);
            buffer = Vec::with_capacity(batch_size);
        }
    }

    Ok(log)
}

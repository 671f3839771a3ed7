// movievec/src/embeddings.rs
// Bring-your-own-vector support: a batched embedding provider and the CSV
// side-store that carries vectors between runs. Row order in the side-store
// is the join key back to the dataset; there is no id column.

use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::EmbeddingConfig;
use crate::error::{LoaderError, Result};

/// Usage-intent tag forwarded to the provider. Document embeddings and
/// query embeddings are not interchangeable for asymmetric models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedIntent {
    Document,
    Query,
}

impl EmbedIntent {
    fn as_input_type(&self) -> &'static str {
        match self {
            EmbedIntent::Document => "search_document",
            EmbedIntent::Query => "search_query",
        }
    }
}

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds every input string, returning one vector per input in order.
    async fn embed(&self, texts: &[String], intent: EmbedIntent) -> Result<Vec<Vec<f32>>>;
}

pub struct CohereEmbedder {
    client:  Client,
    api_key: String,
    model:   String,
}

impl CohereEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Self {
        CohereEmbedder {
            client:  Client::new(),
            api_key: config.api_key.clone(),
            model:   config.model.clone(),
        }
    }
}

#[derive(Serialize)]
struct CohereRequest<'a> {
    texts:      &'a [String],
    model:      &'a str,
    input_type: &'static str,
}

#[derive(Deserialize)]
struct CohereResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl Embedder for CohereEmbedder {
    async fn embed(&self, texts: &[String], intent: EmbedIntent) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let response = self
            .client
            .post("https://api.cohere.ai/v1/embed")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&CohereRequest {
                texts,
                model: &self.model,
                input_type: intent.as_input_type(),
            })
            .send()
            .await
            .map_err(|e| LoaderError::EmbeddingApi(format!("embed call failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LoaderError::EmbeddingApi(format!(
                "embed call returned {}: {}",
                status, error_text
            )));
        }

        let result: CohereResponse = response
            .json()
            .await
            .map_err(|e| LoaderError::EmbeddingApi(format!("bad embed response: {}", e)))?;

        if result.embeddings.len() != texts.len() {
            return Err(LoaderError::EmbeddingApi(format!(
                "embed call returned {} vectors for {} inputs",
                result.embeddings.len(),
                texts.len()
            )));
        }

        Ok(result.embeddings)
    }
}

/// Source string fed to the embedding model, concatenating title and
/// overview. The exact shape (including "Title" with no colon) matches the
/// vectors already published for this dataset; changing it would orphan
/// every stored embedding.
pub fn source_text(title: &str, overview: &str) -> String {
    format!("Title{}; Overview: {}", title, overview)
}

/// Embeds `(title, overview)` pairs in fixed-size batches, one provider call
/// per full buffer plus a final partial buffer. Output order matches input
/// order. A failed call aborts the run; there is no partial-batch retry.
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    pairs: &[(String, String)],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut vectors = Vec::with_capacity(pairs.len());
    let mut buffer: Vec<String> = Vec::with_capacity(batch_size);

    for (i, (title, overview)) in pairs.iter().enumerate() {
        buffer.push(source_text(title, overview));
        if buffer.len() == batch_size || i + 1 == pairs.len() {
            let batch = embedder.embed(&buffer, EmbedIntent::Document).await?;
            info!("Embedded batch of {} records", batch.len());
            vectors.extend(batch);
            buffer.clear();
        }
    }

    Ok(vectors)
}

/// Writes the vectors as a headerless CSV, one row per record in input
/// order.
pub fn save_embeddings(path: &Path, vectors: &[Vec<f32>]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| LoaderError::Io(std::io::Error::other(e)))?;
    for vector in vectors {
        let row: Vec<String> = vector.iter().map(|v| v.to_string()).collect();
        writer
            .write_record(&row)
            .map_err(|e| LoaderError::Io(std::io::Error::other(e)))?;
    }
    writer
        .flush()
        .map_err(|e| LoaderError::Io(std::io::Error::other(e)))?;
    info!("Saved {} embeddings to {}", vectors.len(), path.display());
    Ok(())
}

/// Reads a side-store written by [`save_embeddings`]. Rows come back in file
/// order, which is the only join key to the source dataset.
pub fn load_embeddings(path: &Path) -> Result<Vec<Vec<f32>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| LoaderError::Io(std::io::Error::other(e)))?;
    let mut vectors = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| LoaderError::Io(std::io::Error::other(e)))?;
        let vector: Vec<f32> = record
            .iter()
            .map(|field| {
                field.parse::<f32>().map_err(|e| {
                    LoaderError::Parse(format!("bad embedding component {:?}: {}", field, e))
                })
            })
            .collect::<Result<_>>()?;
        vectors.push(vector);
    }
    Ok(vectors)
}

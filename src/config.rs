// movievec/src/config.rs
// Explicit configuration for the store connection and the embedding
// provider. Secrets come from the process environment; a missing required
// variable is a configuration error, not a fallback.

use url::Url;

use crate::error::{LoaderError, Result};

pub const ENV_STORE_URL: &str = "WEAVIATE_URL";
pub const ENV_STORE_API_KEY: &str = "WEAVIATE_API_KEY";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_COHERE_API_KEY: &str = "COHERE_API_KEY";

/// Connection settings for the vector store.
///
/// `vendor_headers` carries third-party API keys the store forwards to its
/// vectorizer / generative modules (e.g. `X-OpenAI-Api-Key`).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub endpoint:       Url,
    pub api_key:        Option<String>,
    pub vendor_headers: Vec<(String, String)>,
}

impl StoreConfig {
    pub fn new(endpoint: &str, api_key: Option<String>) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| LoaderError::Configuration(format!("invalid store URL: {}", e)))?;
        Ok(StoreConfig {
            endpoint,
            api_key,
            vendor_headers: Vec::new(),
        })
    }

    /// Cloud connection from the environment: `WEAVIATE_URL` and
    /// `WEAVIATE_API_KEY` are required; vendor keys are forwarded when set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let endpoint = require(&lookup, ENV_STORE_URL)?;
        let api_key = require(&lookup, ENV_STORE_API_KEY)?;
        let mut config = StoreConfig::new(&endpoint, Some(api_key))?;
        config.vendor_headers = vendor_headers_from(&lookup);
        Ok(config)
    }

    /// Local instance, no auth. Vendor keys are still forwarded when set.
    pub fn local() -> Result<Self> {
        let mut config = StoreConfig::new("http://localhost:8080", None)?;
        config.vendor_headers = vendor_headers_from_env();
        Ok(config)
    }

    /// Forwards whichever third-party API keys are present in the
    /// environment as vendor headers.
    pub fn with_env_vendor_headers(mut self) -> Self {
        self.vendor_headers.extend(vendor_headers_from_env());
        self
    }

    pub fn with_vendor_header(mut self, name: &str, value: &str) -> Self {
        self.vendor_headers
            .push((name.to_string(), value.to_string()));
        self
    }
}

/// Settings for the bring-your-own-vector embedding provider.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub api_key:    String,
    pub model:      String,
    pub batch_size: usize,
}

impl EmbeddingConfig {
    pub fn from_env() -> Result<Self> {
        Ok(EmbeddingConfig {
            api_key:    require_env(ENV_COHERE_API_KEY)?,
            model:      "embed-multilingual-v3.0".to_string(),
            batch_size: crate::EMBEDDING_BATCH_SIZE,
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    require(&|name: &str| std::env::var(name).ok(), name)
}

fn require(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String> {
    lookup(name).ok_or_else(|| {
        LoaderError::Configuration(format!("environment variable {} is not set", name))
    })
}

fn vendor_headers_from_env() -> Vec<(String, String)> {
    vendor_headers_from(&|name: &str| std::env::var(name).ok())
}

fn vendor_headers_from(lookup: &impl Fn(&str) -> Option<String>) -> Vec<(String, String)> {
    let mut headers = Vec::new();
    if let Some(key) = lookup(ENV_OPENAI_API_KEY) {
        headers.push(("X-OpenAI-Api-Key".to_string(), key));
    }
    if let Some(key) = lookup(ENV_COHERE_API_KEY) {
        headers.push(("X-Cohere-Api-Key".to_string(), key));
    }
    headers
}

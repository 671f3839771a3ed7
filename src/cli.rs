// movievec/src/cli.rs
// Command line interface for the movievec loader.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Load a movie dataset into a vector store and query it.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Write a JSON summary of per-object insert failures at the end of a
    /// load (ingestion_report.json).
    #[clap(long)]
    pub report: bool,
}

#[derive(Parser, Debug)]
pub enum Commands {
    /// Load the dataset with store-side text vectorization ("Movie")
    Load(LoadArgs),
    /// Load with caller-computed vectors ("MovieCustomVector")
    LoadCustomVectors(LoadCustomVectorsArgs),
    /// Load with poster blobs and a weighted multimodal vectorizer ("MovieMM")
    LoadMultimodal(LoadMultimodalArgs),
    /// Load with one named vector per aspect ("MovieNVDemo")
    LoadNamedVectors(LoadNamedVectorsArgs),
    /// Run a one-shot read query against a populated collection
    Query(QueryArgs),
    /// Run a retrieval-augmented generation query
    Rag(RagArgs),
}

#[derive(Parser, Debug)]
pub struct ConnectionArgs {
    /// Store endpoint; omit to use a local instance at localhost:8080
    #[clap(long, env = "WEAVIATE_URL")]
    pub endpoint: Option<String>,

    /// Store API key (required for cloud endpoints)
    #[clap(long, env = "WEAVIATE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

#[derive(Parser, Debug)]
pub struct LoadArgs {
    #[clap(flatten)]
    pub connection: ConnectionArgs,

    /// Source dataset URL
    #[clap(long, default_value = crate::DEFAULT_DATASET_URL)]
    pub dataset_url: String,

    /// Objects per insert batch
    #[clap(long, default_value_t = crate::DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
}

#[derive(Parser, Debug)]
pub struct LoadCustomVectorsArgs {
    #[clap(flatten)]
    pub connection: ConnectionArgs,

    #[clap(long, default_value = crate::DEFAULT_DATASET_URL)]
    pub dataset_url: String,

    #[clap(long, default_value_t = crate::DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Side-store for the generated embeddings; reused on later runs
    #[clap(long, default_value = "scratch/movies_embeddings.csv")]
    pub embeddings_path: PathBuf,

    /// Reuse an existing side-store instead of calling the embedding API
    #[clap(long)]
    pub reuse_embeddings: bool,
}

#[derive(Parser, Debug)]
pub struct LoadMultimodalArgs {
    #[clap(flatten)]
    pub connection: ConnectionArgs,

    #[clap(long, default_value = crate::DEFAULT_DATASET_URL)]
    pub dataset_url: String,

    #[clap(long, default_value_t = crate::MULTIMODAL_BATCH_SIZE)]
    pub batch_size: usize,

    /// Poster archive URL, downloaded when the posters dir is empty
    #[clap(long, default_value = crate::DEFAULT_POSTERS_URL)]
    pub posters_url: String,

    /// Directory of poster images named {tmdb_id}_poster.jpg
    #[clap(long, default_value = "scratch/imgs")]
    pub posters_dir: PathBuf,
}

#[derive(Parser, Debug)]
pub struct LoadNamedVectorsArgs {
    #[clap(flatten)]
    pub connection: ConnectionArgs,

    #[clap(long, default_value = crate::DEFAULT_DATASET_URL)]
    pub dataset_url: String,

    #[clap(long, default_value_t = crate::MULTIMODAL_BATCH_SIZE)]
    pub batch_size: usize,

    /// Poster archive URL, downloaded when the posters dir is empty
    #[clap(long, default_value = crate::DEFAULT_POSTERS_URL)]
    pub posters_url: String,

    /// Directory of poster images named {tmdb_id}_poster.jpg
    #[clap(long, default_value = "scratch/imgs")]
    pub posters_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QueryKind {
    NearText,
    Bm25,
    Hybrid,
    NearImage,
}

#[derive(Parser, Debug)]
pub struct QueryArgs {
    #[clap(flatten)]
    pub connection: ConnectionArgs,

    /// Collection to query
    #[clap(long, default_value = "Movie")]
    pub collection: String,

    /// Search kind
    #[clap(long, value_enum, default_value_t = QueryKind::NearText)]
    pub kind: QueryKind,

    /// Query text (required for near-text, bm25 and hybrid)
    pub query: Option<String>,

    /// Image file to search with (near-image only)
    #[clap(long)]
    pub image: Option<PathBuf>,

    /// Named vector to search against
    #[clap(long)]
    pub target_vector: Option<String>,

    /// Only return movies released strictly after this date (YYYY-MM-DD)
    #[clap(long)]
    pub released_after: Option<String>,

    #[clap(long, default_value_t = crate::DEFAULT_QUERY_LIMIT)]
    pub limit: usize,
}

#[derive(Parser, Debug)]
pub struct RagArgs {
    #[clap(flatten)]
    pub connection: ConnectionArgs,

    #[clap(long, default_value = "Movie")]
    pub collection: String,

    /// Retrieval query text
    #[clap(required_unless_present = "image")]
    pub query: Option<String>,

    /// Retrieve by image similarity instead of text
    #[clap(long, conflicts_with = "query")]
    pub image: Option<PathBuf>,

    /// Prompt applied to each retrieved object, with {property} placeholders
    #[clap(long, conflicts_with = "grouped_task")]
    pub single_prompt: Option<String>,

    /// Task applied once to the whole retrieved set
    #[clap(long)]
    pub grouped_task: Option<String>,

    /// Properties exposed to the grouped task prompt
    #[clap(long, value_delimiter = ',', requires = "grouped_task")]
    pub grouped_properties: Vec<String>,

    #[clap(long)]
    pub target_vector: Option<String>,

    #[clap(long, default_value_t = crate::DEFAULT_QUERY_LIMIT)]
    pub limit: usize,
}

// movievec/src/lib.rs
// Public API for the movievec library.

pub mod cli;
pub mod config;
pub mod dataset;
pub mod embeddings;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod schema;
pub mod weaviate;

pub const DEFAULT_DATASET_URL: &str =
    "https://raw.githubusercontent.com/weaviate-tutorials/edu-datasets/main/movies_data_1990_2024.json";
pub const DEFAULT_POSTERS_URL: &str =
    "https://raw.githubusercontent.com/weaviate-tutorials/edu-datasets/main/movies_data_1990_2024_posters.zip";
pub const DEFAULT_BATCH_SIZE: usize = 200;
pub const MULTIMODAL_BATCH_SIZE: usize = 50;
pub const EMBEDDING_BATCH_SIZE: usize = 50;
pub const DEFAULT_QUERY_LIMIT: usize = 5;

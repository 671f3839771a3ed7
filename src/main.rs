// movievec/src/main.rs
// CLI entry point: fetch, normalize, (embed,) batch-insert, query.

use std::path::Path;

use chrono::{NaiveDate, TimeZone, Utc};
use clap::Parser;
use movievec::cli::{
    Cli, Commands, ConnectionArgs, LoadArgs, LoadCustomVectorsArgs, LoadMultimodalArgs,
    LoadNamedVectorsArgs, QueryArgs, QueryKind, RagArgs,
};
use movievec::config::{EmbeddingConfig, StoreConfig};
use movievec::dataset::{ensure_posters, fetch_dataset, load_poster, poster_inventory};
use movievec::embeddings::{CohereEmbedder, EmbedIntent, Embedder, embed_in_batches,
    load_embeddings, save_embeddings};
use movievec::error::{LoaderError, Result};
use movievec::normalize::{NormalizedRecord, normalize};
use movievec::pipeline::{CollectionWriter, FailureLog, VectorizationStrategy, ingest};
use movievec::schema::{
    CollectionSchema, Generative, NamedVector, Vectorizer, WeightedField, movie_properties,
};
use movievec::weaviate::WeaviateStore;
use movievec::weaviate::query::{
    Filter, GenerativeTask, QueryOptions, QueryRequest, QueryResponse, SearchInput,
};
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    let file_appender = tracing_appender::rolling::never(".", "movievec.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    let cli = Cli::parse();

    let failure_log = match &cli.command {
        Commands::Load(args) => Some(run_load(args).await?),
        Commands::LoadCustomVectors(args) => Some(run_load_custom_vectors(args).await?),
        Commands::LoadMultimodal(args) => Some(run_load_multimodal(args).await?),
        Commands::LoadNamedVectors(args) => Some(run_load_named_vectors(args).await?),
        Commands::Query(args) => {
            run_query(args).await?;
            None
        },
        Commands::Rag(args) => {
            run_rag(args).await?;
            None
        },
    };

    if let Some(log) = failure_log {
        report_failures(&log);
        if cli.report {
            log.save_report(Path::new("ingestion_report.json"))?;
        }
    }

    Ok(())
}

fn store_config(args: &ConnectionArgs) -> Result<StoreConfig> {
    match &args.endpoint {
        Some(endpoint) => {
            Ok(StoreConfig::new(endpoint, args.api_key.clone())?.with_env_vendor_headers())
        },
        None => StoreConfig::local(),
    }
}

async fn fetch_and_normalize(dataset_url: &str) -> Result<Vec<NormalizedRecord>> {
    let http = reqwest::Client::new();
    let records = fetch_dataset(&http, dataset_url).await?;
    records.iter().map(normalize).collect()
}

fn report_failures(log: &FailureLog) {
    if log.is_empty() {
        info!("Imported all {} objects", log.total_objects());
        return;
    }
    // Partial failure is a degraded-but-completed run, not an abort.
    warn!(
        "Failed to import {} of {} objects",
        log.len(),
        log.total_objects()
    );
    if let Some(failure) = log.first() {
        warn!("e.g. object {}: {}", failure.id, failure.message);
    }
}

/// Standard tour of the read path, run after each text load.
async fn query_tour(store: &WeaviateStore, collection: &str) -> Result<()> {
    println!("Query = dystopian future");
    let response = store
        .query(&QueryRequest::new(
            collection,
            SearchInput::NearText("dystopian future".to_string()),
            movievec::DEFAULT_QUERY_LIMIT,
        ))
        .await?;
    print_hits(&response);

    println!("BM25 query for history");
    let response = store
        .query(&QueryRequest::new(
            collection,
            SearchInput::Bm25("history".to_string()),
            movievec::DEFAULT_QUERY_LIMIT,
        ))
        .await?;
    print_hits(&response);

    println!("Hybrid query for history");
    let response = store
        .query(&QueryRequest::new(
            collection,
            SearchInput::Hybrid {
                query:  "history".to_string(),
                vector: None,
            },
            movievec::DEFAULT_QUERY_LIMIT,
        ))
        .await?;
    print_hits(&response);

    println!("Query using release_date filter");
    let threshold = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    let response = store
        .query(
            &QueryRequest::new(
                collection,
                SearchInput::NearText("dystopian future".to_string()),
                movievec::DEFAULT_QUERY_LIMIT,
            )
            .with_options(QueryOptions {
                filter: Some(Filter::release_date_after(threshold)),
                ..Default::default()
            }),
        )
        .await?;
    print_hits(&response);

    println!("Single prompt query: Translate this into French");
    let response = store
        .query(
            &QueryRequest::new(
                collection,
                SearchInput::NearText("dystopian future".to_string()),
                movievec::DEFAULT_QUERY_LIMIT,
            )
            .with_options(QueryOptions {
                generative: Some(GenerativeTask::SinglePrompt(
                    "Translate this into French: {title}".to_string(),
                )),
                ..Default::default()
            }),
        )
        .await?;
    print_hits(&response);

    println!("Grouped task query: What do these movies have in common?");
    let response = store
        .query(
            &QueryRequest::new(
                collection,
                SearchInput::NearText("dystopian future".to_string()),
                movievec::DEFAULT_QUERY_LIMIT,
            )
            .with_options(QueryOptions {
                generative: Some(GenerativeTask::GroupedTask {
                    task:       "What do these movies have in common?".to_string(),
                    properties: vec![],
                }),
                ..Default::default()
            }),
        )
        .await?;
    print_hits(&response);

    Ok(())
}

async fn run_load(args: &LoadArgs) -> Result<FailureLog> {
    let records = fetch_and_normalize(&args.dataset_url).await?;
    let store = WeaviateStore::connect(&store_config(&args.connection)?).await?;
    info!("Store meta: {}", store.meta().await?);

    let schema = CollectionSchema::new("Movie", movie_properties(false), Vectorizer::Text2VecOpenAi)
        .with_generative(Generative::OpenAi);
    store.recreate_collection(&schema).await?;

    let writer = CollectionWriter::new(&store, &schema.name);
    let log = ingest(
        &records,
        VectorizationStrategy::ServiceComputed,
        &writer,
        args.batch_size,
    )
    .await?;

    query_tour(&store, &schema.name).await?;
    Ok(log)
}

async fn run_load_custom_vectors(args: &LoadCustomVectorsArgs) -> Result<FailureLog> {
    let records = fetch_and_normalize(&args.dataset_url).await?;

    let embedding_config = EmbeddingConfig::from_env()?;
    let embedder = CohereEmbedder::new(&embedding_config);

    let vectors = if args.reuse_embeddings && args.embeddings_path.exists() {
        info!("Reusing embeddings from {}", args.embeddings_path.display());
        load_embeddings(&args.embeddings_path)?
    } else {
        let pairs: Vec<(String, String)> = records
            .iter()
            .map(|r| (r.title.clone(), r.overview.clone()))
            .collect();
        let vectors = embed_in_batches(&embedder, &pairs, embedding_config.batch_size).await?;
        save_embeddings(&args.embeddings_path, &vectors)?;
        vectors
    };

    let store = WeaviateStore::connect(&store_config(&args.connection)?).await?;
    let schema = CollectionSchema::new(
        "MovieCustomVector",
        movie_properties(false),
        Vectorizer::SelfProvided,
    )
    .with_generative(Generative::Cohere);
    store.recreate_collection(&schema).await?;

    let writer = CollectionWriter::new(&store, &schema.name);
    let log = ingest(
        &records,
        VectorizationStrategy::Provided(vectors),
        &writer,
        args.batch_size,
    )
    .await?;

    // The store has no vectorizer here, so the query vector is computed by
    // the same provider as the document vectors.
    let query_text = "dystopian future".to_string();
    let query_vector = embedder
        .embed(&[query_text.clone()], EmbedIntent::Query)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| LoaderError::EmbeddingApi("empty query embedding".to_string()))?;

    println!("Query = {}", query_text);
    let response = store
        .query(&QueryRequest::new(
            &schema.name,
            SearchInput::NearVector(query_vector.clone()),
            movievec::DEFAULT_QUERY_LIMIT,
        ))
        .await?;
    print_hits(&response);

    println!("Hybrid query for history");
    let response = store
        .query(&QueryRequest::new(
            &schema.name,
            SearchInput::Hybrid {
                query:  "history".to_string(),
                vector: Some(query_vector),
            },
            movievec::DEFAULT_QUERY_LIMIT,
        ))
        .await?;
    print_hits(&response);

    Ok(log)
}

fn attach_posters(
    records: Vec<NormalizedRecord>,
    posters_dir: &Path,
) -> Result<Vec<NormalizedRecord>> {
    let inventory = poster_inventory(posters_dir)?;
    info!(
        "Found {} posters in {}",
        inventory.len(),
        posters_dir.display()
    );
    let missing = records
        .iter()
        .filter(|r| !inventory.contains(&r.tmdb_id))
        .count();
    if missing > 0 {
        return Err(LoaderError::Configuration(format!(
            "{} records have no poster in {}",
            missing,
            posters_dir.display()
        )));
    }

    records
        .into_iter()
        .map(|record| {
            let poster = load_poster(posters_dir, record.tmdb_id)?;
            Ok(record.with_poster(poster))
        })
        .collect()
}

async fn run_load_multimodal(args: &LoadMultimodalArgs) -> Result<FailureLog> {
    let records = fetch_and_normalize(&args.dataset_url).await?;
    let http = reqwest::Client::new();
    ensure_posters(&http, &args.posters_url, &args.posters_dir).await?;
    let records = attach_posters(records, &args.posters_dir)?;

    let store = WeaviateStore::connect(&store_config(&args.connection)?).await?;
    let schema = CollectionSchema::new(
        "MovieMM",
        movie_properties(true),
        Vectorizer::Multi2VecClip {
            image_fields: vec![WeightedField::new("poster", 0.9)],
            text_fields:  vec![WeightedField::new("title", 0.1)],
        },
    )
    .with_generative(Generative::OpenAi);
    store.recreate_collection(&schema).await?;

    let writer = CollectionWriter::new(&store, &schema.name);
    ingest(
        &records,
        VectorizationStrategy::ServiceComputed,
        &writer,
        args.batch_size,
    )
    .await
}

async fn run_load_named_vectors(args: &LoadNamedVectorsArgs) -> Result<FailureLog> {
    let records = fetch_and_normalize(&args.dataset_url).await?;
    let http = reqwest::Client::new();
    ensure_posters(&http, &args.posters_url, &args.posters_dir).await?;
    let records = attach_posters(records, &args.posters_dir)?;

    let store = WeaviateStore::connect(&store_config(&args.connection)?).await?;
    let schema = CollectionSchema::with_named_vectors(
        "MovieNVDemo",
        movie_properties(true),
        vec![
            NamedVector::new("title", Vectorizer::Text2VecOpenAi, &["title"]),
            NamedVector::new("overview", Vectorizer::Text2VecOpenAi, &["overview"]),
            NamedVector::new(
                "poster_title",
                Vectorizer::Multi2VecClip {
                    image_fields: vec![WeightedField::new("poster", 0.9)],
                    text_fields:  vec![WeightedField::new("title", 0.1)],
                },
                &[],
            ),
        ],
    )
    .with_generative(Generative::OpenAi);
    store.recreate_collection(&schema).await?;

    let writer = CollectionWriter::new(&store, &schema.name);
    ingest(
        &records,
        VectorizationStrategy::ServiceComputed,
        &writer,
        args.batch_size,
    )
    .await
}

async fn run_query(args: &QueryArgs) -> Result<()> {
    let input = search_input(args)?;
    let mut options = QueryOptions {
        target_vector: args.target_vector.clone(),
        ..Default::default()
    };
    if let Some(date) = &args.released_after {
        options.filter = Some(Filter::release_date_after(parse_date(date)?));
    }

    let store = WeaviateStore::connect(&store_config(&args.connection)?).await?;
    let response = store
        .query(&QueryRequest::new(&args.collection, input, args.limit).with_options(options))
        .await?;
    print_hits(&response);
    Ok(())
}

async fn run_rag(args: &RagArgs) -> Result<()> {
    let task = match (&args.single_prompt, &args.grouped_task) {
        (Some(prompt), None) => GenerativeTask::SinglePrompt(prompt.clone()),
        (None, Some(task)) => GenerativeTask::GroupedTask {
            task:       task.clone(),
            properties: args.grouped_properties.clone(),
        },
        _ => {
            return Err(LoaderError::Configuration(
                "pass exactly one of --single-prompt or --grouped-task".to_string(),
            ));
        },
    };

    let input = match (&args.query, &args.image) {
        (Some(query), None) => SearchInput::NearText(query.clone()),
        (None, Some(path)) => SearchInput::NearImage(read_image_base64(path)?),
        _ => {
            return Err(LoaderError::Configuration(
                "pass either query text or --image".to_string(),
            ));
        },
    };

    let store = WeaviateStore::connect(&store_config(&args.connection)?).await?;
    let response = store
        .query(
            &QueryRequest::new(&args.collection, input, args.limit)
            .with_options(QueryOptions {
                target_vector: args.target_vector.clone(),
                generative: Some(task),
                ..Default::default()
            }),
        )
        .await?;
    print_hits(&response);
    Ok(())
}

fn search_input(args: &QueryArgs) -> Result<SearchInput> {
    let text = || {
        args.query.clone().ok_or_else(|| {
            LoaderError::Configuration("this query kind requires query text".to_string())
        })
    };
    match args.kind {
        QueryKind::NearText => Ok(SearchInput::NearText(text()?)),
        QueryKind::Bm25 => Ok(SearchInput::Bm25(text()?)),
        QueryKind::Hybrid => Ok(SearchInput::Hybrid {
            query:  text()?,
            vector: None,
        }),
        QueryKind::NearImage => {
            let path = args.image.as_ref().ok_or_else(|| {
                LoaderError::Configuration("near-image requires --image".to_string())
            })?;
            Ok(SearchInput::NearImage(read_image_base64(path)?))
        },
    }
}

fn read_image_base64(path: &Path) -> Result<String> {
    use base64::Engine;
    let bytes = std::fs::read(path)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

fn parse_date(s: &str) -> Result<chrono::DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| LoaderError::Configuration(format!("bad date {:?}: {}", s, e)))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| LoaderError::Configuration("midnight is unrepresentable".to_string()))?;
    Ok(Utc.from_utc_datetime(&midnight))
}

fn print_hits(response: &QueryResponse) {
    for hit in &response.hits {
        let title = hit.properties["title"].as_str().unwrap_or("<untitled>");
        let year = hit
            .properties
            .get("release_date")
            .and_then(|d| d.as_str())
            .map(|d| d.chars().take(4).collect::<String>())
            .unwrap_or_default();
        println!("{} {}", title, year);
        if let Some(distance) = hit.distance {
            println!("Distance to query: {:.3}\n", distance);
        }
        if let Some(score) = hit.score {
            println!("Score: {:.3}\n", score);
        }
        if let Some(generated) = &hit.generated {
            println!("{}\n", generated);
        }
    }
    if let Some(generated) = &response.generated {
        println!("{}\n", generated);
    }
}

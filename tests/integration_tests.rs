// movievec/tests/integration_tests.rs

use async_trait::async_trait;
use movievec::config::StoreConfig;
use movievec::dataset::SourceRecord;
use movievec::error::Result;
use movievec::normalize::{normalize, stable_uuid};
use movievec::pipeline::{BatchSink, CollectionWriter, VectorizationStrategy, ingest};
use movievec::schema::{CollectionSchema, Vectorizer, movie_properties};
use movievec::weaviate::query::{QueryRequest, SearchInput};
use movievec::weaviate::{BatchFailure, StoreObject, WeaviateStore};
use std::sync::Mutex;

fn source_record(id: i64, title: &str) -> SourceRecord {
    SourceRecord {
        title:        title.to_string(),
        overview:     format!("Overview of {}.", title),
        vote_average: 6.5,
        genre_ids:    "[18, 53]".to_string(),
        release_date: "2021-06-15".to_string(),
        id,
    }
}

/// Collects every submitted object and optionally fails one id per batch.
struct CapturingSink {
    objects:  Mutex<Vec<StoreObject>>,
    fail_ids: Vec<uuid::Uuid>,
}

#[async_trait]
impl BatchSink for CapturingSink {
    async fn submit(&self, objects: Vec<StoreObject>) -> Result<Vec<BatchFailure>> {
        let failures = objects
            .iter()
            .filter(|o| self.fail_ids.contains(&o.id))
            .map(|o| BatchFailure {
                id:      o.id,
                message: "object rejected".to_string(),
            })
            .collect();
        self.objects.lock().unwrap().extend(objects);
        Ok(failures)
    }
}

#[tokio::test]
async fn normalize_and_ingest_produces_store_ready_objects() {
    let sources: Vec<SourceRecord> = (1..=7)
        .map(|i| source_record(i, &format!("Movie {}", i)))
        .collect();
    let records = sources
        .iter()
        .map(normalize)
        .collect::<Result<Vec<_>>>()
        .unwrap();

    let sink = CapturingSink {
        objects:  Mutex::new(Vec::new()),
        fail_ids: vec![],
    };
    let log = ingest(&records, VectorizationStrategy::ServiceComputed, &sink, 3)
        .await
        .unwrap();

    assert!(log.is_empty());
    let objects = sink.objects.lock().unwrap();
    assert_eq!(objects.len(), 7);
    // Identifiers are the stable v5 UUIDs of the source ids, in order.
    for (i, object) in objects.iter().enumerate() {
        assert_eq!(object.id, stable_uuid(i as i64 + 1));
        assert_eq!(object.properties["tmdb_id"], i as i64 + 1);
        assert_eq!(object.properties["release_date"], "2021-06-15T00:00:00Z");
        assert_eq!(object.properties["genre_ids"], serde_json::json!([18, 53]));
        assert!(object.vector.is_none());
    }
}

#[tokio::test]
async fn reingestion_reuses_the_same_identifiers() {
    let sources = vec![source_record(42, "Example")];
    let records = sources
        .iter()
        .map(normalize)
        .collect::<Result<Vec<_>>>()
        .unwrap();

    let first = CapturingSink {
        objects:  Mutex::new(Vec::new()),
        fail_ids: vec![],
    };
    let second = CapturingSink {
        objects:  Mutex::new(Vec::new()),
        fail_ids: vec![],
    };
    ingest(&records, VectorizationStrategy::ServiceComputed, &first, 10)
        .await
        .unwrap();
    ingest(&records, VectorizationStrategy::ServiceComputed, &second, 10)
        .await
        .unwrap();

    // Same input, same destination identifier: the store overwrites instead
    // of duplicating.
    assert_eq!(
        first.objects.lock().unwrap()[0].id,
        second.objects.lock().unwrap()[0].id
    );
}

#[tokio::test]
async fn failed_object_is_logged_but_everything_else_lands() {
    let sources: Vec<SourceRecord> = (1..=10)
        .map(|i| source_record(i, &format!("Movie {}", i)))
        .collect();
    let records = sources
        .iter()
        .map(normalize)
        .collect::<Result<Vec<_>>>()
        .unwrap();

    let sink = CapturingSink {
        objects:  Mutex::new(Vec::new()),
        fail_ids: vec![stable_uuid(4)],
    };
    let log = ingest(&records, VectorizationStrategy::ServiceComputed, &sink, 4)
        .await
        .unwrap();

    assert_eq!(log.len(), 1);
    assert_eq!(log.first().unwrap().id, stable_uuid(4));
    // Every object, including the failed one's batch-mates and all later
    // batches, was still submitted.
    assert_eq!(sink.objects.lock().unwrap().len(), 10);
}

#[tokio::test]
async fn live_store_round_trip() {
    // This test assumes a local store instance at http://localhost:8080
    // with the text2vec module enabled.
    if std::env::var("RUN_WEAVIATE_TESTS").is_err() {
        println!("Skipping live store test: RUN_WEAVIATE_TESTS environment variable not set.");
        return;
    }

    let config = StoreConfig::local().expect("Failed to build local store config");
    let store = WeaviateStore::connect(&config)
        .await
        .expect("Failed to connect to store");

    let schema = CollectionSchema::new(
        "MovieTestRun",
        movie_properties(false),
        Vectorizer::SelfProvided,
    );
    store
        .recreate_collection(&schema)
        .await
        .expect("Failed to recreate test collection");

    let sources = vec![
        source_record(1, "First test movie"),
        source_record(2, "Second test movie"),
    ];
    let records = sources
        .iter()
        .map(normalize)
        .collect::<Result<Vec<_>>>()
        .unwrap();
    let vectors = vec![vec![0.1, 0.2, 0.3, 0.4], vec![0.4, 0.3, 0.2, 0.1]];

    let writer = CollectionWriter::new(&store, &schema.name);
    let log = ingest(&records, VectorizationStrategy::Provided(vectors), &writer, 50)
        .await
        .expect("Failed to ingest test records");
    assert!(log.is_empty(), "per-object failures: {:?}", log.failures());

    let response = store
        .query(&QueryRequest::new(
            &schema.name,
            SearchInput::NearVector(vec![0.1, 0.2, 0.3, 0.4]),
            5,
        ))
        .await
        .expect("Failed to query test collection");

    assert!(response.hits.len() <= 5);
    assert!(!response.hits.is_empty());
    // Results come back in non-decreasing distance order.
    let distances: Vec<f64> = response.hits.iter().filter_map(|h| h.distance).collect();
    assert!(distances.windows(2).all(|w| w[0] <= w[1]));

    store
        .delete_collection(&schema.name)
        .await
        .expect("Failed to clean up test collection");
}

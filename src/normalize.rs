// movievec/src/normalize.rs
// Converts raw dataset rows into store-ready records and derives the
// deterministic object identifier used for idempotent re-ingestion.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::dataset::SourceRecord;
use crate::error::{LoaderError, Result};

/// Canonical movie record: parsed genre list, UTC release instant, stable
/// source id, optional base64 poster blob.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub title:        String,
    pub overview:     String,
    pub vote_average: f64,
    pub genre_ids:    Vec<i64>,
    pub release_date: DateTime<Utc>,
    pub tmdb_id:      i64,
    pub poster:       Option<String>,
}

/// Pure derivation of a NormalizedRecord from a SourceRecord.
///
/// The source date carries no offset; it is pinned to UTC midnight, matching
/// the reference loader's behavior.
pub fn normalize(record: &SourceRecord) -> Result<NormalizedRecord> {
    let date = NaiveDate::parse_from_str(&record.release_date, "%Y-%m-%d").map_err(|e| {
        LoaderError::Parse(format!(
            "bad release_date {:?} for tmdb id {}: {}",
            record.release_date, record.id, e
        ))
    })?;
    let release_date = DateTime::<Utc>::from_naive_utc_and_offset(
        date.and_hms_opt(0, 0, 0)
            .ok_or_else(|| LoaderError::Parse("midnight is unrepresentable".to_string()))?,
        Utc,
    );

    let genre_ids: Vec<i64> = serde_json::from_str(&record.genre_ids).map_err(|e| {
        LoaderError::Parse(format!(
            "bad genre_ids {:?} for tmdb id {}: {}",
            record.genre_ids, record.id, e
        ))
    })?;

    Ok(NormalizedRecord {
        title: record.title.clone(),
        overview: record.overview.clone(),
        vote_average: record.vote_average,
        genre_ids,
        release_date,
        tmdb_id: record.id,
        poster: None,
    })
}

/// Name-based (version 5) UUID of the source id's decimal string. Same id,
/// same UUID, on every run: re-ingesting overwrites instead of duplicating.
pub fn stable_uuid(id: i64) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, id.to_string().as_bytes())
}

impl NormalizedRecord {
    pub fn with_poster(mut self, poster_b64: String) -> Self {
        self.poster = Some(poster_b64);
        self
    }

    /// Property map as the store expects it: RFC3339 date, plain int array.
    /// The poster blob is included only when present.
    pub fn to_properties(&self) -> serde_json::Value {
        let mut props = json!({
            "title": self.title,
            "overview": self.overview,
            "vote_average": self.vote_average,
            "genre_ids": self.genre_ids,
            "release_date": self.release_date.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            "tmdb_id": self.tmdb_id,
        });
        if let Some(poster) = &self.poster {
            props["poster"] = json!(poster);
        }
        props
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn example_record() -> SourceRecord {
        SourceRecord {
            title:        "Example".to_string(),
            overview:     "A test.".to_string(),
            vote_average: 7.5,
            genre_ids:    "[1,2]".to_string(),
            release_date: "2021-06-15".to_string(),
            id:           42,
        }
    }

    #[test]
    fn normalizes_example_record() {
        let normalized = normalize(&example_record()).unwrap();
        assert_eq!(normalized.title, "Example");
        assert_eq!(normalized.overview, "A test.");
        assert_eq!(normalized.vote_average, 7.5);
        assert_eq!(normalized.genre_ids, vec![1, 2]);
        assert_eq!(
            normalized.release_date,
            Utc.with_ymd_and_hms(2021, 6, 15, 0, 0, 0).unwrap()
        );
        assert_eq!(normalized.tmdb_id, 42);
        assert_eq!(normalized.poster, None);
    }

    #[test]
    fn normalization_is_deterministic() {
        let record = example_record();
        assert_eq!(normalize(&record).unwrap(), normalize(&record).unwrap());
    }

    #[test]
    fn bad_date_is_parse_error() {
        let mut record = example_record();
        record.release_date = "15/06/2021".to_string();
        assert!(matches!(normalize(&record), Err(LoaderError::Parse(_))));
    }

    #[test]
    fn bad_genre_ids_is_parse_error() {
        let mut record = example_record();
        record.genre_ids = "[1, oops]".to_string();
        assert!(matches!(normalize(&record), Err(LoaderError::Parse(_))));
    }

    #[test]
    fn stable_uuid_is_deterministic_and_distinct() {
        assert_eq!(stable_uuid(42), stable_uuid(42));
        assert_ne!(stable_uuid(42), stable_uuid(43));
        // v5 = name-based SHA-1
        assert_eq!(stable_uuid(42).get_version_num(), 5);
    }

    #[test]
    fn properties_use_rfc3339_utc_date() {
        let props = normalize(&example_record()).unwrap().to_properties();
        assert_eq!(props["release_date"], "2021-06-15T00:00:00Z");
        assert_eq!(props["genre_ids"], json!([1, 2]));
        assert!(props.get("poster").is_none());
    }

    #[test]
    fn poster_blob_included_when_present() {
        let props = normalize(&example_record())
            .unwrap()
            .with_poster("aGVsbG8=".to_string())
            .to_properties();
        assert_eq!(props["poster"], "aGVsbG8=");
    }
}

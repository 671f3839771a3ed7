// movievec/src/dataset.rs
// Fetches the source movie dataset and local poster images.

use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use tracing::info;

use crate::error::{LoaderError, Result};

/// Raw row of the published movie dataset. `genre_ids` is a JSON-encoded
/// integer array and `release_date` a `YYYY-MM-DD` string; both stay
/// unparsed here and are interpreted by the normalizer.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SourceRecord {
    pub title:        String,
    pub overview:     String,
    pub vote_average: f64,
    pub genre_ids:    String,
    pub release_date: String,
    pub id:           i64,
}

/// Single-attempt HTTP fetch of the dataset. Transport failures and
/// non-success statuses are fatal; there is no retry.
pub async fn fetch_dataset(client: &reqwest::Client, url: &str) -> Result<Vec<SourceRecord>> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| LoaderError::Network(format!("failed to fetch dataset: {}", e)))?;

    if !response.status().is_success() {
        return Err(LoaderError::Network(format!(
            "dataset fetch returned status {}",
            response.status()
        )));
    }

    let body = response
        .text()
        .await
        .map_err(|e| LoaderError::Network(format!("failed to read dataset body: {}", e)))?;

    let records: Vec<SourceRecord> = serde_json::from_str(&body).map_err(|e| {
        LoaderError::Format(format!("dataset is not a JSON array of movie rows: {}", e))
    })?;

    info!("Fetched {} movie records from {}", records.len(), url);
    Ok(records)
}

/// Makes sure `dir` holds the poster images, downloading and extracting the
/// published archive when it does not. A directory that already has posters
/// is left untouched, so repeated loads skip the download.
pub async fn ensure_posters(client: &reqwest::Client, url: &str, dir: &Path) -> Result<()> {
    let existing = poster_inventory(dir)?;
    if !existing.is_empty() {
        info!("Using {} posters already in {}", existing.len(), dir.display());
        return Ok(());
    }

    info!("Downloading poster archive from {}", url);
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| LoaderError::Network(format!("failed to fetch poster archive: {}", e)))?;
    if !response.status().is_success() {
        return Err(LoaderError::Network(format!(
            "poster archive fetch returned status {}",
            response.status()
        )));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| LoaderError::Network(format!("failed to read poster archive: {}", e)))?;

    let extracted = extract_posters(&bytes, dir)?;
    info!("Extracted {} posters into {}", extracted, dir.display());
    Ok(())
}

/// Unpacks a zip archive of poster images into `dir`, flattening any
/// internal directory structure so entries land as `{id}_poster.jpg`.
pub fn extract_posters(archive_bytes: &[u8], dir: &Path) -> Result<usize> {
    std::fs::create_dir_all(dir)?;
    let mut archive = zip::ZipArchive::new(Cursor::new(archive_bytes))
        .map_err(|e| LoaderError::Format(format!("poster archive is not a valid zip: {}", e)))?;

    let mut extracted = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| LoaderError::Format(format!("bad poster archive entry: {}", e)))?;
        if !entry.is_file() {
            continue;
        }
        // enclosed_name rejects entries that would escape the target dir.
        let Some(name) = entry.enclosed_name() else {
            continue;
        };
        let Some(file_name) = name.file_name() else {
            continue;
        };
        let mut out = std::fs::File::create(dir.join(file_name))?;
        std::io::copy(&mut entry, &mut out)?;
        extracted += 1;
    }
    Ok(extracted)
}

/// Reads `{id}_poster.jpg` from `dir` and base64-encodes it for blob
/// transport to the store.
pub fn load_poster(dir: &Path, id: i64) -> Result<String> {
    let path = dir.join(format!("{}_poster.jpg", id));
    let bytes = std::fs::read(&path)?;
    Ok(BASE64.encode(bytes))
}

/// Walks the poster directory and returns the ids that have a poster image.
pub fn poster_inventory(dir: &Path) -> Result<HashSet<i64>> {
    let mut ids = HashSet::new();
    for entry in walkdir::WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.path().is_file() {
            continue;
        }
        let Some(name) = entry.path().file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(stem) = name.strip_suffix("_poster.jpg") {
            if let Ok(id) = stem.parse::<i64>() {
                ids.insert(id);
            }
        }
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_source_record() {
        let raw = r#"{
            "title": "Example",
            "overview": "A test.",
            "vote_average": 7.5,
            "genre_ids": "[1, 2]",
            "release_date": "2021-06-15",
            "id": 42
        }"#;
        let record: SourceRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.title, "Example");
        assert_eq!(record.genre_ids, "[1, 2]");
        assert_eq!(record.id, 42);
    }

    #[test]
    fn poster_inventory_parses_ids_from_filenames() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("42_poster.jpg"), b"jpegdata").unwrap();
        std::fs::write(dir.path().join("99_poster.jpg"), b"jpegdata").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let ids = poster_inventory(dir.path()).unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&42));
        assert!(ids.contains(&99));
    }

    #[test]
    fn load_poster_base64_encodes_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("7_poster.jpg"), b"abc").unwrap();
        let encoded = load_poster(dir.path(), 7).unwrap();
        assert_eq!(encoded, "YWJj");
    }

    #[test]
    fn extract_posters_flattens_archive_entries() {
        use std::io::Write;

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file("imgs/42_poster.jpg", options).unwrap();
            zip.write_all(b"jpegdata").unwrap();
            zip.start_file("7_poster.jpg", options).unwrap();
            zip.write_all(b"other").unwrap();
            zip.finish().unwrap();
        }

        let dir = tempfile::tempdir().unwrap();
        let extracted = extract_posters(cursor.get_ref(), dir.path()).unwrap();
        assert_eq!(extracted, 2);

        // Nested entries are flattened to {id}_poster.jpg in the target dir.
        let ids = poster_inventory(dir.path()).unwrap();
        assert!(ids.contains(&42));
        assert!(ids.contains(&7));
        assert_eq!(load_poster(dir.path(), 7).unwrap(), "b3RoZXI=");
    }

    #[test]
    fn extract_posters_rejects_non_zip_payload() {
        let dir = tempfile::tempdir().unwrap();
        let res = extract_posters(b"definitely not a zip", dir.path());
        assert!(matches!(res, Err(LoaderError::Format(_))));
    }

    #[test]
    fn load_poster_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let res = load_poster(dir.path(), 123);
        assert!(matches!(res, Err(LoaderError::Io(_))));
    }
}

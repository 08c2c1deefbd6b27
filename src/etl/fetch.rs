//! Fetch functions - retrieve raw document collections from exports

use crate::etl::error::{EtlError, EtlResult};
use crate::etl::types::{RawRecord, RawTables};
use crate::etl::utils::http_get;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Document-store identifier, never part of the output tables
const DOCUMENT_ID: &str = "_id";

/// File extensions tried, in order, for a directory export
const EXPORT_EXTENSIONS: [&str; 3] = ["json", "jsonl", "ndjson"];

/// Anything that can hand over a named collection of raw documents
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch_collection(&self, name: &str) -> EtlResult<Vec<RawRecord>>;
}

/// Where collection exports live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportLocation {
    Directory(PathBuf),
    Url(String),
}

/// Reads collection exports (JSON array or JSON Lines) from disk or HTTP
#[derive(Debug, Clone)]
pub struct ExportSource {
    location: ExportLocation,
}

impl ExportSource {
    pub fn new(location: ExportLocation) -> Self {
        Self { location }
    }

    async fn read_directory(dir: &Path, name: &str) -> EtlResult<String> {
        for ext in EXPORT_EXTENSIONS {
            let path = dir.join(format!("{}.{}", name, ext));
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => {
                    info!("Reading {} from {:?}", name, path);
                    return Ok(text);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(EtlError::Fetch {
                        name: name.to_string(),
                        reason: format!("{:?}: {}", path, e),
                    })
                }
            }
        }

        Err(EtlError::MissingSource(format!(
            "{} (no {}.json, .jsonl or .ndjson in {:?})",
            name, name, dir
        )))
    }

    async fn read_url(base: &str, name: &str) -> EtlResult<String> {
        let url = format!("{}/{}.json", base.trim_end_matches('/'), name);
        let bytes = http_get(&url)
            .await
            .map_err(|e| EtlError::Fetch {
                name: name.to_string(),
                reason: e.to_string(),
            })?
            .ok_or_else(|| EtlError::MissingSource(format!("{} ({})", name, url)))?;

        String::from_utf8(bytes).map_err(|e| EtlError::Fetch {
            name: name.to_string(),
            reason: format!("export is not valid UTF-8: {}", e),
        })
    }
}

#[async_trait]
impl DocumentSource for ExportSource {
    async fn fetch_collection(&self, name: &str) -> EtlResult<Vec<RawRecord>> {
        let text = match &self.location {
            ExportLocation::Directory(dir) => Self::read_directory(dir, name).await?,
            ExportLocation::Url(base) => Self::read_url(base, name).await?,
        };

        let records = parse_export(name, &text)?;
        info!("✓ Fetched {} documents from {}", records.len(), name);
        Ok(records)
    }
}

/// Parse an export body: a JSON array when it starts with `[`, JSON Lines
/// otherwise. Blank input is an empty collection.
pub fn parse_export(name: &str, text: &str) -> EtlResult<Vec<RawRecord>> {
    let trimmed = text.trim_start_matches('\u{feff}').trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let fetch_err = |reason: String| EtlError::Fetch {
        name: name.to_string(),
        reason,
    };

    let values: Vec<Value> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).map_err(|e| fetch_err(e.to_string()))?
    } else {
        trimmed
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line).map_err(|e| fetch_err(format!("line {}: {}", n + 1, e)))
            })
            .collect::<EtlResult<Vec<_>>>()?
    };

    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| match value {
            Value::Object(mut record) => {
                record.remove(DOCUMENT_ID);
                Ok(record)
            }
            other => Err(fetch_err(format!(
                "document {} is not an object: {}",
                index, other
            ))),
        })
        .collect()
}

/// Collections held in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    collections: HashMap<String, Vec<RawRecord>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(mut self, name: impl Into<String>, records: Vec<RawRecord>) -> Self {
        self.collections.insert(name.into(), records);
        self
    }
}

#[async_trait]
impl DocumentSource for MemorySource {
    async fn fetch_collection(&self, name: &str) -> EtlResult<Vec<RawRecord>> {
        self.collections
            .get(name)
            .cloned()
            .ok_or_else(|| EtlError::MissingSource(name.to_string()))
    }
}

/// Names of the three source collections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionNames {
    pub listings: String,
    pub reviews: String,
    pub calendar: String,
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            listings: "Listings".to_string(),
            reviews: "Reviews".to_string(),
            calendar: "Calendar".to_string(),
        }
    }
}

/// Fetch listings, reviews and calendar into one raw bundle
pub async fn extract_all(
    source: &dyn DocumentSource,
    names: &CollectionNames,
) -> EtlResult<RawTables> {
    let listings = source.fetch_collection(&names.listings).await?;
    let reviews = source.fetch_collection(&names.reviews).await?;
    let calendar = source.fetch_collection(&names.calendar).await?;

    debug!(
        listings = listings.len(),
        reviews = reviews.len(),
        calendar = calendar.len(),
        "Extraction finished"
    );

    Ok(RawTables {
        listings,
        reviews,
        calendar,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_parse_json_array_drops_document_id() {
        let text = r#"[{"_id": {"$oid": "65f0"}, "id": 1}, {"_id": "x", "id": 2}]"#;
        let records = parse_export("Listings", text).unwrap();

        assert_eq!(records.len(), 2);
        assert!(!records[0].contains_key("_id"));
        assert_eq!(records[1]["id"], json!(2));
    }

    #[test]
    fn test_parse_json_lines() {
        let text = "{\"listing_id\": 1}\n\n{\"listing_id\": 2}\n";
        let records = parse_export("Calendar", text).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["listing_id"], json!(1));
    }

    #[test]
    fn test_parse_blank_export_is_empty() {
        assert!(parse_export("Reviews", "").unwrap().is_empty());
        assert!(parse_export("Reviews", "  \n").unwrap().is_empty());
        assert!(parse_export("Reviews", "[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_non_objects() {
        let err = parse_export("Reviews", "[1, 2]").unwrap_err();
        assert!(matches!(err, EtlError::Fetch { .. }));

        let err = parse_export("Reviews", "{\"a\": 1}\nnot json").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[tokio::test]
    async fn test_directory_source_reads_json_and_jsonl() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("Listings.json"), r#"[{"id": 1}]"#).unwrap();
        std::fs::write(dir.path().join("Reviews.jsonl"), "{\"id\": 7}\n{\"id\": 8}\n").unwrap();
        std::fs::write(dir.path().join("Calendar.ndjson"), "").unwrap();

        let source = ExportSource::new(ExportLocation::Directory(dir.path().to_path_buf()));
        let raw = extract_all(&source, &CollectionNames::default()).await.unwrap();

        assert_eq!(raw.listings.len(), 1);
        assert_eq!(raw.reviews.len(), 2);
        assert!(raw.calendar.is_empty());
    }

    #[tokio::test]
    async fn test_missing_collection() {
        let dir = tempdir().unwrap();
        let source = ExportSource::new(ExportLocation::Directory(dir.path().to_path_buf()));

        let err = source.fetch_collection("Listings").await.unwrap_err();
        assert!(matches!(err, EtlError::MissingSource(_)));
    }

    #[tokio::test]
    async fn test_memory_source() {
        let record = json!({"id": 3}).as_object().cloned().unwrap();
        let source = MemorySource::new()
            .with_collection("Listings", vec![record])
            .with_collection("Reviews", vec![])
            .with_collection("Calendar", vec![]);

        let raw = extract_all(&source, &CollectionNames::default()).await.unwrap();
        assert_eq!(raw.listings.len(), 1);

        let err = source.fetch_collection("Hosts").await.unwrap_err();
        assert!(matches!(err, EtlError::MissingSource(_)));
    }

    #[tokio::test]
    #[ignore] // Needs an HTTP server serving exports at SOURCE_URL
    async fn test_url_source() {
        let base = std::env::var("SOURCE_URL").unwrap();
        let source = ExportSource::new(ExportLocation::Url(base));

        let result = source.fetch_collection("Listings").await;
        assert!(result.is_ok());
    }
}

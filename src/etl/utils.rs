//! Utility functions for common operations

use reqwest::{Client, StatusCode};
use std::collections::HashSet;
use std::hash::Hash;
use tracing::info;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Download a file via HTTP
/// Returns `None` when the server reports the resource does not exist
pub async fn http_get(url: &str) -> Result<Option<Vec<u8>>, reqwest::Error> {
    info!("Downloading from {}", url);
    let client = Client::builder()
        .timeout(std::time::Duration::from_secs(300)) // 5 min timeout
        .build()?;

    let response = client.get(url).send().await?;
    if response.status() == StatusCode::NOT_FOUND {
        return Ok(None);
    }

    let bytes = response.error_for_status()?.bytes().await?;
    info!("Downloaded {} bytes", bytes.len());
    Ok(Some(bytes.to_vec()))
}

/// Drop repeated items, keeping the first occurrence of each and the input order
pub fn dedup_stable<T: Eq + Hash + Clone>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Like [`dedup_stable`] but compares items by a derived key
pub fn dedup_stable_by_key<T, K, F>(items: impl IntoIterator<Item = T>, mut key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: FnMut(&T) -> K,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(key(item)))
        .collect()
}

/// Canonical catalog name for a free-text amenity
///
/// Lowercases, turns hyphens into spaces, strips accents by canonical
/// decomposition and collapses runs of whitespace. `"Wi-Fi"`, `"wi fi "`
/// and `"WI-FI"` all map to `"wi fi"`.
pub fn normalize_amenity_name(raw: &str) -> String {
    let lowered = raw.to_lowercase().trim().replace('-', " ");
    let stripped: String = lowered.nfd().filter(|c| !is_combining_mark(*c)).collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Null or empty text counts as missing
pub fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |s| s.is_empty())
}

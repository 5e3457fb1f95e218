//! Golden-data drift detection.
//!
//! The product list is cut into fixed-size chunks in position order. Each
//! chunk is serialized canonically (sorted keys, no whitespace) and hashed
//! with SHA-256; the manifest records those hashes. Validation reports
//! mismatches and never rewrites the manifest. Only `rebaseline` does that.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{PipelineError, Result};
use crate::model::{ProductRecord, ProductStore};

pub const MANIFEST_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkProduct {
    pub id: String,
    pub name: String,
    pub badge: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkEntry {
    pub hash: String,
    pub product_count: usize,
    #[serde(default)]
    pub products: Vec<ChunkProduct>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub version: String,
    pub generated: String,
    pub chunk_size: usize,
    pub chunks: BTreeMap<String, ChunkEntry>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let manifest: Self = serde_json::from_str(&text)?;
        if manifest.chunk_size == 0 {
            return Err(PipelineError::Config(format!(
                "manifest {} records chunkSize 0",
                path.display()
            )));
        }
        Ok(manifest)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        crate::store::write_json_atomic(self, path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
    /// Hash differs from the recorded one.
    Changed,
    /// Chunk exists now but the manifest has no entry for it.
    Unrecorded,
    /// Manifest entry whose chunk no longer exists.
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMismatch {
    pub chunk_id: String,
    pub kind: MismatchKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftReport {
    pub passed: bool,
    pub checked: usize,
    pub mismatches: Vec<ChunkMismatch>,
}

impl DriftReport {
    pub fn mismatch_ids(&self) -> Vec<String> {
        self.mismatches.iter().map(|m| m.chunk_id.clone()).collect()
    }

    /// `HashMismatchError` for callers that treat drift as fatal.
    pub fn into_result(self) -> Result<Self> {
        if self.passed {
            Ok(self)
        } else {
            Err(PipelineError::HashMismatch {
                chunks: self.mismatch_ids(),
            })
        }
    }
}

pub fn chunk_id(index: usize) -> String {
    format!("chunk-{:03}", index + 1)
}

/// Position-ordered chunks of at most `size` records, with their ids.
pub fn chunks(store: &ProductStore, size: usize) -> Vec<(String, Vec<&ProductRecord>)> {
    let mut ordered: Vec<&ProductRecord> = store.products.iter().collect();
    ordered.sort_by_key(|p| p.position);
    ordered
        .chunks(size.max(1))
        .enumerate()
        .map(|(i, chunk)| (chunk_id(i), chunk.to_vec()))
        .collect()
}

/// Compact JSON with object keys sorted at every level.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let value = sort_keys(serde_json::to_value(value)?);
    Ok(serde_json::to_string(&value)?)
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, sort_keys(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

pub fn hash_chunk(records: &[&ProductRecord]) -> Result<String> {
    let canonical = canonical_json(records)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Hash of every chunk in the store.
pub fn chunk_hashes(store: &ProductStore, size: usize) -> Result<BTreeMap<String, String>> {
    chunks(store, size)
        .into_iter()
        .map(|(id, records)| Ok((id, hash_chunk(&records)?)))
        .collect()
}

/// Builds a fresh manifest from the current store.
pub fn build_manifest(store: &ProductStore, size: usize, generated: &str) -> Result<Manifest> {
    let mut entries = BTreeMap::new();
    for (id, records) in chunks(store, size) {
        entries.insert(
            id,
            ChunkEntry {
                hash: hash_chunk(&records)?,
                product_count: records.len(),
                products: records
                    .iter()
                    .map(|p| ChunkProduct {
                        id: p.id.clone(),
                        name: p.name.clone(),
                        badge: p.badge.clone(),
                    })
                    .collect(),
            },
        );
    }
    Ok(Manifest {
        version: MANIFEST_VERSION.to_string(),
        generated: generated.to_string(),
        chunk_size: size,
        chunks: entries,
    })
}

/// Deliberately replaces the recorded manifest with the current store state.
pub fn rebaseline(
    store: &ProductStore,
    size: usize,
    generated: &str,
    path: &Path,
) -> Result<Manifest> {
    let manifest = build_manifest(store, size, generated)?;
    manifest.save(path)?;
    tracing::info!(
        path = %path.display(),
        chunks = manifest.chunks.len(),
        "re-baselined golden data manifest"
    );
    Ok(manifest)
}

/// Compares the store against `manifest`, using the chunk size it recorded.
pub fn validate(store: &ProductStore, manifest: &Manifest) -> Result<DriftReport> {
    let current = chunk_hashes(store, manifest.chunk_size)?;
    let mut mismatches = Vec::new();

    for (id, actual) in &current {
        match manifest.chunks.get(id) {
            Some(entry) if entry.hash == *actual => {
                tracing::debug!(chunk = %id, "chunk validated");
            }
            Some(entry) => {
                tracing::warn!(chunk = %id, "chunk hash differs from golden data");
                mismatches.push(ChunkMismatch {
                    chunk_id: id.clone(),
                    kind: MismatchKind::Changed,
                    expected: Some(entry.hash.clone()),
                    actual: Some(actual.clone()),
                });
            }
            None => {
                tracing::warn!(chunk = %id, "chunk has no golden data entry");
                mismatches.push(ChunkMismatch {
                    chunk_id: id.clone(),
                    kind: MismatchKind::Unrecorded,
                    expected: None,
                    actual: Some(actual.clone()),
                });
            }
        }
    }
    for (id, entry) in &manifest.chunks {
        if !current.contains_key(id) {
            tracing::warn!(chunk = %id, "golden data chunk no longer present");
            mismatches.push(ChunkMismatch {
                chunk_id: id.clone(),
                kind: MismatchKind::Missing,
                expected: Some(entry.hash.clone()),
                actual: None,
            });
        }
    }

    Ok(DriftReport {
        passed: mismatches.is_empty(),
        checked: current.len(),
        mismatches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PageMetadata;

    fn store(n: usize) -> ProductStore {
        let products = (1..=n)
            .map(|i| ProductRecord::named(format!("p-{i}"), format!("Product {i}")))
            .collect();
        ProductStore::new(PageMetadata::default(), products)
    }

    #[test]
    fn chunk_ids_are_zero_padded() {
        let ids: Vec<_> = chunks(&store(11), 5).into_iter().map(|(id, c)| (id, c.len())).collect();
        assert_eq!(
            ids,
            vec![
                ("chunk-001".to_string(), 5),
                ("chunk-002".to_string(), 5),
                ("chunk-003".to_string(), 1)
            ]
        );
    }

    #[test]
    fn canonical_json_sorts_nested_keys() {
        let value = serde_json::json!({ "b": 1, "a": { "d": [ { "z": 1, "y": 2 } ], "c": null } });
        assert_eq!(
            canonical_json(&value).unwrap(),
            r#"{"a":{"c":null,"d":[{"y":2,"z":1}]},"b":1}"#
        );
    }

    #[test]
    fn fresh_manifest_validates() {
        let s = store(7);
        let manifest = build_manifest(&s, 5, "2026-01-01T00:00:00Z").unwrap();
        assert_eq!(manifest.chunks["chunk-002"].product_count, 2);
        let report = validate(&s, &manifest).unwrap();
        assert!(report.passed);
        assert_eq!(report.checked, 2);
    }

    #[test]
    fn edits_are_reported_per_chunk() {
        let s = store(7);
        let manifest = build_manifest(&s, 5, "t").unwrap();
        let mut edited = s.clone();
        edited.products[6].rating = 4.5;
        let report = validate(&edited, &manifest).unwrap();
        assert!(!report.passed);
        assert_eq!(report.mismatch_ids(), vec!["chunk-002"]);
        assert_eq!(report.mismatches[0].kind, MismatchKind::Changed);
        assert!(matches!(
            report.into_result(),
            Err(PipelineError::HashMismatch { chunks }) if chunks == vec!["chunk-002"]
        ));
    }

    #[test]
    fn growth_and_shrinkage_are_mismatches() {
        let manifest = build_manifest(&store(5), 5, "t").unwrap();
        let grown = validate(&store(6), &manifest).unwrap();
        assert_eq!(grown.mismatches[0].kind, MismatchKind::Unrecorded);

        let manifest = build_manifest(&store(6), 5, "t").unwrap();
        let shrunk = validate(&store(5), &manifest).unwrap();
        assert_eq!(shrunk.mismatches.len(), 1);
        assert_eq!(shrunk.mismatches[0].kind, MismatchKind::Missing);
    }

    #[test]
    fn page_metadata_is_not_hashed() {
        let s = store(3);
        let manifest = build_manifest(&s, 5, "t").unwrap();
        let mut retitled = s.clone();
        retitled.page.title = "New title".into();
        assert!(validate(&retitled, &manifest).unwrap().passed);
    }

    #[test]
    fn hash_is_stable_hex() {
        let s = store(2);
        let a = chunk_hashes(&s, 5).unwrap();
        let b = chunk_hashes(&s.clone(), 5).unwrap();
        assert_eq!(a, b);
        assert_eq!(a["chunk-001"].len(), 64);
    }

    #[test]
    fn rebaseline_writes_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("golden-data").join("manifest.json");
        let s = store(3);
        let written = rebaseline(&s, 5, "t", &path).unwrap();
        assert_eq!(Manifest::load(&path).unwrap(), written);
    }
}

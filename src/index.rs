//! Persistent brute-force vector index.
//!
//! Entries are `(text, source, embedding)` triples held in memory and
//! scanned linearly at query time. The whole index serializes to a single
//! `index.json` inside the index directory; embeddings are stored as
//! base64-encoded little-endian f32 blobs. Writes go through a temp file
//! plus rename so the previous snapshot stays readable until the new one
//! is complete.
//!
//! "Absent" is a normal state, not an error: [`VectorIndex::load`] returns
//! `Ok(None)` when nothing has been persisted yet.

use std::fs;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::{Error, Result};
use crate::models::SearchHit;

/// File name of the serialized index inside the index directory.
pub(crate) const INDEX_FILE: &str = "index.json";

/// One embedded chunk with its provenance.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub text: String,
    pub source: String,
    pub embedding: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct StoredIndex {
    dims: usize,
    entries: Vec<StoredEntry>,
}

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    text: String,
    source: String,
    /// base64 of little-endian f32 bytes
    embedding: String,
}

/// Brute-force cosine similarity index over embedded chunks.
#[derive(Debug)]
pub struct VectorIndex {
    dims: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Build a fresh index from an initial batch of entries.
    ///
    /// Dimensionality is taken from the first entry and enforced on the
    /// rest.
    ///
    /// # Errors
    ///
    /// `EmptyBatch` for zero entries, `DimensionMismatch` if the entries
    /// disagree on vector length.
    pub fn build(entries: Vec<IndexEntry>) -> Result<Self> {
        let dims = match entries.first() {
            Some(first) => first.embedding.len(),
            None => return Err(Error::EmptyBatch),
        };

        for entry in &entries {
            if entry.embedding.len() != dims {
                return Err(Error::DimensionMismatch {
                    expected: dims,
                    got: entry.embedding.len(),
                });
            }
        }

        Ok(Self { dims, entries })
    }

    /// Append entries to an existing index.
    pub fn add(&mut self, entries: Vec<IndexEntry>) -> Result<()> {
        for entry in &entries {
            if entry.embedding.len() != self.dims {
                return Err(Error::DimensionMismatch {
                    expected: self.dims,
                    got: entry.embedding.len(),
                });
            }
        }
        self.entries.extend(entries);
        Ok(())
    }

    /// Return the `k` entries most similar to `query`, best first.
    ///
    /// Scores every entry with cosine similarity and sorts descending.
    /// The sort is stable, so entries with equal scores keep insertion
    /// order. Returns fewer than `k` hits when the index is smaller.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        let mut hits: Vec<SearchHit> = self
            .entries
            .iter()
            .map(|entry| SearchHit {
                text: entry.text.clone(),
                source: entry.source.clone(),
                score: cosine_similarity(query, &entry.embedding),
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        hits
    }

    /// Load a previously persisted index from `dir`.
    ///
    /// Returns `Ok(None)` when no index has been persisted there.
    ///
    /// # Errors
    ///
    /// I/O failures, malformed JSON, or embeddings that cannot be decoded
    /// back to the stored dimensionality.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(INDEX_FILE);
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&path)?;
        let stored: StoredIndex = serde_json::from_slice(&bytes)?;

        let mut entries = Vec::with_capacity(stored.entries.len());
        for entry in stored.entries {
            let blob = STANDARD
                .decode(&entry.embedding)
                .map_err(|e| Error::CorruptIndex(format!("bad embedding encoding: {}", e)))?;
            let embedding = blob_to_vec(&blob);
            if embedding.len() != stored.dims {
                return Err(Error::CorruptIndex(format!(
                    "entry for '{}' has {} dims, index has {}",
                    entry.source,
                    embedding.len(),
                    stored.dims
                )));
            }
            entries.push(IndexEntry {
                text: entry.text,
                source: entry.source,
                embedding,
            });
        }

        Ok(Some(Self {
            dims: stored.dims,
            entries,
        }))
    }

    /// Write the index to `index.json` under `dir`, creating the
    /// directory if needed.
    ///
    /// The file is written to a temp name first and renamed into place,
    /// so a crash mid-write leaves the previous snapshot intact.
    pub fn persist(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;

        let stored = StoredIndex {
            dims: self.dims,
            entries: self
                .entries
                .iter()
                .map(|entry| StoredEntry {
                    text: entry.text.clone(),
                    source: entry.source.clone(),
                    embedding: STANDARD.encode(vec_to_blob(&entry.embedding)),
                })
                .collect(),
        };

        let json = serde_json::to_vec(&stored)?;
        let tmp = dir.join("index.json.tmp");
        fs::write(&tmp, &json)?;
        fs::rename(&tmp, dir.join(INDEX_FILE))?;
        Ok(())
    }

    /// Delete the persisted index directory. Idempotent.
    pub fn clear(dir: &Path) -> Result<()> {
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        Ok(())
    }

    /// Drop every entry belonging to `source`. Returns how many were
    /// removed.
    pub fn remove_source(&mut self, source: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.source != source);
        before - self.entries.len()
    }

    /// Cut the index back to its first `len` entries.
    ///
    /// Used to undo an `add` whose persist failed, so in-memory and
    /// on-disk state stay in step.
    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Number of entries belonging to `source`.
    pub fn source_chunk_count(&self, source: &str) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.source == source)
            .count()
    }
}

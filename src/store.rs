//! Similarity Cache & Result Store
//!
//! Append-only `(embedding, verdict)` pairs shared across requests. Lookups
//! are read-only parallel scans; appends take the write lock so a new entry
//! becomes visible atomically as a whole unit. No entry is ever updated in
//! place; eviction is a storage-level concern, not the pipeline's.
//!
//! Snapshots use the same wire format as the rest of the stack: bincode under
//! zstd, written off the async runtime.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::claim::{Claim, Verdict};

/// One cached verification result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Unit-length embedding of the claim text.
    pub embedding: Vec<f32>,
    pub verdict: Verdict,
}

/// A scored match returned by top-k search.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarVerdict {
    pub similarity: f32,
    pub verdict: Verdict,
}

pub struct VerdictStore {
    path: Option<PathBuf>,
    /// Inclusive similarity threshold for cache hits.
    threshold: f32,
    entries: Arc<RwLock<Vec<CacheEntry>>>,
}

impl VerdictStore {
    /// In-memory store without persistence.
    pub fn new(threshold: f32) -> Self {
        Self {
            path: None,
            threshold,
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Store backed by a snapshot file; loads an existing snapshot if present.
    pub fn open(path: impl Into<PathBuf>, threshold: f32) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let loaded = load_snapshot(&path)?;
            info!(count = loaded.len(), path = %path.display(), "loaded verdict snapshot");
            loaded
        } else {
            Vec::new()
        };
        Ok(Self {
            path: Some(path),
            threshold,
            entries: Arc::new(RwLock::new(entries)),
        })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Return the stored verdict most similar to `embedding` if its
    /// similarity clears the threshold (inclusive). Ties break toward the
    /// most recently stored entry. Pure function of the store contents.
    pub async fn lookup(&self, embedding: &[f32]) -> Option<Verdict> {
        let entries = self.entries.read().await;
        let best = entries
            .par_iter()
            .enumerate()
            .map(|(idx, entry)| (dot(embedding, &entry.embedding), idx))
            .filter(|(similarity, _)| *similarity >= self.threshold)
            // Later index wins equal similarity: compare (similarity, idx).
            .max_by(|a, b| {
                a.0.partial_cmp(&b.0)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.1.cmp(&b.1))
            });
        best.map(|(similarity, idx)| {
            debug!(similarity, "similarity cache hit");
            entries[idx].verdict.clone()
        })
    }

    /// Top-k most similar stored verdicts, best first, no threshold applied.
    pub async fn top_k(&self, embedding: &[f32], k: usize) -> Vec<SimilarVerdict> {
        let entries = self.entries.read().await;
        let mut scored: Vec<(f32, usize)> = entries
            .par_iter()
            .enumerate()
            .map(|(idx, entry)| (dot(embedding, &entry.embedding), idx))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(k)
            .map(|(similarity, idx)| SimilarVerdict {
                similarity,
                verdict: entries[idx].verdict.clone(),
            })
            .collect()
    }

    /// Append a new entry. Write-through: callers await this before returning
    /// a verdict, so nothing externally visible is missing from the cache.
    /// Never overwrites near-duplicates; duplicates are acceptable.
    pub async fn store(&self, claim: &Claim, verdict: Verdict) {
        let Some(embedding) = claim.embedding.clone() else {
            // Embedder was down for this request; nothing to index by.
            return;
        };
        let mut entries = self.entries.write().await;
        entries.push(CacheEntry { embedding, verdict });
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Most recently stored verdicts, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<Verdict> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .rev()
            .take(limit)
            .map(|e| e.verdict.clone())
            .collect()
    }

    /// Write a snapshot to disk, off the async runtime.
    pub async fn persist(&self) -> Result<()> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        let entries = self.entries.read().await.clone();
        tokio::task::spawn_blocking(move || write_snapshot(&path, &entries))
            .await
            .context("snapshot task panicked")??;
        Ok(())
    }
}

fn load_snapshot(path: &Path) -> Result<Vec<CacheEntry>> {
    let file = File::open(path).with_context(|| format!("open snapshot {}", path.display()))?;
    let decoder = zstd::stream::read::Decoder::new(file)?;
    let entries = bincode::deserialize_from(decoder).context("decode snapshot")?;
    Ok(entries)
}

fn write_snapshot(path: &Path, entries: &[CacheEntry]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("create snapshot {}", path.display()))?;
    let writer = BufWriter::new(file);
    let mut encoder = zstd::stream::write::Encoder::new(writer, 3)?;
    bincode::serialize_into(&mut encoder, entries).context("encode snapshot")?;
    encoder.finish()?;
    Ok(())
}

/// Similarity between unit vectors: cosine reduces to the dot product.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

//! Exact nearest-neighbour vector index with lossless persistence.
//!
//! A [`VectorIndex`] is an ordered list of chunks and their vectors plus the
//! identity of the embedder that produced them. It is built once, then only
//! read. [`SharedIndex`] puts an index behind a single-writer/multi-reader
//! handle so that a rebuild can swap in a complete new index without readers
//! ever observing a partial one.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::document::{Chunk, SearchResult};
use crate::embedding::{EmbedderInfo, EmbeddingProvider};
use crate::error::{RagError, Result};

/// Format tag written into every persisted index.
pub const INDEX_FORMAT: &str = "docent-index";

/// Current persisted index version.
pub const INDEX_VERSION: u32 = 1;

/// Number of chunk texts sent to the embedder per call while building.
const EMBED_BATCH_SIZE: usize = 64;

/// Similarity metric used to score stored vectors against a query.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Cosine similarity; zero-magnitude vectors score 0.0.
    #[default]
    Cosine,
    /// Negative Euclidean distance, so that higher is still closer.
    Euclidean,
}

impl Metric {
    /// Score a stored vector against a query vector. Higher is more similar.
    pub fn score(self, stored: &[f32], query: &[f32]) -> f32 {
        match self {
            Metric::Cosine => cosine_similarity(stored, query),
            Metric::Euclidean => -stored
                .iter()
                .zip(query)
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f32>()
                .sqrt(),
        }
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// A chunk together with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// The indexed chunk.
    pub chunk: Chunk,
    /// The chunk's embedding, stored as little-endian `f32` bytes in base64.
    #[serde(with = "vector_encoding")]
    pub vector: Vec<f32>,
}

/// An immutable collection of embedded chunks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorIndex {
    embedder: EmbedderInfo,
    metric: Metric,
    entries: Vec<IndexEntry>,
}

/// On-disk envelope around a [`VectorIndex`].
#[derive(Serialize, Deserialize)]
struct PersistedIndex<I> {
    format: String,
    version: u32,
    index: I,
}

impl VectorIndex {
    /// Embed every chunk and build an index over them.
    ///
    /// Each embedder call is bounded by `embed_timeout`. The build is
    /// all-or-nothing: any embedder failure or timeout, a wrong number of
    /// vectors, a vector of the wrong dimension, or a non-finite component
    /// aborts it and no index is returned.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] on any of the failures above.
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: &dyn EmbeddingProvider,
        metric: Metric,
        embed_timeout: Duration,
    ) -> Result<Self> {
        let info = embedder.info();
        let mut entries = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let vectors = tokio::time::timeout(embed_timeout, embedder.embed_batch(&texts))
                .await
                .map_err(|_| {
                    error!(model = %info.model_id, timeout = ?embed_timeout, "embedding timed out during index build");
                    RagError::embedding(&info.model_id, format!("timed out after {embed_timeout:?}"))
                })?
                .map_err(|e| {
                    error!(model = %info.model_id, error = %e, "embedding failed during index build");
                    e
                })?;

            if vectors.len() != batch.len() {
                return Err(RagError::embedding(
                    &info.model_id,
                    format!("expected {} vectors, got {}", batch.len(), vectors.len()),
                ));
            }

            for (chunk, vector) in batch.iter().zip(vectors) {
                if vector.len() != info.dimensions {
                    return Err(RagError::embedding(
                        &info.model_id,
                        format!(
                            "chunk '{}' embedded to {} dimensions, expected {}",
                            chunk.id,
                            vector.len(),
                            info.dimensions
                        ),
                    ));
                }
                if vector.iter().any(|x| !x.is_finite()) {
                    return Err(RagError::embedding(
                        &info.model_id,
                        format!("chunk '{}' embedded to a non-finite vector", chunk.id),
                    ));
                }
                entries.push(IndexEntry { chunk: chunk.clone(), vector });
            }
        }

        info!(model = %info.model_id, chunk_count = entries.len(), ?metric, "built vector index");
        Ok(Self { embedder: info, metric, entries })
    }

    /// An index with no entries.
    pub fn empty(embedder: EmbedderInfo, metric: Metric) -> Self {
        Self { embedder, metric, entries: Vec::new() }
    }

    /// Identity of the embedder the index was built with.
    pub fn embedder(&self) -> &EmbedderInfo {
        &self.embedder
    }

    /// The metric used for scoring.
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Dimension of every stored vector.
    pub fn dimensions(&self) -> usize {
        self.embedder.dimensions
    }

    /// Stored entries in insertion order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Number of stored chunks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fail unless `embedder` produces vectors compatible with this index.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if the dimensions differ and
    /// [`RagError::EmbedderMismatch`] if the model ids differ.
    pub fn check_embedder(&self, embedder: &dyn EmbeddingProvider) -> Result<()> {
        if embedder.dimensions() != self.embedder.dimensions {
            return Err(RagError::DimensionMismatch {
                expected: self.embedder.dimensions,
                actual: embedder.dimensions(),
            });
        }
        if embedder.model_id() != self.embedder.model_id {
            return Err(RagError::EmbedderMismatch {
                index: self.embedder.model_id.clone(),
                provider: embedder.model_id().to_string(),
            });
        }
        Ok(())
    }

    /// Return the `k` entries most similar to `vector`, best first.
    ///
    /// Fewer than `k` results are returned only when the index holds fewer
    /// than `k` chunks. Equal scores keep insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if `vector` has the wrong length.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if vector.len() != self.embedder.dimensions {
            return Err(RagError::DimensionMismatch {
                expected: self.embedder.dimensions,
                actual: vector.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, self.metric.score(&entry.vector, vector)))
            .collect();

        // `sort_by` is stable, so ties stay in insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| SearchResult { chunk: self.entries[i].chunk.clone(), score })
            .collect())
    }

    /// Write the index to `path`.
    ///
    /// The file is written next to `path` first and then renamed over it, so
    /// a reader never sees a half-written index.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let envelope = PersistedIndex {
            format: INDEX_FORMAT.to_string(),
            version: INDEX_VERSION,
            index: self,
        };
        let bytes = serde_json::to_vec(&envelope).map_err(std::io::Error::other)?;

        let tmp = temp_path(path);
        std::fs::write(&tmp, bytes)?;
        if let Err(e) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }

        info!(path = %path.display(), chunk_count = self.len(), "persisted vector index");
        Ok(())
    }

    /// Read an index written by [`persist`](VectorIndex::persist).
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexUnavailable`] if the file is missing, cannot be
    /// parsed, or carries an unknown format tag or version, and
    /// [`RagError::DimensionMismatch`] if any stored vector disagrees with the
    /// recorded embedding dimension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| RagError::unavailable(path, e.to_string()))?;

        let envelope: PersistedIndex<VectorIndex> = serde_json::from_slice(&bytes)
            .map_err(|e| RagError::unavailable(path, format!("corrupt index file: {e}")))?;

        if envelope.format != INDEX_FORMAT {
            return Err(RagError::unavailable(
                path,
                format!("unknown index format '{}'", envelope.format),
            ));
        }
        if envelope.version != INDEX_VERSION {
            return Err(RagError::unavailable(
                path,
                format!("unsupported index version {}", envelope.version),
            ));
        }

        let index = envelope.index;
        if index.embedder.dimensions == 0 {
            return Err(RagError::unavailable(path, "index records zero embedding dimensions"));
        }
        if let Some(entry) = index.entries.iter().find(|e| e.vector.len() != index.dimensions()) {
            return Err(RagError::DimensionMismatch {
                expected: index.dimensions(),
                actual: entry.vector.len(),
            });
        }

        debug!(path = %path.display(), chunk_count = index.len(), "loaded vector index");
        Ok(index)
    }

    /// Load an index and check that `embedder` matches the one it was built with.
    ///
    /// # Errors
    ///
    /// Everything [`load`](VectorIndex::load) returns, plus the errors of
    /// [`check_embedder`](VectorIndex::check_embedder).
    pub fn load_for(path: impl AsRef<Path>, embedder: &dyn EmbeddingProvider) -> Result<Self> {
        let index = Self::load(path)?;
        index.check_embedder(embedder)?;
        Ok(index)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// A single-writer/multi-reader handle to the current [`VectorIndex`].
///
/// Readers take a cheap [`Arc`] snapshot and query it without holding any
/// lock. Writers ([`rebuild`](SharedIndex::rebuild),
/// [`replace`](SharedIndex::replace), [`persist`](SharedIndex::persist)) are
/// serialised; a rebuild embeds everything before swapping the pointer, so
/// in-flight queries finish against the index they started with.
#[derive(Debug)]
pub struct SharedIndex {
    current: RwLock<Arc<VectorIndex>>,
    writer: Mutex<()>,
}

impl SharedIndex {
    /// Wrap an index.
    pub fn new(index: VectorIndex) -> Self {
        Self { current: RwLock::new(Arc::new(index)), writer: Mutex::new(()) }
    }

    /// The index as of now.
    pub fn snapshot(&self) -> Arc<VectorIndex> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Swap in a new index, returning the previous one.
    pub async fn replace(&self, index: VectorIndex) -> Arc<VectorIndex> {
        let _writer = self.writer.lock().await;
        self.swap(Arc::new(index))
    }

    fn swap(&self, index: Arc<VectorIndex>) -> Arc<VectorIndex> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, index)
    }

    /// Build a new index from `chunks` and swap it in.
    ///
    /// On failure the current index is left untouched. See
    /// [`VectorIndex::build`] for how `embed_timeout` applies.
    pub async fn rebuild(
        &self,
        chunks: Vec<Chunk>,
        embedder: &dyn EmbeddingProvider,
        metric: Metric,
        embed_timeout: Duration,
    ) -> Result<()> {
        let _writer = self.writer.lock().await;
        let index = VectorIndex::build(chunks, embedder, metric, embed_timeout).await?;
        self.swap(Arc::new(index));
        info!("swapped in rebuilt vector index");
        Ok(())
    }

    /// Persist the current index to `path`.
    pub async fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let _writer = self.writer.lock().await;
        let snapshot = self.snapshot();
        let path = path.as_ref().to_path_buf();
        tokio::task::spawn_blocking(move || snapshot.persist(path))
            .await
            .map_err(std::io::Error::other)?
    }
}

/// Serde adapter storing `Vec<f32>` as base64 little-endian bytes, which keeps
/// persisted vectors bit-exact.
mod vector_encoding {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(vector: &[f32], serializer: S) -> Result<S::Ok, S::Error> {
        let bytes: Vec<u8> = vector.iter().flat_map(|x| x.to_le_bytes()).collect();
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f32>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = STANDARD.decode(encoded).map_err(de::Error::custom)?;
        if bytes.len() % 4 != 0 {
            return Err(de::Error::custom("vector byte length is not a multiple of 4"));
        }
        Ok(bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::HashingEmbeddingProvider;

    fn chunk(id: &str, text: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            document_id: id.to_string(),
            text: text.to_string(),
            start: 0,
            metadata: Default::default(),
        }
    }

    fn fixed_index(vectors: Vec<Vec<f32>>, metric: Metric) -> VectorIndex {
        let dimensions = vectors[0].len();
        let entries = vectors
            .into_iter()
            .enumerate()
            .map(|(i, vector)| IndexEntry { chunk: chunk(&format!("c{i}"), "x"), vector })
            .collect();
        VectorIndex {
            embedder: EmbedderInfo { model_id: "fixed".into(), dimensions },
            metric,
            entries,
        }
    }

    #[test]
    fn ties_keep_insertion_order() {
        let index = fixed_index(vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0]], Metric::Cosine);
        let results = index.query(&[1.0, 0.0], 3).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.chunk.id.as_str()).collect();
        assert_eq!(ids, ["c0", "c2", "c1"]);
    }

    #[test]
    fn returns_fewer_only_when_index_is_small() {
        let index = fixed_index(vec![vec![1.0, 0.0], vec![0.0, 1.0]], Metric::Cosine);
        assert_eq!(index.query(&[1.0, 1.0], 5).unwrap().len(), 2);
        assert_eq!(index.query(&[1.0, 1.0], 1).unwrap().len(), 1);
    }

    #[test]
    fn euclidean_scores_closer_vectors_higher() {
        let index = fixed_index(vec![vec![5.0, 5.0], vec![1.0, 1.0]], Metric::Euclidean);
        let results = index.query(&[1.0, 1.5], 2).unwrap();
        assert_eq!(results[0].chunk.id, "c1");
        assert!(results[0].score > results[1].score);
        assert!(results[0].score <= 0.0);
    }

    #[test]
    fn query_rejects_wrong_dimension() {
        let index = fixed_index(vec![vec![1.0, 0.0]], Metric::Cosine);
        assert!(matches!(
            index.query(&[1.0, 0.0, 0.0], 1),
            Err(RagError::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn check_embedder_distinguishes_dimension_and_model() {
        let index = fixed_index(vec![vec![0.0; 8]], Metric::Cosine);
        let other_dims = HashingEmbeddingProvider::new(16).unwrap();
        let same_dims = HashingEmbeddingProvider::new(8).unwrap();
        assert!(matches!(
            index.check_embedder(&other_dims),
            Err(RagError::DimensionMismatch { expected: 8, actual: 16 })
        ));
        assert!(matches!(index.check_embedder(&same_dims), Err(RagError::EmbedderMismatch { .. })));
    }

    #[test]
    fn temp_path_is_a_sibling() {
        assert_eq!(temp_path(Path::new("/data/index.json")), PathBuf::from("/data/index.json.tmp"));
    }
}

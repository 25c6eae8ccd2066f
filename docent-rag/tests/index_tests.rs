//! Index build, query ordering, persistence and rebuild tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use docent_rag::{
    Chunk, Document, EmbeddingProvider, HashingEmbeddingProvider, IndexPipeline, Metric,
    RagConfig, RagError, SharedIndex, VectorIndex,
};
use proptest::prelude::*;

const EMBED_TIMEOUT: Duration = Duration::from_secs(30);

/// Embedder that fails (or returns the wrong dimension) after `ok_calls` calls.
struct FlakyEmbedder {
    inner: HashingEmbeddingProvider,
    ok_calls: usize,
    calls: AtomicUsize,
    wrong_dimension: bool,
}

impl FlakyEmbedder {
    fn new(ok_calls: usize, wrong_dimension: bool) -> Self {
        Self {
            inner: HashingEmbeddingProvider::new(32).unwrap(),
            ok_calls,
            calls: AtomicUsize::new(0),
            wrong_dimension,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FlakyEmbedder {
    async fn embed(&self, text: &str) -> docent_rag::Result<Vec<f32>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.ok_calls {
            return self.inner.embed(text).await;
        }
        if self.wrong_dimension {
            Ok(vec![0.5; 7])
        } else {
            Err(RagError::EmbeddingError { provider: "flaky".into(), message: "boom".into() })
        }
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

fn corpus() -> Vec<Document> {
    [
        "The sky is blue.",
        "Water boils at 100 degrees Celsius.",
        "Impairment of financial assets follows the expected credit loss model.",
        "Hedge accounting aligns accounting with risk management.",
    ]
    .into_iter()
    .enumerate()
    .map(|(i, text)| Document::new(format!("doc{i}"), text))
    .collect()
}

#[test]
fn pipeline_validates_hand_built_config() {
    let config = RagConfig { chunk_size: 10, chunk_overlap: 10, ..RagConfig::default() };
    let result = IndexPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(HashingEmbeddingProvider::new(32).unwrap()))
        .build();
    assert!(matches!(result, Err(RagError::ConfigError(_))));
}

fn chunks_of(documents: &[Document]) -> Vec<Chunk> {
    let pipeline = IndexPipeline::builder()
        .config(RagConfig::builder().chunk_size(200).chunk_overlap(0).build().unwrap())
        .embedding_provider(Arc::new(HashingEmbeddingProvider::new(32).unwrap()))
        .build()
        .unwrap();
    pipeline.chunk_documents(documents)
}

#[tokio::test]
async fn build_aborts_when_embedder_fails_midway() {
    let embedder = FlakyEmbedder::new(2, false);
    let result = VectorIndex::build(chunks_of(&corpus()), &embedder, Metric::Cosine, EMBED_TIMEOUT).await;
    assert!(matches!(result, Err(RagError::EmbeddingError { .. })));
}

#[tokio::test]
async fn build_aborts_on_unexpected_dimension() {
    let embedder = FlakyEmbedder::new(1, true);
    let err = VectorIndex::build(chunks_of(&corpus()), &embedder, Metric::Cosine, EMBED_TIMEOUT)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("dimensions"), "unexpected error: {err}");
}

/// Embedder whose calls never return.
struct StalledEmbedder;

#[async_trait]
impl EmbeddingProvider for StalledEmbedder {
    async fn embed(&self, _text: &str) -> docent_rag::Result<Vec<f32>> {
        std::future::pending().await
    }

    fn dimensions(&self) -> usize {
        32
    }

    fn model_id(&self) -> &str {
        "stalled"
    }
}

#[tokio::test(start_paused = true)]
async fn build_times_out_on_stalled_embedder() {
    let started = tokio::time::Instant::now();
    let err = VectorIndex::build(chunks_of(&corpus()), &StalledEmbedder, Metric::Cosine, EMBED_TIMEOUT)
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::EmbeddingError { ref message, .. } if message.contains("timed out")));
    assert!(started.elapsed() >= EMBED_TIMEOUT);
}

#[tokio::test(start_paused = true)]
async fn stalled_rebuild_keeps_current_index() {
    let embedder = HashingEmbeddingProvider::new(32).unwrap();
    let shared = SharedIndex::new(
        VectorIndex::build(chunks_of(&corpus()), &embedder, Metric::Cosine, EMBED_TIMEOUT).await.unwrap(),
    );
    let before = shared.snapshot();

    let result = shared.rebuild(chunks_of(&corpus()), &StalledEmbedder, Metric::Cosine, EMBED_TIMEOUT).await;
    assert!(matches!(result, Err(RagError::EmbeddingError { .. })));
    assert!(Arc::ptr_eq(&before, &shared.snapshot()));
}

#[tokio::test]
async fn persist_then_load_answers_queries_identically() {
    let embedder = HashingEmbeddingProvider::new(32).unwrap();
    let index = VectorIndex::build(chunks_of(&corpus()), &embedder, Metric::Cosine, EMBED_TIMEOUT).await.unwrap();

    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("corpus.index.json");
    index.persist(&path).unwrap();
    let loaded = VectorIndex::load_for(&path, &embedder).unwrap();

    assert_eq!(loaded, index);
    for question in ["What color is the sky?", "credit loss", "boiling water"] {
        let query = embedder.embed(question).await.unwrap();
        assert_eq!(loaded.query(&query, 3).unwrap(), index.query(&query, 3).unwrap());
    }
    assert!(!temp.path().join("corpus.index.json.tmp").exists());
}

#[tokio::test]
async fn loading_with_another_dimension_fails() {
    let built_with = HashingEmbeddingProvider::new(32).unwrap();
    let index =
        VectorIndex::build(chunks_of(&corpus()), &built_with, Metric::Cosine, EMBED_TIMEOUT).await.unwrap();

    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("index.json");
    index.persist(&path).unwrap();

    let other = HashingEmbeddingProvider::new(64).unwrap();
    assert!(matches!(
        VectorIndex::load_for(&path, &other),
        Err(RagError::DimensionMismatch { expected: 32, actual: 64 })
    ));
}

#[test]
fn missing_or_corrupt_index_is_unavailable() {
    let temp = tempfile::tempdir().unwrap();
    let missing = temp.path().join("missing.json");
    assert!(matches!(VectorIndex::load(&missing), Err(RagError::IndexUnavailable { .. })));

    let corrupt = temp.path().join("corrupt.json");
    std::fs::write(&corrupt, b"{ not json").unwrap();
    assert!(matches!(VectorIndex::load(&corrupt), Err(RagError::IndexUnavailable { .. })));

    let foreign = temp.path().join("foreign.json");
    std::fs::write(
        &foreign,
        br#"{"format":"faiss","version":1,"index":{"embedder":{"model_id":"m","dimensions":2},"metric":"cosine","entries":[]}}"#,
    )
    .unwrap();
    let err = VectorIndex::load(&foreign).unwrap_err();
    assert!(err.to_string().contains("unknown index format"), "unexpected error: {err}");
}

#[test]
fn stored_vectors_must_match_recorded_dimension() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("skewed.json");
    // One vector of 3 floats (12 bytes) in an index recorded as 2-dimensional.
    std::fs::write(
        &path,
        br#"{"format":"docent-index","version":1,"index":{"embedder":{"model_id":"m","dimensions":2},"metric":"cosine","entries":[{"chunk":{"id":"a_0","document_id":"a","text":"a","start":0},"vector":"AACAPwAAgD8AAIA/"}]}}"#,
    )
    .unwrap();
    assert!(matches!(
        VectorIndex::load(&path),
        Err(RagError::DimensionMismatch { expected: 2, actual: 3 })
    ));
}

#[tokio::test]
async fn failed_rebuild_keeps_current_index() {
    let embedder = HashingEmbeddingProvider::new(32).unwrap();
    let index = VectorIndex::build(chunks_of(&corpus()), &embedder, Metric::Cosine, EMBED_TIMEOUT).await.unwrap();
    let shared = SharedIndex::new(index);
    let before = shared.snapshot();

    let flaky = FlakyEmbedder::new(0, false);
    assert!(shared.rebuild(chunks_of(&corpus()), &flaky, Metric::Cosine, EMBED_TIMEOUT).await.is_err());
    assert!(Arc::ptr_eq(&before, &shared.snapshot()));

    shared.rebuild(chunks_of(&corpus()[..1]), &embedder, Metric::Cosine, EMBED_TIMEOUT).await.unwrap();
    assert_eq!(shared.snapshot().len(), 1);
    // The old snapshot is still intact for readers holding it.
    assert_eq!(before.len(), 4);
}

#[tokio::test]
async fn shared_index_persists_current_snapshot() {
    let embedder = HashingEmbeddingProvider::new(32).unwrap();
    let index = VectorIndex::build(chunks_of(&corpus()), &embedder, Metric::Euclidean, EMBED_TIMEOUT).await.unwrap();
    let shared = SharedIndex::new(index.clone());

    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("shared.json");
    shared.persist(&path).await.unwrap();
    assert_eq!(VectorIndex::load(&path).unwrap(), index);
}

/// Generate a non-zero embedding of the given dimension.
fn arb_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim)
        .prop_filter("non-zero embedding", |v| v.iter().any(|x| x.abs() > 1e-4))
}

/// **Property: query ordering**
/// *For any* set of stored vectors and query, results are sorted by
/// non-increasing score and contain min(k, len) entries.
mod prop_query_ordering {
    use super::*;
    use docent_rag::{EmbedderInfo, IndexEntry};

    const DIM: usize = 12;

    fn index_from(vectors: Vec<Vec<f32>>, metric: Metric) -> VectorIndex {
        let entries: Vec<IndexEntry> = vectors
            .into_iter()
            .enumerate()
            .map(|(i, vector)| IndexEntry {
                chunk: Chunk {
                    id: format!("c{i}"),
                    document_id: "d".into(),
                    text: format!("chunk {i}"),
                    start: 0,
                    metadata: Default::default(),
                },
                vector,
            })
            .collect();
        let json = serde_json::json!({
            "format": "docent-index",
            "version": 1,
            "index": {
                "embedder": EmbedderInfo { model_id: "prop".into(), dimensions: DIM },
                "metric": metric,
                "entries": entries,
            }
        });
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), serde_json::to_vec(&json).unwrap()).unwrap();
        VectorIndex::load(temp.path()).unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_sorted_and_sized(
            vectors in proptest::collection::vec(arb_embedding(DIM), 1..20),
            query in arb_embedding(DIM),
            k in 1usize..25,
            euclidean in any::<bool>(),
        ) {
            let metric = if euclidean { Metric::Euclidean } else { Metric::Cosine };
            let count = vectors.len();
            let index = index_from(vectors, metric);
            let results = index.query(&query, k).unwrap();

            prop_assert_eq!(results.len(), k.min(count));
            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
            }
        }
    }
}

//! Retriever behaviour over a built corpus.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docent_rag::{
    Document, EmbeddingProvider, HashingEmbeddingProvider, IndexPipeline, RagConfig, RagError,
    Retriever, SharedIndex,
};

fn sky_pipeline(top_k: usize) -> IndexPipeline {
    IndexPipeline::builder()
        .config(RagConfig::builder().chunk_size(50).chunk_overlap(0).top_k(top_k).build().unwrap())
        .embedding_provider(Arc::new(HashingEmbeddingProvider::new(256).unwrap()))
        .build()
        .unwrap()
}

fn sky_corpus() -> Vec<Document> {
    vec![
        Document::new("sky", "The sky is blue."),
        Document::new("water", "Water boils at 100 degrees Celsius."),
    ]
}

#[tokio::test]
async fn sky_question_retrieves_sky_sentence() {
    let pipeline = sky_pipeline(1);
    let index = pipeline.build_index(&sky_corpus()).await.unwrap();
    assert_eq!(index.len(), 2);
    assert_eq!(index.entries()[0].chunk.text, "The sky is blue.");
    assert_eq!(index.entries()[1].chunk.text, "Water boils at 100 degrees Celsius.");

    let retriever = pipeline.retriever(index).unwrap();
    let results = retriever.retrieve("What color is the sky?", 1).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk.text, "The sky is blue.");
}

#[tokio::test]
async fn results_are_sorted_by_score() {
    let pipeline = sky_pipeline(4);
    let index = pipeline.build_index(&sky_corpus()).await.unwrap();
    let retriever = pipeline.retriever(index).unwrap();

    let results = retriever.retrieve_default("water sky boils").await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].score >= results[1].score);
}

#[tokio::test]
async fn blank_documents_are_not_indexed() {
    let pipeline = sky_pipeline(4);
    let mut corpus = sky_corpus();
    corpus.push(Document::new("blank", "   \n "));
    let index = pipeline.build_index(&corpus).await.unwrap();
    assert_eq!(index.len(), 2);
}

#[tokio::test]
async fn retriever_rejects_mismatched_embedder() {
    let pipeline = sky_pipeline(1);
    let index = pipeline.build_index(&sky_corpus()).await.unwrap();

    let other: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbeddingProvider::new(128).unwrap());
    let err = Retriever::from_index(index, other, pipeline.config()).unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { expected: 256, actual: 128 }));
}

#[tokio::test]
async fn retriever_notices_rebuild_with_another_embedder() {
    let pipeline = sky_pipeline(1);
    let index = pipeline.build_index(&sky_corpus()).await.unwrap();
    let shared = Arc::new(SharedIndex::new(index));
    let retriever =
        Retriever::new(shared.clone(), pipeline.embedding_provider().clone(), pipeline.config())
            .unwrap();

    let other = HashingEmbeddingProvider::new(64).unwrap();
    let chunks = pipeline.chunk_documents(&sky_corpus());
    shared.rebuild(chunks, &other, pipeline.config().metric, pipeline.config().embed_timeout).await.unwrap();

    assert!(matches!(
        retriever.retrieve("sky", 1).await,
        Err(RagError::DimensionMismatch { .. })
    ));
}

#[tokio::test]
async fn zero_k_is_rejected() {
    let pipeline = sky_pipeline(1);
    let retriever = pipeline.retriever(pipeline.build_index(&sky_corpus()).await.unwrap()).unwrap();
    assert!(matches!(retriever.retrieve("sky", 0).await, Err(RagError::ConfigError(_))));
}

#[tokio::test]
async fn similarity_threshold_filters_weak_matches() {
    let config = RagConfig::builder()
        .chunk_size(50)
        .chunk_overlap(0)
        .top_k(2)
        .similarity_threshold(0.3)
        .build()
        .unwrap();
    let pipeline = IndexPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(HashingEmbeddingProvider::new(256).unwrap()))
        .build()
        .unwrap();
    let retriever = pipeline.retriever(pipeline.build_index(&sky_corpus()).await.unwrap()).unwrap();

    let results = retriever.retrieve_default("sky blue").await.unwrap();
    assert!(results.iter().all(|r| r.score >= 0.3));
    assert_eq!(results[0].chunk.document_id, "sky");
}

/// Embedder whose query calls never finish in time.
struct SlowEmbedder(HashingEmbeddingProvider);

#[async_trait]
impl EmbeddingProvider for SlowEmbedder {
    async fn embed(&self, text: &str) -> docent_rag::Result<Vec<f32>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        self.0.embed(text).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> docent_rag::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.0.embed_sync(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.0.dimensions()
    }

    fn model_id(&self) -> &str {
        self.0.model_id()
    }
}

#[tokio::test(start_paused = true)]
async fn query_embedding_times_out() {
    let config = RagConfig::builder()
        .chunk_size(50)
        .chunk_overlap(0)
        .embed_timeout(Duration::from_secs(2))
        .build()
        .unwrap();
    let pipeline = IndexPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(SlowEmbedder(HashingEmbeddingProvider::new(16).unwrap())))
        .build()
        .unwrap();
    let retriever = pipeline.retriever(pipeline.build_index(&sky_corpus()).await.unwrap()).unwrap();

    let err = retriever.retrieve("sky", 1).await.unwrap_err();
    assert!(matches!(err, RagError::EmbeddingError { ref message, .. } if message.contains("timed out")));
}

//! End-to-end ranking through the search engine.

#[cfg(test)]
mod tests {
    use crate::config::RetrievalConfig;
    use crate::embeddings::providers::TrigramProvider;
    use crate::embeddings::EmbeddingProvider;
    use crate::rag::{SearchEngine, SearchStrategy};
    use crate::tests::support::*;
    use crate::types::{Chunk, ChunkMetadata};
    use crate::vector_index::{EmbeddingIndex, MemoryIndex};
    use std::sync::Arc;
    use std::time::Duration;

    const DIMS: usize = 128;

    async fn indexed_engine(config: RetrievalConfig) -> SearchEngine {
        let embedder = Arc::new(TrigramProvider::new(DIMS));
        let index = Arc::new(MemoryIndex::new(DIMS));

        let docs = [
            ("refund", "Refunds are issued within 30 days of purchase under the refund policy"),
            ("shipping", "Shipping takes five business days for domestic orders"),
            ("warranty", "The warranty covers manufacturing defects for two years"),
            ("password", "To reset a password open settings and choose security"),
        ];
        for (id, text) in docs {
            let embedding = embedder.embed(text).await.unwrap();
            index
                .upsert(Chunk::new(id, text, ChunkMetadata::new("handbook.pdf")), embedding)
                .await
                .unwrap();
        }

        SearchEngine::new(embedder, index, config, Duration::from_secs(5)).unwrap()
    }

    fn pinned(strategy: SearchStrategy) -> RetrievalConfig {
        RetrievalConfig {
            strategy: Some(strategy),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_relevant_passage_ranks_first_under_every_strategy() {
        for strategy in [
            SearchStrategy::Averaging,
            SearchStrategy::ReciprocalRank,
            SearchStrategy::Hybrid,
        ] {
            let engine = indexed_engine(pinned(strategy)).await;
            let results = engine
                .select_and_run("what is the refund policy", 3)
                .await
                .unwrap();

            assert_eq!(results.len(), 3, "{:?}", strategy);
            assert_eq!(results[0].chunk.id, "refund", "{:?}", strategy);
        }
    }

    #[tokio::test]
    async fn test_hybrid_scores_stay_in_unit_range() {
        let engine = indexed_engine(pinned(SearchStrategy::Averaging)).await;
        let results = engine.select_and_run("reset password", 4).await.unwrap();

        assert_eq!(results[0].chunk.id, "password");
        for candidate in &results {
            assert!((0.0..=1.0).contains(&candidate.hybrid_score));
            assert_eq!(candidate.hybrid_score, candidate.combined_score);
        }
        for pair in results.windows(2) {
            assert!(pair[0].combined_score >= pair[1].combined_score);
        }
    }

    #[tokio::test]
    async fn test_rrf_scores_are_rank_based() {
        let engine = indexed_engine(pinned(SearchStrategy::ReciprocalRank)).await;
        let results = engine
            .select_and_run("what is the warranty coverage", 4)
            .await
            .unwrap();

        // Three variants, each ranking the top passage first
        let top = &results[0];
        assert_eq!(top.chunk.id, "warranty");
        assert!((top.combined_score - 3.0 / 61.0).abs() < 1e-6);
        assert!(top.hybrid_score >= 0.7);
        for candidate in &results[1..] {
            assert!(candidate.combined_score < top.combined_score);
        }
    }

    #[tokio::test]
    async fn test_equal_distances_fall_back_to_lexical_order() {
        let index = Arc::new(StaticIndex::new(&[(REFUND_TEXT, 0.5), (SHIPPING_TEXT, 0.5)]));
        let engine = SearchEngine::new(
            Arc::new(TrigramProvider::new(64)),
            index,
            pinned(SearchStrategy::Hybrid),
            Duration::from_secs(5),
        )
        .unwrap();

        let results = engine.select_and_run("shipping takes", 2).await.unwrap();

        assert_eq!(results[0].content(), SHIPPING_TEXT);
        assert!((results[0].combined_score - 1.0).abs() < 1e-6);
        assert!((results[1].combined_score - 0.7).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_single_candidate_gets_full_semantic_credit() {
        let index = Arc::new(StaticIndex::new(&[(SHIPPING_TEXT, 0.95)]));
        let engine = SearchEngine::new(
            Arc::new(TrigramProvider::new(64)),
            index,
            pinned(SearchStrategy::Hybrid),
            Duration::from_secs(5),
        )
        .unwrap();

        let results = engine.select_and_run("unrelated words", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!((results[0].hybrid_score - 0.7).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_empty_index_ranks_nothing() {
        let embedder = Arc::new(TrigramProvider::new(DIMS));
        let index = Arc::new(MemoryIndex::new(DIMS));
        assert!(index.is_empty().await.unwrap());

        let engine = SearchEngine::new(
            embedder,
            index,
            RetrievalConfig::default(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(engine
            .select_and_run("what is the refund policy", 5)
            .await
            .unwrap()
            .is_empty());
    }
}

//! Vector index abstraction for knowledge chunks.
//!
//! Defines a trait for provider-agnostic vector storage and retrieval, plus
//! an in-memory implementation backed by cosine distance.

use crate::types::Chunk;
use async_trait::async_trait;
use mira_core::{AppError, AppResult};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Trait for vector index backends.
///
/// `search` returns `(chunk, distance)` pairs ordered by ascending distance.
/// Distances must be finite and lower means closer.
#[async_trait]
pub trait EmbeddingIndex: Send + Sync {
    /// Search for the `top_k` nearest chunks to the query embedding.
    async fn search(&self, query_embedding: &[f32], top_k: usize)
        -> AppResult<Vec<(Arc<Chunk>, f32)>>;

    /// Insert a chunk, replacing any chunk with the same id.
    async fn upsert(&self, chunk: Chunk, embedding: Vec<f32>) -> AppResult<()>;

    /// Number of indexed chunks.
    async fn len(&self) -> AppResult<usize>;

    async fn is_empty(&self) -> AppResult<bool> {
        Ok(self.len().await? == 0)
    }
}

struct IndexEntry {
    chunk: Arc<Chunk>,
    embedding: Vec<f32>,
}

/// In-memory index using cosine distance (`1 - cosine similarity`).
///
/// Ties keep insertion order.
pub struct MemoryIndex {
    dimensions: usize,
    entries: RwLock<Vec<IndexEntry>>,
}

impl MemoryIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn check_dimensions(&self, len: usize, what: &str) -> AppResult<()> {
        if len != self.dimensions {
            return Err(AppError::Knowledge(format!(
                "{} has {} dimensions, index expects {}",
                what, len, self.dimensions
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingIndex for MemoryIndex {
    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> AppResult<Vec<(Arc<Chunk>, f32)>> {
        self.check_dimensions(query_embedding.len(), "Query embedding")?;

        let entries = self.entries.read().await;
        let mut scored: Vec<(Arc<Chunk>, f32)> = entries
            .iter()
            .map(|entry| {
                let distance = cosine_distance(query_embedding, &entry.embedding);
                (Arc::clone(&entry.chunk), distance)
            })
            .collect();

        // Stable sort keeps insertion order on ties
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(top_k);

        tracing::trace!("Memory index returned {} of {} chunks", scored.len(), entries.len());
        Ok(scored)
    }

    async fn upsert(&self, chunk: Chunk, embedding: Vec<f32>) -> AppResult<()> {
        self.check_dimensions(embedding.len(), &format!("Embedding for chunk '{}'", chunk.id))?;

        let mut entries = self.entries.write().await;
        let entry = IndexEntry {
            chunk: Arc::new(chunk),
            embedding,
        };

        match entries.iter_mut().find(|e| e.chunk.id == entry.chunk.id) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        Ok(())
    }

    async fn len(&self) -> AppResult<usize> {
        Ok(self.entries.read().await.len())
    }
}

/// Cosine distance in `[0, 2]`; a zero vector is at distance 1 from everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    let similarity = (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0);
    1.0 - similarity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkMetadata;

    fn chunk(id: &str, content: &str) -> Chunk {
        Chunk::new(id, content, ChunkMetadata::new("test.md"))
    }

    #[test]
    fn test_cosine_distance() {
        assert!((cosine_distance(&[1.0, 0.0], &[1.0, 0.0])).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[tokio::test]
    async fn test_search_orders_by_distance() {
        let index = MemoryIndex::new(2);
        index.upsert(chunk("far", "far"), vec![0.0, 1.0]).await.unwrap();
        index.upsert(chunk("near", "near"), vec![1.0, 0.1]).await.unwrap();

        let results = index.search(&[1.0, 0.0], 5).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.id, "near");
        assert!(results[0].1 < results[1].1);
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let index = MemoryIndex::new(2);
        for id in ["a", "b", "c"] {
            index.upsert(chunk(id, id), vec![1.0, 1.0]).await.unwrap();
        }

        let ids: Vec<String> = index
            .search(&[1.0, 1.0], 2)
            .await
            .unwrap()
            .into_iter()
            .map(|(c, _)| c.id.clone())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_id() {
        let index = MemoryIndex::new(2);
        index.upsert(chunk("a", "old"), vec![1.0, 0.0]).await.unwrap();
        index.upsert(chunk("a", "new"), vec![0.0, 1.0]).await.unwrap();

        assert_eq!(index.len().await.unwrap(), 1);
        let results = index.search(&[0.0, 1.0], 1).await.unwrap();
        assert_eq!(results[0].0.content, "new");
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let index = MemoryIndex::new(3);
        assert!(index.upsert(chunk("a", "a"), vec![1.0]).await.is_err());
        assert!(index.search(&[1.0, 0.0], 1).await.is_err());
        assert!(index.is_empty().await.unwrap());
    }
}

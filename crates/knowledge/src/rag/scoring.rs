//! Hybrid semantic and lexical scoring.

use mira_core::{AppError, AppResult};
use std::collections::HashSet;

/// Bonus added when the whole query appears verbatim in the candidate.
pub const PHRASE_BONUS: f32 = 0.3;

/// Weighted blend of semantic similarity and lexical overlap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridScorer {
    semantic_weight: f32,
    keyword_weight: f32,
}

impl Default for HybridScorer {
    fn default() -> Self {
        Self {
            semantic_weight: 0.7,
            keyword_weight: 0.3,
        }
    }
}

impl HybridScorer {
    pub fn new(semantic_weight: f32, keyword_weight: f32) -> AppResult<Self> {
        for weight in [semantic_weight, keyword_weight] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(AppError::Config(format!(
                    "Scoring weights must be non-negative numbers, got {}",
                    weight
                )));
            }
        }
        Ok(Self {
            semantic_weight,
            keyword_weight,
        })
    }

    /// `semantic_weight * semantic + keyword_weight * lexical(query, text)`.
    pub fn score(&self, query: &str, text: &str, semantic_similarity: f32) -> f32 {
        self.semantic_weight * semantic_similarity + self.keyword_weight * lexical_score(query, text)
    }
}

/// Fraction of distinct query terms present in `text`, with a phrase bonus.
///
/// Terms are whitespace-separated and lowercased, punctuation included.
/// The result is in `[0, 1]`; an empty query scores 0.
///
/// The phrase bonus applies even when no whole term matches, so a query
/// glued to punctuation in the text ("policy" against "policy:") still
/// scores the bonus rather than 0.
pub fn lexical_score(query: &str, text: &str) -> f32 {
    let query_lower = query.to_lowercase();
    let query_terms: HashSet<&str> = query_lower.split_whitespace().collect();
    if query_terms.is_empty() {
        return 0.0;
    }

    let text_lower = text.to_lowercase();
    let text_terms: HashSet<&str> = text_lower.split_whitespace().collect();

    let matches = query_terms.intersection(&text_terms).count();
    let mut score = matches as f32 / query_terms.len() as f32;

    if text_lower.contains(query_lower.as_str()) {
        score = (score + PHRASE_BONUS).min(1.0);
    }
    score
}

/// Map raw distances to similarities in `[0, 1]` by min-max normalisation.
///
/// The closest candidate gets 1 and the farthest 0. When all distances are
/// equal every similarity is 1.
pub fn normalize_distances(distances: &[f32]) -> Vec<f32> {
    let Some(min) = distances.iter().copied().reduce(f32::min) else {
        return Vec::new();
    };
    let max = distances.iter().copied().fold(min, f32::max);

    let range = if max - min > 0.0 { max - min } else { 1.0 };
    distances.iter().map(|d| 1.0 - (d - min) / range).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_match_with_phrase_bonus() {
        let score = lexical_score("refund policy", "Our refund policy is simple");
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_partial_match() {
        let score = lexical_score("refund shipping", "Refund requests take a week");
        assert!((score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_phrase_bonus_without_term_match() {
        // "refund" is a substring of "refunds" but not a term match
        let score = lexical_score("refund", "Refunds are issued");
        assert!((score - PHRASE_BONUS).abs() < 1e-6);
    }

    #[test]
    fn test_punctuation_stays_attached() {
        let score = lexical_score("policy?", "the policy is");
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_empty_query() {
        assert_eq!(lexical_score("   ", "anything"), 0.0);
    }

    #[test]
    fn test_repeated_query_terms_count_once() {
        let score = lexical_score("rust rust go", "rust is fast");
        assert!((score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_distances() {
        let sims = normalize_distances(&[0.1, 0.4]);
        assert!((sims[0] - 1.0).abs() < 1e-6);
        assert!(sims[1].abs() < 1e-6);

        let sims = normalize_distances(&[0.2, 0.3, 0.4]);
        assert!((sims[1] - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_normalize_equal_distances() {
        assert_eq!(normalize_distances(&[0.5, 0.5, 0.5]), vec![1.0, 1.0, 1.0]);
        assert_eq!(normalize_distances(&[0.7]), vec![1.0]);
        assert!(normalize_distances(&[]).is_empty());
    }

    #[test]
    fn test_hybrid_weights() {
        let scorer = HybridScorer::default();
        let score = scorer.score("refund policy", "Our refund policy", 0.5);
        assert!((score - (0.7 * 0.5 + 0.3 * 1.0)).abs() < 1e-6);

        assert!(HybridScorer::new(-0.1, 0.3).is_err());
        assert!(HybridScorer::new(f32::NAN, 0.3).is_err());
    }
}

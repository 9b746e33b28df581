//! Rank fusion across query variants.
//!
//! Each variant produces its own ranked list; fusion merges them into one
//! list keyed by chunk content, so the same text retrieved under different
//! ids is counted once.

use crate::types::ScoredCandidate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_RRF_K: f32 = 60.0;

/// How per-variant lists are merged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FusionStrategy {
    /// Mean hybrid score over the lists a candidate appears in
    Averaging,
    /// Sum of `1 / (k + rank)` with 1-based ranks
    ReciprocalRank { k: f32 },
}

impl Default for FusionStrategy {
    fn default() -> Self {
        Self::ReciprocalRank { k: DEFAULT_RRF_K }
    }
}

impl FusionStrategy {
    pub fn fuse(&self, lists: &[Vec<ScoredCandidate>], limit: usize) -> Vec<ScoredCandidate> {
        match self {
            Self::Averaging => average_fusion(lists, limit),
            Self::ReciprocalRank { k } => reciprocal_rank_fusion(lists, *k, limit),
        }
    }
}

struct Accumulator {
    candidate: ScoredCandidate,
    first_seen: usize,
    best_rank: usize,
    hybrid_sum: f32,
    rrf_sum: f32,
    appearances: u32,
}

/// Group candidates by content in first-seen order.
fn accumulate(lists: &[Vec<ScoredCandidate>], k: f32) -> Vec<Accumulator> {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut merged: Vec<Accumulator> = Vec::new();

    for list in lists {
        for (position, candidate) in list.iter().enumerate() {
            let rank = position + 1;
            let contribution = 1.0 / (k + rank as f32);

            match slots.get(candidate.content()) {
                Some(&slot) => {
                    let acc = &mut merged[slot];
                    acc.hybrid_sum += candidate.combined_score;
                    acc.rrf_sum += contribution;
                    acc.appearances += 1;
                    acc.best_rank = acc.best_rank.min(rank);
                    acc.candidate.semantic_distance = acc
                        .candidate
                        .semantic_distance
                        .min(candidate.semantic_distance);
                }
                None => {
                    slots.insert(candidate.content(), merged.len());
                    merged.push(Accumulator {
                        candidate: candidate.clone(),
                        first_seen: merged.len(),
                        best_rank: rank,
                        hybrid_sum: candidate.combined_score,
                        rrf_sum: contribution,
                        appearances: 1,
                    });
                }
            }
        }
    }

    merged
}

/// Merge lists by averaging each candidate's hybrid scores.
///
/// Equal averages keep first-seen order.
pub fn average_fusion(lists: &[Vec<ScoredCandidate>], limit: usize) -> Vec<ScoredCandidate> {
    let mut fused: Vec<ScoredCandidate> = accumulate(lists, DEFAULT_RRF_K)
        .into_iter()
        .map(|acc| {
            let mean = acc.hybrid_sum / acc.appearances as f32;
            let mut candidate = acc.candidate;
            candidate.combined_score = mean;
            candidate.hybrid_score = mean;
            candidate
        })
        .collect();

    fused.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));
    fused.truncate(limit);
    fused
}

/// Merge lists with reciprocal rank fusion.
///
/// Ties are broken by best rank in any list, then first-seen order.
pub fn reciprocal_rank_fusion(
    lists: &[Vec<ScoredCandidate>],
    k: f32,
    limit: usize,
) -> Vec<ScoredCandidate> {
    let mut merged = accumulate(lists, k);

    merged.sort_by(|a, b| {
        b.rrf_sum
            .total_cmp(&a.rrf_sum)
            .then(a.best_rank.cmp(&b.best_rank))
            .then(a.first_seen.cmp(&b.first_seen))
    });

    merged
        .into_iter()
        .take(limit)
        .map(|acc| {
            let mut candidate = acc.candidate;
            candidate.combined_score = acc.rrf_sum;
            candidate.hybrid_score = acc.hybrid_sum / acc.appearances as f32;
            candidate
        })
        .collect()
}

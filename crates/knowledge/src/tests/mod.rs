//! Engine-level tests over in-crate test doubles.

mod rag_ranking;
mod support;

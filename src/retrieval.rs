use crate::chunking::TextChunk;
use crate::embeddings::Embedding;
use crate::error::{RagError, Result};
use crate::vector_store::{cosine_similarity, VectorStore};
use serde::Serialize;

/// A chunk together with its similarity to the query
#[derive(Debug, Clone, Serialize)]
pub struct RankedChunk<'a> {
    pub chunk: &'a TextChunk,
    pub score: f32,
}

/// Return up to `top_k` chunks of `store` ordered by descending cosine
/// similarity to `query`.
///
/// Scans every chunk. Equal scores keep chunk order, so the result is
/// deterministic. `top_k` larger than the store returns every chunk.
pub fn retrieve<'a>(
    query: &Embedding,
    store: &'a VectorStore,
    top_k: usize,
) -> Result<Vec<RankedChunk<'a>>> {
    let Some(dimension) = store.dimension() else {
        return Ok(Vec::new());
    };
    if query.dimension() != dimension {
        return Err(RagError::DimensionMismatch {
            expected: dimension,
            actual: query.dimension(),
        });
    }

    let mut ranked: Vec<RankedChunk<'a>> = store
        .entries()
        .map(|(chunk, vector)| RankedChunk {
            chunk,
            score: cosine_similarity(&query.values, &vector.values),
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.chunk.index.cmp(&b.chunk.index))
    });
    ranked.truncate(top_k);

    Ok(ranked)
}

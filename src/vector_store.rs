use crate::chunking::TextChunk;
use crate::embeddings::{Embedder, Embedding};
use crate::error::{RagError, Result};
use log::debug;

/// Chunks of one document with their embeddings, index-aligned.
///
/// Read-only after construction: `vectors()[i]` always belongs to `chunks()[i]`.
#[derive(Debug, Clone, Default)]
pub struct VectorStore {
    chunks: Vec<TextChunk>,
    vectors: Vec<Embedding>,
    dimension: Option<usize>,
}

impl VectorStore {
    /// Embed every chunk in order and build the store.
    ///
    /// Fails as a whole if any embedding call fails or if the provider
    /// returns vectors of differing dimension.
    pub async fn build<E>(chunks: Vec<TextChunk>, embedder: &E) -> Result<Self>
    where
        E: Embedder + ?Sized,
    {
        let mut vectors = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let embedding = embedder.embed(&chunk.text).await?;
            vectors.push(embedding);
        }

        let store = Self::from_parts(chunks, vectors)?;
        debug!(
            "Built vector store with {} chunks of dimension {:?}",
            store.len(),
            store.dimension
        );
        Ok(store)
    }

    /// Pair already computed vectors with their chunks
    pub fn from_parts(chunks: Vec<TextChunk>, vectors: Vec<Embedding>) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(RagError::InvalidConfiguration(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }

        let dimension = vectors.first().map(Embedding::dimension);
        if let Some(expected) = dimension {
            if let Some(bad) = vectors.iter().find(|v| v.dimension() != expected) {
                return Err(RagError::DimensionMismatch {
                    expected,
                    actual: bad.dimension(),
                });
            }
        }

        Ok(VectorStore {
            chunks,
            vectors,
            dimension,
        })
    }

    pub fn chunks(&self) -> &[TextChunk] {
        &self.chunks
    }

    pub fn vectors(&self) -> &[Embedding] {
        &self.vectors
    }

    /// Dimension shared by every vector, `None` for an empty store
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunks paired with their vectors, in chunk order
    pub fn entries(&self) -> impl Iterator<Item = (&TextChunk, &Embedding)> {
        self.chunks.iter().zip(self.vectors.iter())
    }
}

/// Cosine similarity of two equal-length vectors.
///
/// A zero vector on either side gives 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    let dot_product: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot_product / (norm_a * norm_b)).clamp(-1.0, 1.0)
    }
}

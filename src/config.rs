use crate::error::{RagError, Result};
use std::time::Duration;

/// Default chunk length in characters
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap between consecutive chunks in characters
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
/// How far past the nominal chunk end to look for a word boundary
pub const DEFAULT_BOUNDARY_WINDOW: usize = 50;
/// Number of chunks passed to the answer generator
pub const DEFAULT_TOP_K: usize = 3;
/// Number of most recent chat turns forwarded with a question
pub const DEFAULT_HISTORY_WINDOW: usize = 10;
/// Latency bound for a single embedding or generation call
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Parameters for splitting text into chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub overlap: usize,
    pub boundary_window: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        ChunkerConfig {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
            boundary_window: DEFAULT_BOUNDARY_WINDOW,
        }
    }
}

impl ChunkerConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        ChunkerConfig {
            chunk_size,
            overlap,
            ..Default::default()
        }
    }

    /// Check `chunk_size > 0` and `overlap < chunk_size`
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::InvalidConfiguration(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(RagError::InvalidConfiguration(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Parameters for answering a question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub history_window: usize,
    pub upstream_timeout: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        RetrievalConfig {
            top_k: DEFAULT_TOP_K,
            history_window: DEFAULT_HISTORY_WINDOW,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }
}

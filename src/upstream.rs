use crate::answer::{AnswerGenerator, ChatTurn};
use crate::chunking::TextChunk;
use crate::embeddings::{Embedder, Embedding};
use crate::error::{RagError, Result};
use async_trait::async_trait;
use log::warn;
use std::future::Future;
use std::time::Duration;

/// Bounds the latency of every call made through the wrapped provider
#[derive(Debug, Clone)]
pub struct Deadline<T> {
    inner: T,
    limit: Duration,
}

impl<T> Deadline<T> {
    pub fn new(inner: T, limit: Duration) -> Self {
        Deadline { inner, limit }
    }
}

/// Await `call`, failing with `UpstreamTimeout` once `limit` elapses
pub async fn bounded<T, F>(operation: &'static str, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!("{} exceeded {:?}", operation, limit);
            Err(RagError::UpstreamTimeout {
                operation,
                after: limit,
            })
        }
    }
}

#[async_trait]
impl<T: Embedder> Embedder for Deadline<T> {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        bounded("embedding", self.limit, self.inner.embed(text)).await
    }
}

#[async_trait]
impl<T: AnswerGenerator> AnswerGenerator for Deadline<T> {
    async fn generate(
        &self,
        question: &str,
        context: &[TextChunk],
        history: &[ChatTurn],
    ) -> Result<String> {
        bounded(
            "answer generation",
            self.limit,
            self.inner.generate(question, context, history),
        )
        .await
    }
}

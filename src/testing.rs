//! Deterministic providers for unit tests

use crate::answer::{AnswerGenerator, ChatTurn};
use crate::chunking::TextChunk;
use crate::embeddings::{Embedder, Embedding};
use crate::error::{RagError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// 26-dimensional letter-frequency embedding
pub struct LetterEmbedder;

#[async_trait]
impl Embedder for LetterEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let mut values = vec![0.0; 26];
        for c in text.chars().filter(|c| c.is_ascii_alphabetic()) {
            values[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
        }
        Ok(Embedding::new(values))
    }
}

/// Returns a fixed vector per exact input text
pub struct TableEmbedder(pub HashMap<String, Vec<f32>>);

impl TableEmbedder {
    pub fn new(entries: &[(&str, Vec<f32>)]) -> Self {
        TableEmbedder(
            entries
                .iter()
                .map(|(text, values)| (text.to_string(), values.clone()))
                .collect(),
        )
    }
}

#[async_trait]
impl Embedder for TableEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.0
            .get(text)
            .cloned()
            .map(Embedding::new)
            .ok_or_else(|| RagError::EmbeddingFailure(format!("no vector for {text:?}")))
    }
}

/// Fails for any text containing the marker, otherwise embeds by letters
pub struct FailingEmbedder(pub &'static str);

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        if text.contains(self.0) {
            return Err(RagError::EmbeddingFailure("provider unavailable".to_string()));
        }
        LetterEmbedder.embed(text).await
    }
}

/// Sleeps before answering
pub struct SlowEmbedder(pub Duration);

#[async_trait]
impl Embedder for SlowEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        tokio::time::sleep(self.0).await;
        LetterEmbedder.embed(text).await
    }
}

/// Describes its inputs instead of answering
pub struct EchoGenerator;

#[async_trait]
impl AnswerGenerator for EchoGenerator {
    async fn generate(
        &self,
        question: &str,
        context: &[TextChunk],
        history: &[ChatTurn],
    ) -> Result<String> {
        Ok(format!(
            "{} [context={} history={}]",
            question,
            context.len(),
            history.len()
        ))
    }
}

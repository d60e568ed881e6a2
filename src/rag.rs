use crate::answer::{recent_history, AnswerGenerator, ChatTurn};
use crate::chunking::TextChunk;
use crate::config::{ChunkerConfig, RetrievalConfig};
use crate::document::Document;
use crate::embeddings::Embedder;
use crate::error::{RagError, Result};
use crate::retrieval::retrieve;
use crate::session::{SessionRegistry, SessionSummary};
use crate::upstream::Deadline;
use log::{debug, info};
use serde::Serialize;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    pub document_id: String,
    pub filename: String,
    pub num_chunks: usize,
    pub status: &'static str,
}

impl From<SessionSummary> for UploadReceipt {
    fn from(summary: SessionSummary) -> Self {
        UploadReceipt {
            document_id: summary.document_id,
            filename: summary.filename,
            num_chunks: summary.num_chunks,
            status: "processed",
        }
    }
}

/// Answer to a question about a document
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    /// Text of the chunks given to the model, most similar first
    pub context: Vec<String>,
    /// Seconds spent answering
    pub processing_time: f64,
}

/// RAG (Retrieval-Augmented Generation) engine
#[derive(Clone)]
pub struct RagEngine {
    registry: Arc<SessionRegistry>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn AnswerGenerator>,
    chunker: ChunkerConfig,
    retrieval: RetrievalConfig,
}

impl RagEngine {
    /// Create a new RAG engine; every provider call is bounded by
    /// `retrieval.upstream_timeout`
    pub fn new(
        registry: Arc<SessionRegistry>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn AnswerGenerator>,
        chunker: ChunkerConfig,
        retrieval: RetrievalConfig,
    ) -> Result<Self> {
        chunker.validate()?;

        let timeout = retrieval.upstream_timeout;
        Ok(RagEngine {
            registry,
            embedder: Arc::new(Deadline::new(embedder, timeout)),
            generator: Arc::new(Deadline::new(generator, timeout)),
            chunker,
            retrieval,
        })
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Extract text from an uploaded file and register it as a new document
    pub async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadReceipt> {
        let name = filename.to_string();
        let document = tokio::task::spawn_blocking(move || Document::from_bytes(&name, &bytes))
            .await
            .map_err(|e| RagError::ExtractionFailure(format!("Extraction task failed: {}", e)))??;

        info!(
            "Extracted {} characters from {} ({})",
            document.content.chars().count(),
            document.filename,
            document.mime_type
        );

        self.ingest(&document.filename, &document.content).await
    }

    /// Chunk and embed already extracted text
    pub async fn ingest(&self, filename: &str, text: &str) -> Result<UploadReceipt> {
        let summary = self
            .registry
            .create_session(filename, text, &self.chunker, self.embedder.as_ref())
            .await?;
        info!(
            "Registered {} as {} with {} chunks",
            summary.filename, summary.document_id, summary.num_chunks
        );
        Ok(summary.into())
    }

    /// Answer a question from the most similar chunks of one document
    pub async fn ask(
        &self,
        document_id: &str,
        question: &str,
        history: &[ChatTurn],
    ) -> Result<Answer> {
        let start = Instant::now();
        let session = self.registry.get_session(document_id)?;

        let query_embedding = self.embedder.embed(question).await?;
        let ranked = retrieve(&query_embedding, &session.store, self.retrieval.top_k)?;
        debug!(
            "Retrieved {} chunks for {} (best score {:?})",
            ranked.len(),
            document_id,
            ranked.first().map(|r| r.score)
        );

        let context: Vec<TextChunk> = ranked.into_iter().map(|r| r.chunk.clone()).collect();
        let history = recent_history(history, self.retrieval.history_window);
        let answer = self.generator.generate(question, &context, history).await?;

        let processing_time = start.elapsed().as_secs_f64();
        info!(
            "Answered question about {} in {:.2}s",
            document_id, processing_time
        );

        Ok(Answer {
            answer,
            context: context.into_iter().map(|chunk| chunk.text).collect(),
            processing_time,
        })
    }

    /// Run the interactive query loop for a document
    pub async fn run_query_loop(&self, document_id: &str) -> anyhow::Result<()> {
        let session = self.registry.get_session(document_id)?;
        println!(
            "Ready to answer questions about {}. Type 'exit' to quit.",
            session.filename
        );

        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut buffer = String::new();
        let mut history: Vec<ChatTurn> = Vec::new();

        loop {
            print!("\nYour question: ");
            stdout.flush()?;

            buffer.clear();
            if stdin.read_line(&mut buffer)? == 0 {
                break;
            }

            let question = buffer.trim();
            if question.is_empty() {
                continue;
            }
            if question.eq_ignore_ascii_case("exit") {
                println!("Goodbye!");
                break;
            }

            let answer = match self.ask(document_id, question, &history).await {
                Ok(answer) => answer,
                Err(err) if err.is_retryable() => {
                    println!("{}. Please try again.", err);
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            println!("\n{}", answer.answer);

            history.push(ChatTurn::user(question));
            history.push(ChatTurn::assistant(answer.answer));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{EchoGenerator, FailingEmbedder, LetterEmbedder, SlowEmbedder};
    use std::time::Duration;

    fn engine(embedder: Arc<dyn Embedder>) -> RagEngine {
        RagEngine::new(
            Arc::new(SessionRegistry::new()),
            embedder,
            Arc::new(EchoGenerator),
            ChunkerConfig::new(30, 5),
            RetrievalConfig::default(),
        )
        .unwrap()
    }

    const DOC: &str = "zzzz zzzz zzzz zzzz zzzz zzzz zzzz. \
                       aaaa aaaa aaaa aaaa aaaa aaaa aaaa. \
                       mmmm mmmm mmmm mmmm mmmm mmmm mmmm.";

    #[tokio::test]
    async fn test_upload_then_ask() {
        let engine = engine(Arc::new(LetterEmbedder));
        let receipt = engine
            .upload("letters.txt", DOC.as_bytes().to_vec())
            .await
            .unwrap();
        assert_eq!(receipt.status, "processed");
        assert_eq!(receipt.filename, "letters.txt");
        assert!(receipt.num_chunks >= 3);

        let answer = engine
            .ask(&receipt.document_id, "aaaa?", &[])
            .await
            .unwrap();
        assert!(answer.answer.starts_with("aaaa?"));
        assert_eq!(answer.context.len(), 3);
        assert!(answer.context[0].contains("aaaa"));
        assert!(answer.processing_time >= 0.0);
    }

    #[tokio::test]
    async fn test_history_is_limited_to_window() {
        let engine = engine(Arc::new(LetterEmbedder));
        let receipt = engine.ingest("doc.txt", DOC).await.unwrap();
        let history: Vec<ChatTurn> = (0..25).map(|i| ChatTurn::user(format!("q{i}"))).collect();

        let answer = engine
            .ask(&receipt.document_id, "mmmm", &history)
            .await
            .unwrap();
        assert!(answer.answer.ends_with("history=10]"));
    }

    #[tokio::test]
    async fn test_unknown_document_is_not_found() {
        let engine = engine(Arc::new(LetterEmbedder));
        let err = engine.ask("missing", "anything", &[]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_failed_upload_registers_nothing() {
        let engine = engine(Arc::new(FailingEmbedder("mmmm")));
        let err = engine
            .upload("letters.txt", DOC.as_bytes().to_vec())
            .await
            .unwrap_err();
        assert_eq!(err.root_kind(), ErrorKind::EmbeddingFailure);
        assert!(engine.registry().is_empty());

        let err = engine
            .upload("letters.exe", DOC.as_bytes().to_vec())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
        assert!(engine.registry().is_empty());
    }

    #[tokio::test]
    async fn test_slow_embedder_surfaces_timeout() {
        let engine = RagEngine::new(
            Arc::new(SessionRegistry::new()),
            Arc::new(SlowEmbedder(Duration::from_secs(5))),
            Arc::new(EchoGenerator),
            ChunkerConfig::default(),
            RetrievalConfig {
                upstream_timeout: Duration::from_millis(20),
                ..Default::default()
            },
        )
        .unwrap();

        let err = engine.ingest("slow.txt", "some text").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IngestionFailure);
        assert!(err.is_retryable());
        assert!(engine.registry().is_empty());
    }

    #[test]
    fn test_invalid_chunker_config_is_rejected() {
        let result = RagEngine::new(
            Arc::new(SessionRegistry::new()),
            Arc::new(LetterEmbedder),
            Arc::new(EchoGenerator),
            ChunkerConfig::new(10, 20),
            RetrievalConfig::default(),
        );
        assert!(matches!(result, Err(RagError::InvalidConfiguration(_))));
    }
}

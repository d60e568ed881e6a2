use crate::chunking::split_into_chunks;
use crate::config::ChunkerConfig;
use crate::embeddings::Embedder;
use crate::error::{RagError, Result};
use crate::vector_store::VectorStore;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

/// One uploaded document with its chunks and their embeddings
#[derive(Debug)]
pub struct DocumentSession {
    pub id: String,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    /// Length of the extracted text in characters
    pub text_length: usize,
    pub store: VectorStore,
}

impl DocumentSession {
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            document_id: self.id.clone(),
            filename: self.filename.clone(),
            created_at: self.created_at,
            text_length: self.text_length,
            num_chunks: self.store.len(),
        }
    }
}

/// What callers learn about a registered document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub document_id: String,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub text_length: usize,
    pub num_chunks: usize,
}

#[derive(Debug, Default)]
struct Sessions {
    by_id: HashMap<String, Arc<DocumentSession>>,
    /// Identifiers in insertion order, oldest first
    order: VecDeque<String>,
}

/// Process-wide map from document identifier to its session.
///
/// Sessions are built outside the lock and published whole. Readers get an
/// `Arc`, so a session stays alive for them even if it is evicted meanwhile.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<Sessions>,
    /// Oldest sessions are evicted beyond this count; `None` keeps everything
    max_sessions: Option<usize>,
}

impl SessionRegistry {
    /// Create an unbounded registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry that keeps at most `max_sessions` documents
    pub fn with_capacity_limit(max_sessions: usize) -> Self {
        SessionRegistry {
            sessions: RwLock::default(),
            max_sessions: Some(max_sessions.max(1)),
        }
    }

    /// Chunk and embed `text`, then register it under a fresh identifier.
    ///
    /// On failure the registry is left untouched and the cause is wrapped in
    /// `IngestionFailure`.
    pub async fn create_session<E>(
        &self,
        filename: &str,
        text: &str,
        config: &ChunkerConfig,
        embedder: &E,
    ) -> Result<SessionSummary>
    where
        E: Embedder + ?Sized,
    {
        let chunks = split_into_chunks(text, config).map_err(RagError::ingestion)?;
        info!("Split {} into {} chunks", filename, chunks.len());

        let store = VectorStore::build(chunks, embedder)
            .await
            .map_err(RagError::ingestion)?;

        let session = DocumentSession {
            id: Uuid::new_v4().to_string(),
            filename: filename.to_string(),
            created_at: Utc::now(),
            text_length: text.chars().count(),
            store,
        };
        let summary = session.summary();
        self.insert(session);

        Ok(summary)
    }

    /// Publish a fully built session
    pub fn insert(&self, session: DocumentSession) -> Arc<DocumentSession> {
        let session = Arc::new(session);
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        sessions.order.push_back(session.id.clone());
        sessions.by_id.insert(session.id.clone(), Arc::clone(&session));

        if let Some(limit) = self.max_sessions {
            while sessions.by_id.len() > limit {
                let Some(oldest) = sessions.order.pop_front() else {
                    break;
                };
                sessions.by_id.remove(&oldest);
                debug!("Evicted document {}", oldest);
            }
        }

        session
    }

    /// Look up a session by identifier
    pub fn get_session(&self, id: &str) -> Result<Arc<DocumentSession>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .get(id)
            .cloned()
            .ok_or_else(|| RagError::NotFound(id.to_string()))
    }

    /// Summaries of every registered document, oldest first
    pub fn list(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions
            .order
            .iter()
            .filter_map(|id| sessions.by_id.get(id))
            .map(|session| session.summary())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub mod answer;
pub mod chunking;
pub mod config;
pub mod document;
pub mod embeddings;
pub mod error;
pub mod gemini;
pub mod rag;
pub mod retrieval;
pub mod server;
pub mod session;
pub mod upstream;
pub mod vector_store;

#[cfg(test)]
mod testing;

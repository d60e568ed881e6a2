use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::{error, info};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use gemini_docqa::config::{
    ChunkerConfig, RetrievalConfig, DEFAULT_BOUNDARY_WINDOW, DEFAULT_CHUNK_OVERLAP,
    DEFAULT_CHUNK_SIZE, DEFAULT_HISTORY_WINDOW, DEFAULT_TOP_K,
};
use gemini_docqa::document::Document;
use gemini_docqa::gemini::{GeminiClient, GeminiConfig};
use gemini_docqa::rag::RagEngine;
use gemini_docqa::server::{self, ServerConfig};
use gemini_docqa::session::SessionRegistry;

/// Ask natural-language questions about uploaded documents, answered with Gemini
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    pipeline: PipelineArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct PipelineArgs {
    /// Chunk length in characters
    #[arg(long, global = true, env = "DOCQA_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, global = true, env = "DOCQA_CHUNK_OVERLAP", default_value_t = DEFAULT_CHUNK_OVERLAP)]
    chunk_overlap: usize,

    /// How far past a chunk end to look for a word boundary
    #[arg(long, global = true, default_value_t = DEFAULT_BOUNDARY_WINDOW)]
    boundary_window: usize,

    /// Chunks passed to the model per question
    #[arg(long, global = true, env = "DOCQA_TOP_K", default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    /// Most recent chat turns forwarded with a question
    #[arg(long, global = true, default_value_t = DEFAULT_HISTORY_WINDOW)]
    history_window: usize,

    /// Seconds before an embedding or generation call is abandoned
    #[arg(long, global = true, env = "DOCQA_UPSTREAM_TIMEOUT_SECS", default_value_t = 30)]
    upstream_timeout_secs: u64,

    /// Keep at most this many documents, evicting the oldest (0 keeps all)
    #[arg(long, global = true, env = "DOCQA_MAX_SESSIONS", default_value_t = 0)]
    max_sessions: usize,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the upload and question HTTP API
    Serve {
        /// Address to bind the HTTP server to (host:port)
        #[arg(long, env = "DOCQA_BIND", default_value = "127.0.0.1:8000")]
        bind: SocketAddr,

        /// Browser origin allowed by CORS
        #[arg(long, env = "DOCQA_ALLOWED_ORIGIN", default_value = "http://localhost:3000")]
        allowed_origin: String,

        /// Largest accepted upload in bytes
        #[arg(long, env = "DOCQA_MAX_UPLOAD_BYTES", default_value_t = 20 * 1024 * 1024)]
        max_upload_bytes: usize,
    },
    /// Load one document and ask questions about it interactively
    Chat {
        /// Path to the document to process (PDF, DOCX or text)
        #[arg(index = 1)]
        file_path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let pipeline = &args.pipeline;

    let chunker = ChunkerConfig {
        chunk_size: pipeline.chunk_size,
        overlap: pipeline.chunk_overlap,
        boundary_window: pipeline.boundary_window,
    };
    let retrieval = RetrievalConfig {
        top_k: pipeline.top_k,
        history_window: pipeline.history_window,
        upstream_timeout: Duration::from_secs(pipeline.upstream_timeout_secs.max(1)),
    };
    let registry = if pipeline.max_sessions > 0 {
        SessionRegistry::with_capacity_limit(pipeline.max_sessions)
    } else {
        SessionRegistry::new()
    };

    // Load configuration from environment
    let gemini_config = GeminiConfig::from_env().context("Missing Gemini configuration")?;
    let gemini = Arc::new(GeminiClient::new(gemini_config)?);

    let engine = RagEngine::new(
        Arc::new(registry),
        gemini.clone(),
        gemini,
        chunker,
        retrieval,
    )
    .context("Invalid pipeline configuration")?;

    match args.command {
        Command::Serve {
            bind,
            allowed_origin,
            max_upload_bytes,
        } => {
            let config = ServerConfig {
                bind,
                allowed_origin,
                max_upload_bytes,
            };
            server::serve(engine, config).await
        }
        Command::Chat { file_path } => {
            info!("Processing file: {}", file_path.display());

            // Validate input file exists
            if !file_path.exists() {
                error!("File not found: {}", file_path.display());
                return Err(anyhow::anyhow!("File not found"));
            }

            let document = Document::from_file(&file_path).context("Failed to process document")?;
            info!("Document type: {}", document.mime_type);

            let receipt = engine
                .ingest(&document.filename, &document.content)
                .await
                .context("Failed to process file")?;

            // Enter interactive Q&A loop
            engine
                .run_query_loop(&receipt.document_id)
                .await
                .context("Error in query loop")
        }
    }
}

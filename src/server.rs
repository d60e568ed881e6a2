use crate::answer::ChatTurn;
use crate::error::{ErrorKind, RagError};
use crate::rag::{Answer, RagEngine, UploadReceipt};
use crate::session::SessionSummary;
use anyhow::Context;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;

/// HTTP settings for the upload and question endpoints
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Browser origin allowed to call the API
    pub allowed_origin: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Deserialize)]
struct QuestionRequest {
    document_id: String,
    question: String,
    #[serde(default)]
    chat_history: Option<Vec<ChatTurn>>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error_type: &'static str,
    message: String,
}

/// Failure reported to HTTP clients
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error_type: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl ToString) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            error_type: "invalid_request",
            message: message.to_string(),
        }
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        let kind = err.root_kind();
        let status = match kind {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidConfiguration => StatusCode::BAD_REQUEST,
            ErrorKind::UnsupportedFormat => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ErrorKind::ExtractionFailure => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::EmbeddingFailure
            | ErrorKind::DimensionMismatch
            | ErrorKind::GenerationFailure => StatusCode::BAD_GATEWAY,
            ErrorKind::IngestionFailure => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError {
            status,
            error_type: kind.as_str(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("{} {}: {}", self.status, self.error_type, self.message);
        } else {
            warn!("{} {}: {}", self.status, self.error_type, self.message);
        }
        let body = ErrorBody {
            error_type: self.error_type,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Build the HTTP routes around an engine
pub fn router(engine: RagEngine, config: &ServerConfig) -> anyhow::Result<Router> {
    let origin: HeaderValue = config
        .allowed_origin
        .parse()
        .with_context(|| format!("invalid allowed origin {}", config.allowed_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Ok(Router::new()
        .route("/health", get(health))
        .route("/documents/", get(list_documents))
        .route("/documents/upload/", post(upload_document))
        .route("/qa/", post(answer_question))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors)
        .with_state(engine))
}

/// Serve the API until the process is stopped
pub async fn serve(engine: RagEngine, config: ServerConfig) -> anyhow::Result<()> {
    let app = router(engine, &config)?;

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!("Document Q&A API listening on http://{}", config.bind);

    axum::serve(listener, app).await.context("server shutdown")?;
    Ok(())
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn list_documents(State(engine): State<RagEngine>) -> Json<Vec<SessionSummary>> {
    Json(engine.registry().list())
}

async fn upload_document(
    State(engine): State<RagEngine>,
    mut multipart: Multipart,
) -> Result<Json<UploadReceipt>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(ApiError::bad_request)? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("file field has no file name"))?;
        let bytes = field.bytes().await.map_err(ApiError::bad_request)?;
        info!("Received upload {} ({} bytes)", filename, bytes.len());

        let receipt = engine.upload(&filename, bytes.to_vec()).await?;
        return Ok(Json(receipt));
    }

    Err(ApiError::bad_request("missing multipart field 'file'"))
}

async fn answer_question(
    State(engine): State<RagEngine>,
    Json(request): Json<QuestionRequest>,
) -> Result<Json<Answer>, ApiError> {
    if request.question.trim().is_empty() {
        return Err(ApiError::bad_request("question must not be empty"));
    }

    let history = request.chat_history.unwrap_or_default();
    let answer = engine
        .ask(&request.document_id, &request.question, &history)
        .await?;
    Ok(Json(answer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChunkerConfig, RetrievalConfig};
    use crate::session::SessionRegistry;
    use crate::testing::{EchoGenerator, LetterEmbedder};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    const BOUNDARY: &str = "docqa-test-boundary";

    fn app() -> Router {
        let engine = RagEngine::new(
            Arc::new(SessionRegistry::new()),
            Arc::new(LetterEmbedder),
            Arc::new(EchoGenerator),
            ChunkerConfig::new(40, 10),
            RetrievalConfig::default(),
        )
        .unwrap();
        let config = ServerConfig {
            bind: "127.0.0.1:0".parse().unwrap(),
            allowed_origin: "http://localhost:3000".to_string(),
            max_upload_bytes: 1024 * 1024,
        };
        router(engine, &config).unwrap()
    }

    fn upload_request(filename: &str, content: &str) -> Request<Body> {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             {content}\r\n\
             --{BOUNDARY}--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri("/documents/upload/")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_upload_list_and_ask() {
        let app = app();
        let text = "Ferris is the unofficial mascot of the Rust language. \
                    Cargo is the Rust package manager and build tool.";

        let response = app
            .clone()
            .oneshot(upload_request("rust.txt", text))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let receipt = read_json(response).await;
        assert_eq!(receipt["filename"], "rust.txt");
        assert_eq!(receipt["status"], "processed");
        assert!(receipt["num_chunks"].as_u64().unwrap() > 1);
        let document_id = receipt["document_id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(Request::get("/documents/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let listing = read_json(response).await;
        assert_eq!(listing[0]["document_id"], document_id.as_str());

        let response = app
            .oneshot(json_request(
                "/qa/",
                json!({
                    "document_id": document_id,
                    "question": "What is Cargo?",
                    "chat_history": [
                        { "role": "user", "content": "Hi" },
                        { "role": "assistant", "content": "Hello" }
                    ]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let answer = read_json(response).await;
        assert_eq!(answer["answer"], "What is Cargo? [context=3 history=2]");
        assert_eq!(answer["context"].as_array().unwrap().len(), 3);
        assert!(answer["processing_time"].as_f64().unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn test_unknown_document_is_404() {
        let response = app()
            .oneshot(json_request(
                "/qa/",
                json!({ "document_id": "nope", "question": "Anything?" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(read_json(response).await["error_type"], "not_found");
    }

    #[tokio::test]
    async fn test_empty_question_is_400() {
        let response = app()
            .oneshot(json_request(
                "/qa/",
                json!({ "document_id": "nope", "question": "   ", "chat_history": null }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unsupported_upload_is_415() {
        let response = app()
            .oneshot(upload_request("image.png", "not really an image"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(read_json(response).await["error_type"], "unsupported_format");
    }

    #[tokio::test]
    async fn test_upstream_errors_do_not_expose_api_key() {
        use crate::embeddings::Embedder;
        use crate::gemini::{GeminiClient, GeminiConfig};

        let client = GeminiClient::new(GeminiConfig {
            api_key: "SECRET-KEY-123".to_string(),
            embeddings_url: "http://127.0.0.1:1/embed".to_string(),
            generate_url: "http://127.0.0.1:1/generate".to_string(),
            embedding_model: "models/text-embedding-004".to_string(),
            timeout: std::time::Duration::from_secs(5),
        })
        .unwrap();

        let err = client.embed("hello").await.unwrap_err();
        let err = ApiError::from(RagError::ingestion(err));
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert!(!err.message.contains("SECRET-KEY-123"), "{}", err.message);
    }

    #[test]
    fn test_ingestion_failures_map_by_cause() {
        let err = ApiError::from(RagError::ingestion(RagError::EmbeddingFailure(
            "quota".to_string(),
        )));
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.error_type, "embedding_failure");

        let err = ApiError::from(RagError::UpstreamTimeout {
            operation: "embedding",
            after: std::time::Duration::from_secs(1),
        });
        assert_eq!(err.status, StatusCode::GATEWAY_TIMEOUT);
    }
}

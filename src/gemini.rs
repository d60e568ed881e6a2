use crate::answer::{system_prompt, AnswerGenerator, ChatTurn};
use crate::chunking::TextChunk;
use crate::embeddings::{Embedder, Embedding};
use crate::error::{RagError, Result};
use anyhow::Context;
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

const DEFAULT_EMBEDDINGS_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/text-embedding-004:embedContent";
const DEFAULT_GENERATE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";
const DEFAULT_EMBEDDING_MODEL: &str = "models/text-embedding-004";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const API_KEY_HEADER: &str = "x-goog-api-key";

const ANSWER_TEMPERATURE: f32 = 0.5;
const ANSWER_MAX_OUTPUT_TOKENS: i32 = 500;

/// Configuration for Gemini API
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub embeddings_url: String,
    pub generate_url: String,
    pub embedding_model: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = env::var("GEMINI_API_KEY").context("GEMINI_API_KEY not set")?;
        let embeddings_url = env::var("GEMINI_EMBEDDINGS_URL")
            .unwrap_or_else(|_| DEFAULT_EMBEDDINGS_URL.to_string());
        let generate_url =
            env::var("GEMINI_GENERATE_URL").unwrap_or_else(|_| DEFAULT_GENERATE_URL.to_string());
        let embedding_model = env::var("GEMINI_EMBEDDING_MODEL")
            .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string());
        let timeout_secs = match env::var("GEMINI_TIMEOUT_SECS") {
            Ok(value) => value
                .parse::<u64>()
                .with_context(|| format!("Invalid GEMINI_TIMEOUT_SECS: {}", value))?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        Ok(GeminiConfig {
            api_key,
            embeddings_url,
            generate_url,
            embedding_model,
            timeout: Duration::from_secs(timeout_secs.max(1)),
        })
    }
}

/// Client for interacting with Gemini API
#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: GeminiConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(GeminiClient { config, client })
    }

    /// POST a JSON body and decode the JSON reply
    async fn post<B, R>(&self, url: &str, body: &B, operation: &'static str) -> ApiResult<R>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        // The key travels in a header so it never shows up in request errors
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e, operation))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ApiFailure::Rejected(format!(
                "API request failed: {} {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| self.transport_error(e, operation))
    }

    fn transport_error(&self, err: reqwest::Error, operation: &'static str) -> ApiFailure {
        if err.is_timeout() {
            ApiFailure::Timeout(RagError::UpstreamTimeout {
                operation,
                after: self.config.timeout,
            })
        } else {
            ApiFailure::Rejected(err.without_url().to_string())
        }
    }
}

/// Transport-level outcome, mapped to the caller's error kind
enum ApiFailure {
    Timeout(RagError),
    Rejected(String),
}

type ApiResult<T> = std::result::Result<T, ApiFailure>;

impl ApiFailure {
    fn into_error(self, wrap: fn(String) -> RagError) -> RagError {
        match self {
            ApiFailure::Timeout(err) => err,
            ApiFailure::Rejected(message) => wrap(message),
        }
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    /// Generate embeddings for a text
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let request = EmbeddingRequest {
            model: &self.config.embedding_model,
            content: Content {
                role: None,
                parts: vec![Part { text }],
            },
        };

        let response: EmbeddingResponse = self
            .post(&self.config.embeddings_url, &request, "embedding")
            .await
            .map_err(|e| e.into_error(RagError::EmbeddingFailure))?;

        if response.embedding.values.is_empty() {
            return Err(RagError::EmbeddingFailure(
                "API returned an empty embedding".to_string(),
            ));
        }

        Ok(Embedding::new(response.embedding.values))
    }
}

#[async_trait]
impl AnswerGenerator for GeminiClient {
    /// Answer from the supplied context, prior turns and the question
    async fn generate(
        &self,
        question: &str,
        context: &[TextChunk],
        history: &[ChatTurn],
    ) -> Result<String> {
        let instruction = system_prompt(context);
        let request = build_generate_request(&instruction, history, question);
        debug!(
            "Generating answer with {} context chunks and {} prior turns",
            context.len(),
            history.len()
        );

        let response: GenerateResponse = self
            .post(&self.config.generate_url, &request, "answer generation")
            .await
            .map_err(|e| e.into_error(RagError::GenerationFailure))?;

        // Extract the generated text from the response
        response
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<String>()
            })
            .filter(|text| !text.is_empty())
            .ok_or_else(|| RagError::GenerationFailure("No response generated".to_string()))
    }
}

fn build_generate_request<'a>(
    instruction: &'a str,
    history: &'a [ChatTurn],
    question: &'a str,
) -> GenerateRequest<'a> {
    let mut contents: Vec<Content<'a>> = history
        .iter()
        .map(|turn| Content::new_with_role(&turn.content, gemini_role(&turn.role)))
        .collect();
    contents.push(Content::new_with_role(question, "user"));

    GenerateRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part { text: instruction }],
        },
        contents,
        generation_config: GenerationConfig {
            temperature: ANSWER_TEMPERATURE,
            max_output_tokens: ANSWER_MAX_OUTPUT_TOKENS,
        },
    }
}

/// Gemini names the assistant side of a conversation `model`
fn gemini_role(role: &str) -> &'static str {
    match role {
        "assistant" | "model" => "model",
        _ => "user",
    }
}

// Request/response structures for the Gemini API

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    content: Content<'a>,
}

#[derive(Deserialize, Debug)]
struct EmbeddingResponse {
    embedding: EmbeddingData,
}

#[derive(Deserialize, Debug)]
struct EmbeddingData {
    values: Vec<f32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

impl<'a> Content<'a> {
    fn new_with_role(text: &'a str, role: &'static str) -> Self {
        Content {
            role: Some(role),
            parts: vec![Part { text }],
        }
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: i32,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Deserialize, Debug)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

//! OpenAI-compatible embeddings endpoint (`POST {base_url}/embeddings`).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{EmbeddingProvider, ProviderError};
use crate::vector::Vector;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "text-embedding-ada-002";
/// Output dimension of `text-embedding-ada-002`.
pub const DEFAULT_DIMENSION: usize = 1536;

/// Embedding provider backed by an OpenAI-compatible HTTP API.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetails,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetails {
    message: String,
}

impl OpenAiEmbedder {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::Unavailable("API key is empty".to_string()));
        }

        let client = Client::builder().build()?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            dimension: DEFAULT_DIMENSION,
        })
    }

    /// Use a different model. `dimension` must match what the model returns.
    pub fn with_model(mut self, model: impl Into<String>, dimension: usize) -> Self {
        self.model = model.into();
        self.dimension = dimension;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url.trim_end_matches('/'))
    }
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vector, ProviderError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: vec![text],
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| Vector::new(d.embedding))
            .ok_or_else(|| {
                ProviderError::MalformedResponse("response contained no embeddings".to_string())
            })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};

    async fn spawn_mock(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/v1", addr)
    }

    #[tokio::test]
    async fn test_embed_parses_first_embedding() {
        let router = Router::new().route(
            "/v1/embeddings",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["authorization"], "Bearer sk-test");
                assert_eq!(body["model"], "tiny-model");
                assert_eq!(body["input"][0], "hello world");
                Json(json!({
                    "object": "list",
                    "data": [{"object": "embedding", "index": 0, "embedding": [0.25, -0.5, 1.0]}],
                    "model": "tiny-model"
                }))
            }),
        );
        let base_url = spawn_mock(router).await;

        let embedder = OpenAiEmbedder::new("sk-test")
            .unwrap()
            .with_model("tiny-model", 3)
            .with_base_url(base_url);
        let vector = embedder.embed("hello world").await.unwrap();

        assert_eq!(vector.as_slice(), &[0.25, -0.5, 1.0]);
        assert_eq!(embedder.dimension(), 3);
    }

    #[tokio::test]
    async fn test_embed_reports_api_error() {
        let router = Router::new().route(
            "/v1/embeddings",
            post(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}})),
                )
            }),
        );
        let base_url = spawn_mock(router).await;

        let embedder = OpenAiEmbedder::new("sk-wrong").unwrap().with_base_url(base_url);
        match embedder.embed("x").await {
            Err(ProviderError::Api { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "Incorrect API key provided");
            }
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_embed_rejects_empty_data() {
        let router = Router::new().route(
            "/v1/embeddings",
            post(|| async { Json(json!({"data": []})) }),
        );
        let base_url = spawn_mock(router).await;

        let embedder = OpenAiEmbedder::new("sk-test").unwrap().with_base_url(base_url);
        assert!(matches!(
            embedder.embed("x").await,
            Err(ProviderError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_empty_api_key_rejected() {
        assert!(matches!(
            OpenAiEmbedder::new("  "),
            Err(ProviderError::Unavailable(_))
        ));
    }
}

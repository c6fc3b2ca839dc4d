//! DashScope multimodal embedding client.
//!
//! Embeds text or images through the `multimodal-embedding-v1` model, which
//! places both in one 1024-dimensional space. Images are sent inline as
//! base64 data URLs.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and is never logged
//! or included in `Debug` output.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use murmur_core::memory::codec::estimate_tokens;
use murmur_core::memory::embedder::{EmbedInput, Embedder};
use murmur_types::error::EmbeddingError;

pub const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com";
pub const DEFAULT_MODEL: &str = "multimodal-embedding-v1";
pub const EMBEDDING_DIMENSION: usize = 1024;
pub const MAX_INPUT_TOKENS: usize = 512;

/// Largest image the endpoint accepts inline.
pub const MAX_IMAGE_BYTES: usize = 3 * 1024 * 1024;

const EMBEDDING_PATH: &str =
    "/api/v1/services/embeddings/multimodal-embedding/multimodal-embedding";

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: EmbeddingInput,
    parameters: serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize)]
struct EmbeddingInput {
    contents: Vec<Content>,
}

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum Content {
    Text(String),
    Image(String),
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    output: EmbeddingOutput,
}

#[derive(Deserialize)]
struct EmbeddingOutput {
    embeddings: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// DashScope multimodal embedder.
///
/// Does NOT derive Debug; the struct holds the API key.
pub struct DashScopeEmbedder {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl DashScopeEmbedder {
    pub fn new(api_key: SecretString, model: Option<String>) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| EmbeddingError::Backend(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    /// Override the base URL (useful for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn content(input: EmbedInput<'_>) -> Result<Content, EmbeddingError> {
        match input {
            EmbedInput::Text(text) => {
                let tokens = estimate_tokens(text);
                if tokens > MAX_INPUT_TOKENS {
                    return Err(EmbeddingError::InputTooLarge {
                        tokens,
                        limit: MAX_INPUT_TOKENS,
                    });
                }
                Ok(Content::Text(text.to_string()))
            }
            // Image size is reported in bytes in place of tokens.
            EmbedInput::Image(bytes) if bytes.len() > MAX_IMAGE_BYTES => {
                Err(EmbeddingError::InputTooLarge {
                    tokens: bytes.len(),
                    limit: MAX_IMAGE_BYTES,
                })
            }
            EmbedInput::Image(bytes) => Ok(Content::Image(format!(
                "data:{};base64,{}",
                image_mime(bytes),
                STANDARD.encode(bytes)
            ))),
        }
    }
}

fn image_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"\x89PNG") {
        "image/png"
    } else {
        "image/jpeg"
    }
}

fn retry_after_ms(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| secs * 1_000)
}

impl Embedder for DashScopeEmbedder {
    async fn embed(&self, input: EmbedInput<'_>) -> Result<Vec<f32>, EmbeddingError> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: EmbeddingInput {
                contents: vec![Self::content(input)?],
            },
            parameters: serde_json::Map::new(),
        };

        let response = self
            .client
            .post(format!("{}{EMBEDDING_PATH}", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbeddingError::Backend(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_ms(response.headers());
            let error: ErrorBody = response.json().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), code = %error.code, "embedding request rejected");
            return Err(match status.as_u16() {
                429 => EmbeddingError::RateLimited {
                    retry_after_ms: retry_after,
                },
                _ => EmbeddingError::Backend(format!(
                    "HTTP {status}: {} {}",
                    error.code, error.message
                )),
            });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Backend(format!("failed to parse response: {e}")))?;

        let vector = parsed
            .output
            .embeddings
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or_else(|| EmbeddingError::Backend("response held no embedding".to_string()))?;

        if vector.len() != EMBEDDING_DIMENSION {
            return Err(EmbeddingError::Backend(format!(
                "expected {EMBEDDING_DIMENSION} dimensions, got {}",
                vector.len()
            )));
        }
        Ok(vector)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIMENSION
    }

    fn max_input_tokens(&self) -> usize {
        MAX_INPUT_TOKENS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn embedder(base_url: &str) -> DashScopeEmbedder {
        DashScopeEmbedder::new(SecretString::from("test-key".to_string()), None)
            .unwrap()
            .with_base_url(base_url)
    }

    fn success_body() -> serde_json::Value {
        serde_json::json!({
            "output": {
                "embeddings": [
                    {"index": 0, "embedding": vec![0.5f32; EMBEDDING_DIMENSION], "type": "text"}
                ]
            },
            "usage": {"input_tokens": 7},
            "request_id": "req-1"
        })
    }

    #[tokio::test]
    async fn embed_text_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(EMBEDDING_PATH))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "multimodal-embedding-v1",
                "input": {"contents": [{"text": "I'm 20 years old"}]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
            .expect(1)
            .mount(&server)
            .await;

        let vector = embedder(&server.uri())
            .embed(EmbedInput::Text("I'm 20 years old"))
            .await
            .unwrap();
        assert_eq!(vector.len(), EMBEDDING_DIMENSION);
    }

    #[tokio::test]
    async fn embed_image_sends_data_url() {
        let server = MockServer::start().await;
        let png = b"\x89PNG\r\n\x1a\nrest";
        let data_url = format!("data:image/png;base64,{}", STANDARD.encode(png));
        Mock::given(method("POST"))
            .and(path(EMBEDDING_PATH))
            .and(body_partial_json(serde_json::json!({
                "input": {"contents": [{"image": data_url}]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
            .expect(1)
            .mount(&server)
            .await;

        let vector = embedder(&server.uri())
            .embed(EmbedInput::Image(png))
            .await
            .unwrap();
        assert_eq!(vector.len(), EMBEDDING_DIMENSION);
    }

    #[tokio::test]
    async fn embed_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "3")
                    .set_body_json(serde_json::json!({
                        "code": "Throttling.RateQuota",
                        "message": "Requests rate limit exceeded"
                    })),
            )
            .mount(&server)
            .await;

        let err = embedder(&server.uri())
            .embed(EmbedInput::Text("hi"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::RateLimited {
                retry_after_ms: Some(3_000)
            }
        ));
    }

    #[tokio::test]
    async fn embed_server_error_is_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "code": "InternalError",
                "message": "boom"
            })))
            .mount(&server)
            .await;

        let err = embedder(&server.uri())
            .embed(EmbedInput::Text("hi"))
            .await
            .unwrap_err();
        match err {
            EmbeddingError::Backend(msg) => assert!(msg.contains("InternalError")),
            other => panic!("expected Backend, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn embed_wrong_dimension_is_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "output": {"embeddings": [{"index": 0, "embedding": [0.1, 0.2]}]}
            })))
            .mount(&server)
            .await;

        let err = embedder(&server.uri())
            .embed(EmbedInput::Text("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::Backend(_)));
    }

    #[tokio::test]
    async fn oversized_text_never_reaches_the_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
            .expect(0)
            .mount(&server)
            .await;

        let text = "word ".repeat(1_000);
        let client = embedder(&server.uri());
        let err = client.embed(EmbedInput::Text(&text)).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::InputTooLarge { .. }));

        let image = vec![0u8; MAX_IMAGE_BYTES + 1];
        let err = client.embed(EmbedInput::Image(&image)).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::InputTooLarge { .. }));
    }
}

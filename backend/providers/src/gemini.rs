use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use cropdoc_core::{GenerationClient, GenerationRequest, RawResponse};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini `generateContent` client with schema-constrained JSON output.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: serde_json::Value,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[async_trait]
impl GenerationClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn invoke(&self, request: &GenerationRequest) -> Result<RawResponse> {
        let start = Instant::now();

        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: &request.prompt,
                    },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: &request.image.mime_type,
                            data: &request.image.base64_payload,
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: request.schema.to_gemini(),
            },
        };

        debug!(model = %self.model, "Sending request to Gemini");

        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Gemini HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini returned {}: {}", status, error_body);
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;

        let candidate = parsed.candidates.into_iter().next();
        if let Some(reason) = candidate.as_ref().and_then(|c| c.finish_reason.as_deref()) {
            if reason != "STOP" {
                warn!(finish_reason = %reason, "Gemini candidate did not finish normally");
            }
        }

        let text: String = candidate
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect()
            })
            .unwrap_or_default();

        Ok(RawResponse {
            text,
            provider: "gemini".to_string(),
            model: self.model.clone(),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::{
        http::{HeaderMap, StatusCode, Uri},
        response::IntoResponse,
        Json, Router,
    };
    use cropdoc_core::{AdvisoryField, EncodedImage, OutputSchema};
    use serde_json::{json, Value};

    #[derive(Default)]
    struct Seen {
        path: String,
        api_key: String,
        body: Value,
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn mock_gemini(status: StatusCode, reply: Value, seen: Arc<Mutex<Seen>>) -> Router {
        Router::new().fallback(move |uri: Uri, headers: HeaderMap, Json(body): Json<Value>| {
            let seen = Arc::clone(&seen);
            let reply = reply.clone();
            async move {
                {
                    let mut guard = seen.lock().unwrap();
                    guard.path = uri.path().to_string();
                    guard.api_key = headers
                        .get("x-goog-api-key")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    guard.body = body;
                }
                (status, Json(reply)).into_response()
            }
        })
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            prompt: "diagnose".into(),
            image: EncodedImage {
                base64_payload: "bGVhZg==".into(),
                mime_type: "image/jpeg".into(),
            },
            schema: OutputSchema {
                name: "disease_advisory",
                required: AdvisoryField::ALL.to_vec(),
            },
        }
    }

    #[tokio::test]
    async fn test_invoke_sends_inline_image_and_schema() {
        let seen = Arc::new(Mutex::new(Seen::default()));
        let reply = json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "{\"diseaseName\":\"Leaf Rust\"," },
                    { "text": "\"causes\":\"Fungal infection\",\"treatment\":\"Apply fungicide\"}" }
                ]},
                "finishReason": "STOP"
            }]
        });
        let base = serve(mock_gemini(StatusCode::OK, reply, Arc::clone(&seen))).await;

        let client = GeminiClient::new("test-key").with_base_url(base);
        let raw = client.invoke(&request()).await.unwrap();

        assert_eq!(
            raw.text,
            r#"{"diseaseName":"Leaf Rust","causes":"Fungal infection","treatment":"Apply fungicide"}"#
        );
        assert_eq!(raw.provider, "gemini");
        assert_eq!(raw.model, DEFAULT_GEMINI_MODEL);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.path, "/models/gemini-2.5-flash:generateContent");
        assert_eq!(seen.api_key, "test-key");
        let parts = &seen.body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "diagnose");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[1]["inlineData"]["data"], "bGVhZg==");
        let config = &seen.body["generationConfig"];
        assert_eq!(config["responseMimeType"], "application/json");
        assert_eq!(config["responseSchema"]["type"], "OBJECT");
    }

    #[tokio::test]
    async fn test_no_candidates_yields_empty_text() {
        let seen = Arc::new(Mutex::new(Seen::default()));
        let reply = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let base = serve(mock_gemini(StatusCode::OK, reply, seen)).await;

        let client = GeminiClient::new("test-key").with_base_url(base);
        let raw = client.invoke(&request()).await.unwrap();
        assert!(raw.text.is_empty());
    }

    #[tokio::test]
    async fn test_error_status_is_error() {
        let seen = Arc::new(Mutex::new(Seen::default()));
        let reply = json!({ "error": { "message": "API key not valid" } });
        let base = serve(mock_gemini(StatusCode::BAD_REQUEST, reply, seen)).await;

        let client = GeminiClient::new("bad-key").with_base_url(base);
        let err = client.invoke(&request()).await.unwrap_err();
        assert!(err.to_string().contains("400"));
    }
}

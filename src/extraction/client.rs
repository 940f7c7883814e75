use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::ExtractionError;
use crate::config::ExtractionSettings;

const PDF_MIME: &str = "application/pdf";

/// A document-understanding model that answers a prompt about a PDF.
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    async fn generate_from_pdf(&self, prompt: &str, pdf: &[u8]) -> Result<String, ExtractionError>;
}

/// Client for a Gemini-style `generateContent` endpoint.
pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: Zeroizing<String>,
    client: reqwest::Client,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(settings: &ExtractionSettings, timeout: Duration) -> Result<Self, ExtractionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExtractionError::HttpClient(e.to_string()))?;
        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone(),
            client,
            timeout,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text { text: &'a str },
    Inline { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
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

fn build_request<'a>(prompt: &'a str, pdf: &[u8]) -> GenerateRequest<'a> {
    GenerateRequest {
        contents: vec![Content {
            parts: vec![
                RequestPart::Text { text: prompt },
                RequestPart::Inline {
                    inline_data: InlineData {
                        mime_type: PDF_MIME,
                        data: base64::engine::general_purpose::STANDARD.encode(pdf),
                    },
                },
            ],
        }],
        generation_config: GenerationConfig { temperature: 0.0 },
    }
}

/// Concatenated text parts of the first candidate.
fn response_text(response: GenerateResponse) -> Option<String> {
    let parts = response.candidates.into_iter().next()?.content?.parts;
    let text: String = parts.into_iter().filter_map(|p| p.text).collect();
    (!text.trim().is_empty()).then_some(text)
}

#[async_trait]
impl ExtractionClient for GeminiClient {
    async fn generate_from_pdf(&self, prompt: &str, pdf: &[u8]) -> Result<String, ExtractionError> {
        let start = std::time::Instant::now();

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.as_str())
            .json(&build_request(prompt, pdf))
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ExtractionError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    ExtractionError::HttpClient(format!(
                        "Request timed out after {}s",
                        self.timeout.as_secs()
                    ))
                } else {
                    ExtractionError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::ResponseParsing(e.to_string()))?;

        tracing::info!(
            model = %self.model,
            pdf_size = pdf.len(),
            elapsed_ms = %start.elapsed().as_millis(),
            "extraction response received"
        );
        response_text(parsed)
            .ok_or_else(|| ExtractionError::ResponseParsing("no text in first candidate".into()))
    }
}

/// Canned client for tests and offline runs.
pub struct MockExtractionClient {
    response: Result<String, String>,
    calls: AtomicUsize,
}

impl MockExtractionClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            response: Err(reason.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionClient for MockExtractionClient {
    async fn generate_from_pdf(&self, _prompt: &str, _pdf: &[u8]) -> Result<String, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response
            .clone()
            .map_err(ExtractionError::HttpClient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_prompt_and_base64_pdf() {
        let json = serde_json::to_value(build_request("estrai", b"%PDF")).unwrap();
        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "estrai");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "application/pdf");
        assert_eq!(parts[1]["inline_data"]["data"], "JVBERg==");
        assert_eq!(json["generationConfig"]["temperature"], 0.0);
    }

    #[test]
    fn response_text_joins_first_candidate_parts() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":"},{"text":"1}"}]}},
                              {"content":{"parts":[{"text":"ignored"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(response_text(response).as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn blocked_or_empty_response_has_no_text() {
        let blocked: GenerateResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert!(response_text(blocked).is_none());

        let empty: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{"content":{"parts":[{"text":"  "}]}}]}"#).unwrap();
        assert!(response_text(empty).is_none());
    }

    #[test]
    fn endpoint_includes_model() {
        let settings = ExtractionSettings {
            base_url: "https://llm.example.com/v1beta/".into(),
            model: "gemini-2.0-flash".into(),
            api_key: Zeroizing::new("k".into()),
        };
        let client = GeminiClient::new(&settings, Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.endpoint(),
            "https://llm.example.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn mock_counts_calls() {
        let mock = MockExtractionClient::failing("quota exceeded");
        assert!(mock.generate_from_pdf("p", b"x").await.is_err());
        assert_eq!(mock.calls(), 1);
    }
}

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};

use super::{GenerateRequest, GenerationBackend, Turn};
use crate::error::GenerationError;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorBody,
}

#[derive(Deserialize)]
struct GeminiErrorBody {
    message: Option<String>,
    status: Option<String>,
}

impl GeminiContent {
    fn text(role: Option<&str>, text: &str) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![GeminiPart { text: Some(text.to_string()) }],
        }
    }
}

impl From<&Turn> for GeminiContent {
    fn from(turn: &Turn) -> Self {
        GeminiContent::text(Some(turn.role.as_str()), &turn.text)
    }
}

impl From<&GenerateRequest> for GeminiRequest {
    fn from(request: &GenerateRequest) -> Self {
        Self {
            system_instruction: GeminiContent::text(None, &request.system_instruction),
            contents: request.contents.iter().map(GeminiContent::from).collect(),
            generation_config: GenerationConfig { temperature: request.temperature },
        }
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: BASE_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// The key travels in a header, never in the URL.
    fn build_request(&self, request: &GenerateRequest) -> RequestBuilder {
        let url = format!("{}/{}:generateContent", self.base_url, request.model);
        self.client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&GeminiRequest::from(request))
    }

    pub fn list_models() -> Vec<String> {
        vec![
            "gemini-2.5-flash".to_string(),
            "gemini-2.5-pro".to_string(),
            "gemini-2.0-flash".to_string(),
        ]
    }
}

#[async_trait]
impl GenerationBackend for GeminiClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, GenerationError> {
        let response = self.build_request(request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(GenerationError::Upstream {
                status,
                message: error_message(&text),
            });
        }

        let text = response.text().await?;
        extract_text(&text)
    }
}

/// Concatenates the text parts of the first candidate.
fn extract_text(body: &str) -> Result<String, GenerationError> {
    let parsed: GeminiResponse =
        serde_json::from_str(body).map_err(|e| GenerationError::Decode(e.to_string()))?;

    Ok(parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default())
}

/// Pulls a readable message out of Google's error envelope, falling back to the raw body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<GeminiErrorEnvelope>(body) {
        Ok(envelope) => {
            let message = envelope.error.message.unwrap_or_else(|| body.to_string());
            match envelope.error.status {
                Some(status) if !status.is_empty() => format!("{}: {}", status, message),
                _ => message,
            }
        }
        Err(_) => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> GenerateRequest {
        GenerateRequest {
            model: "gemini-2.5-flash".to_string(),
            system_instruction: "Be punchy.".to_string(),
            temperature: 0.7,
            contents: vec![
                Turn::user("i love mondays"),
                Turn::model("mondays rule"),
                Turn::user("shorter"),
            ],
        }
    }

    #[test]
    fn test_request_shape() {
        let body = serde_json::to_value(GeminiRequest::from(&request())).unwrap();

        assert_eq!(body["systemInstruction"], json!({ "parts": [{ "text": "Be punchy." }] }));
        assert_eq!(body["contents"][0], json!({ "role": "user", "parts": [{ "text": "i love mondays" }] }));
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"].as_array().unwrap().len(), 3);
        assert!((body["generationConfig"]["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_key_sent_as_header() {
        let built = GeminiClient::new("SECRETKEY123")
            .build_request(&request())
            .build()
            .unwrap();

        assert_eq!(
            built.url().as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(built.headers()["x-goog-api-key"], "SECRETKEY123");
    }

    #[tokio::test]
    async fn test_transport_error_hides_key() {
        // Nothing listens on port 1, so the connection is refused
        let client = GeminiClient::new("SECRETKEY123").with_base_url("http://127.0.0.1:1/v1beta/models");

        let err = client.generate(&request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Transport(_)));
        let text = err.to_string();
        assert!(!text.contains("SECRETKEY123"), "{}", text);
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let body = json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "hello " }, { "text": "world" }] }
            }]
        })
        .to_string();
        assert_eq!(extract_text(&body).unwrap(), "hello world");
    }

    #[test]
    fn test_extract_text_without_candidates() {
        assert_eq!(extract_text("{}").unwrap(), "");
        let blocked = json!({ "candidates": [{ "finishReason": "SAFETY" }] }).to_string();
        assert_eq!(extract_text(&blocked).unwrap(), "");
    }

    #[test]
    fn test_extract_text_rejects_garbage() {
        assert!(matches!(extract_text("not json"), Err(GenerationError::Decode(_))));
    }

    #[test]
    fn test_error_message_from_envelope() {
        let body = json!({
            "error": { "code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT" }
        })
        .to_string();
        assert_eq!(error_message(&body), "INVALID_ARGUMENT: API key not valid.");
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }
}

use crate::domain::models::ChatRole;
use crate::infrastructure::error::JournalError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use url::Url;

pub const DEFAULT_GENERATION_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub system_prompt: Option<String>,
    pub history: Vec<ChatTurn>,
    pub prompt: String,
    pub json_response: bool,
}

#[async_trait]
pub trait TextGenerationClient: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, JournalError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestGeminiClient {
    client: Client,
    base_url: Url,
    api_key: String,
    model: String,
}

impl ReqwestGeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, JournalError> {
        Self::with_base_url(DEFAULT_GENERATION_BASE_URL, api_key, model)
    }

    pub fn with_base_url(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, JournalError> {
        let base_url = Url::parse(base_url).map_err(|error| {
            JournalError::InvalidConfig(format!("invalid generation base url: {error}"))
        })?;
        Ok(Self {
            client: Client::new(),
            base_url,
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    fn generate_endpoint(&self) -> Result<Url, JournalError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                JournalError::Generation("generation base URL cannot be a base".to_string())
            })?;
            path.push("v1beta");
            path.push("models");
            path.push(&format!("{}:generateContent", self.model));
        }
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }

    fn request_body(request: &GenerationRequest) -> Value {
        let mut contents: Vec<Value> = request
            .history
            .iter()
            .map(|turn| {
                json!({
                    "role": turn.role.as_str(),
                    "parts": [{ "text": turn.text }],
                })
            })
            .collect();
        contents.push(json!({
            "role": ChatRole::User.as_str(),
            "parts": [{ "text": request.prompt }],
        }));

        let mut body = json!({ "contents": contents });
        if let Some(system_prompt) = &request.system_prompt {
            body["systemInstruction"] = json!({ "parts": [{ "text": system_prompt }] });
        }
        if request.json_response {
            body["generationConfig"] = json!({ "responseMimeType": "application/json" });
        }
        body
    }

    fn extract_text(body: &Value) -> Result<String, JournalError> {
        let text = body
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|candidates| candidates.first())
            .and_then(|candidate| candidate.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .and_then(|parts| parts.first())
            .and_then(|part| part.get("text"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                JournalError::Generation("response carried no candidate text".to_string())
            })?;
        Ok(text.to_string())
    }
}

#[async_trait]
impl TextGenerationClient for ReqwestGeminiClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, JournalError> {
        if request.prompt.trim().is_empty() {
            return Err(JournalError::Generation("prompt must not be empty".to_string()));
        }

        let url = self.generate_endpoint()?;
        let body = Self::request_body(&request);
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|error| JournalError::Generation(format!("generation request failed: {error}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|error| JournalError::Generation(format!("failed to read response body: {error}")))?;
        if !status.is_success() {
            return Err(JournalError::Generation(format!(
                "generation failed: http {}; body={text}",
                status.as_u16()
            )));
        }

        let parsed: Value = serde_json::from_str(&text)
            .map_err(|error| JournalError::Generation(format!("invalid response json: {error}")))?;
        Self::extract_text(&parsed)
    }
}

//! HTTP-backed reasoner for Gemini and OpenAI-compatible endpoints.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::reasoner::Reasoner;

#[derive(Debug, Clone)]
pub enum ReasonerProvider {
    Gemini,
    OpenAiCompatible { endpoint: String },
}

pub struct HttpReasoner {
    provider: ReasonerProvider,
    api_key: String,
    model: String,
    client: Client,
}

impl HttpReasoner {
    pub fn new(provider: ReasonerProvider, api_key: String, model: String) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(15))
            .timeout(std::time::Duration::from_secs(120))
            .tcp_nodelay(true)
            .build()?;

        tracing::info!(provider = ?provider, model = %model, "creating HTTP reasoner");

        Ok(Self {
            provider,
            api_key,
            model,
            client,
        })
    }

    fn endpoint(&self) -> String {
        match &self.provider {
            ReasonerProvider::Gemini => format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
                self.model
            ),
            ReasonerProvider::OpenAiCompatible { endpoint } => endpoint.clone(),
        }
    }

    /// Parse a response body as JSON, returning a clear error if the server
    /// returned HTML (e.g. a gateway error page) instead of valid JSON.
    async fn parse_json_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        endpoint: &str,
    ) -> Result<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| anyhow!("Failed to read response body from {}: {}", endpoint, e))?;

        let trimmed = body.trim_start();
        if trimmed.starts_with('<') || trimmed.starts_with("<!") {
            let preview: String = trimmed.chars().take(200).collect();
            return Err(anyhow!(
                "Endpoint {} returned HTML instead of JSON (HTTP {}): {}",
                endpoint,
                status,
                preview
            ));
        }

        serde_json::from_str::<T>(&body).map_err(|e| {
            let preview: String = body.chars().take(300).collect();
            anyhow!(
                "Failed to parse JSON from {} (HTTP {}): {}. Response body: {}",
                endpoint,
                status,
                e,
                preview
            )
        })
    }

    async fn gemini_complete(&self, prompt: &str) -> Result<String> {
        let request = json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "temperature": 0.1,
                "maxOutputTokens": 2048,
            }
        });

        let endpoint = self.endpoint();
        let response = self
            .client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_error(e, &endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let error = response.text().await?;
            return Err(anyhow!("Gemini API error ({}): {}", status, error));
        }

        let result: GeminiResponse = Self::parse_json_response(response, &endpoint).await?;
        result
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| anyhow!("No candidates returned from Gemini"))
    }

    async fn openai_complete(&self, prompt: &str) -> Result<String> {
        let request = json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "temperature": 0.1,
            "max_tokens": 2048,
            "stream": false
        });

        let endpoint = self.endpoint();
        let response = self
            .client
            .post(&endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_error(e, &endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let error = response.text().await?;
            return Err(anyhow!("API error ({}): {}", status, error));
        }

        let result: OpenAiResponse = Self::parse_json_response(response, &endpoint).await?;
        result
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| anyhow!("No choices returned from API"))
    }
}

fn map_send_error(e: reqwest::Error, endpoint: &str) -> anyhow::Error {
    if e.is_timeout() {
        anyhow!("Request to {} timed out, check network connectivity", endpoint)
    } else if e.is_connect() {
        anyhow!("Failed to connect to {}: {}", endpoint, e)
    } else {
        anyhow!("Request to {} failed: {}", endpoint, e)
    }
}

#[async_trait]
impl Reasoner for HttpReasoner {
    async fn complete(&self, prompt: &str) -> Result<String> {
        tracing::debug!(
            endpoint = %self.endpoint(),
            prompt_len = prompt.len(),
            "sending reasoner request"
        );
        match &self.provider {
            ReasonerProvider::Gemini => self.gemini_complete(prompt).await,
            ReasonerProvider::OpenAiCompatible { .. } => self.openai_complete(prompt).await,
        }
    }
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: String,
}

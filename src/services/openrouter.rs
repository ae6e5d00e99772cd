use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::PipelineError;
use super::gateway::{ModelBackend, ModelRequest};

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ContentPart {
    Text {
        #[serde(rename = "type")]
        content_type: String,
        text: String,
    },
    ImageUrl {
        #[serde(rename = "type")]
        content_type: String,
        image_url: ImageData,
    },
}

#[derive(Debug, Serialize)]
struct ImageData {
    url: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    content: Option<String>,
}

/// OpenAI-compatible chat completions backend (OpenRouter by default).
pub struct OpenRouterService {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OpenRouterService {
    pub fn new(base_url: String, model: String, timeout: Duration) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Configuration(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            client,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_request(&self, request: ModelRequest) -> ChatRequest {
        let mut content = vec![ContentPart::Text {
            content_type: "text".to_string(),
            text: request.prompt,
        }];
        content.extend(request.media.iter().map(|media| ContentPart::ImageUrl {
            content_type: "image_url".to_string(),
            image_url: ImageData { url: media.data_url() },
        }));

        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content,
            }],
            max_tokens: request.max_tokens,
            response_format: ResponseFormat {
                format_type: "json_object".to_string(),
            },
        }
    }
}

#[async_trait::async_trait]
impl ModelBackend for OpenRouterService {
    async fn complete(&self, credential: &str, request: ModelRequest) -> Result<String, PipelineError> {
        let template = request.template.clone();
        let chat_request = self.build_request(request);

        log::info!("🤖 Sending '{}' request to OpenRouter with model: {}", template, self.model);
        if let Ok(payload) = serde_json::to_string(&chat_request) {
            log::debug!("📤 Request payload size: {} bytes", payload.len());
        }

        let response = self
            .client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", credential))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", "https://github.com/nutrition-lens")
            .header("X-Title", "Nutrition Lens")
            .json(&chat_request)
            .send()
            .await?;

        let status = response.status();
        log::debug!("📥 OpenRouter response status: {}", status);

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            log::error!("❌ OpenRouter API error response: {}", error_text);
            return Err(PipelineError::Upstream(format!(
                "OpenRouter API error ({}): {}",
                status, error_text
            )));
        }

        let response_text = response.text().await?;
        log::debug!("📄 Raw OpenRouter response size: {} bytes", response_text.len());

        parse_completion(&response_text)
    }
}

fn parse_completion(body: &str) -> Result<String, PipelineError> {
    let chat_response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| PipelineError::Upstream(format!("malformed completion envelope: {}", e)))?;

    chat_response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| PipelineError::Upstream("completion contained no content".to_string()))
}

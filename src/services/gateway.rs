use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::error::PipelineError;
use super::schema;
use super::templates::PromptTemplate;
use crate::models::InlineMedia;

/// A fully rendered request, ready for the wire.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub template: String,
    pub prompt: String,
    pub media: Vec<InlineMedia>,
    pub max_tokens: u32,
}

/// Transport to a language/vision model. Returns the raw completion text.
#[async_trait::async_trait]
pub trait ModelBackend: Send + Sync {
    async fn complete(&self, credential: &str, request: ModelRequest) -> Result<String, PipelineError>;
}

/// Single entry point to the inference service.
///
/// Checks the credential, validates input against the template, bounds the
/// call with a timeout and validates the response before decoding it.
pub struct InferenceGateway {
    backend: Arc<dyn ModelBackend>,
    credential: Option<String>,
    timeout: Duration,
    max_tokens: u32,
}

impl InferenceGateway {
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        credential: Option<String>,
        timeout: Duration,
        max_tokens: u32,
    ) -> Self {
        Self {
            backend,
            credential,
            timeout,
            max_tokens,
        }
    }

    pub async fn invoke<I, O>(&self, template: &PromptTemplate, input: &I) -> Result<O, PipelineError>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        self.invoke_with_media(template, input, Vec::new()).await
    }

    pub async fn invoke_with_media<I, O>(
        &self,
        template: &PromptTemplate,
        input: &I,
        media: Vec<InlineMedia>,
    ) -> Result<O, PipelineError>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        let credential = self
            .credential
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                PipelineError::Configuration("OPENROUTER_API_KEY is not set. Please set a valid API key.".to_string())
            })?;

        let input = serde_json::to_value(input)
            .map_err(|e| PipelineError::Input(format!("cannot serialize input: {}", e)))?;
        schema::check_input(&template.input, &input).map_err(|reason| {
            PipelineError::Input(format!("{} (template '{}')", reason, template.name))
        })?;

        let request = ModelRequest {
            template: template.name.clone(),
            prompt: template.render(&input),
            media,
            max_tokens: self.max_tokens,
        };

        log::info!("🤖 Invoking template '{}'", template.name);
        log::debug!(
            "📤 Prompt size: {} chars, inline media: {}",
            request.prompt.len(),
            request.media.len()
        );

        let completion = match tokio::time::timeout(self.timeout, self.backend.complete(credential, request)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                log::warn!("⚠️ Template '{}' failed upstream: {}", template.name, e);
                return Err(e);
            }
            Err(_) => {
                log::warn!("⏱️ Template '{}' timed out after {:?}", template.name, self.timeout);
                return Err(PipelineError::Upstream(format!(
                    "no response within {} seconds",
                    self.timeout.as_secs_f32()
                )));
            }
        };

        let output = extract_json(&completion)
            .ok_or_else(|| "response is not valid JSON".to_string())
            .and_then(|value| schema::conform_output(&template.output, value))
            .and_then(|value| serde_json::from_value(value).map_err(|e| e.to_string()))
            .map_err(|reason| {
                log::error!("❌ Schema violation for template '{}': {}", template.name, reason);
                log::debug!("📄 Offending completion: {}", completion);
                PipelineError::schema(&template.name, reason)
            })?;

        log::info!("✅ Template '{}' returned a valid response", template.name);
        Ok(output)
    }
}

/// Pulls the JSON object out of a completion, tolerating code fences and prose.
fn extract_json(completion: &str) -> Option<Value> {
    let trimmed = completion.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    // First object that parses, ignoring whatever prose follows it.
    trimmed.match_indices('{').find_map(|(start, _)| {
        serde_json::Deserializer::from_str(&trimmed[start..])
            .into_iter::<Value>()
            .next()?
            .ok()
            .filter(Value::is_object)
    })
}

pub mod error;
pub mod gateway; // Inference gateway (credential, schema, timeout)
pub mod openrouter; // OpenRouter chat completions backend
pub mod schema;
pub mod templates;

#[cfg(test)]
pub mod mock;

pub use error::PipelineError;
pub use gateway::InferenceGateway;
pub use openrouter::OpenRouterService;
pub use templates::PromptTemplate;

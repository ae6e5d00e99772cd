use thiserror::Error;

/// Failures surfaced by the gateway and the pipeline stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing or invalid credential. Fatal for the whole pipeline.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Malformed input to a stage; the caller has to fix it before retrying.
    #[error("invalid input: {0}")]
    Input(String),

    /// The inference service failed or timed out.
    #[error("inference service error: {0}")]
    Upstream(String),

    /// The model answered, but not in the declared shape.
    #[error("response for template '{template}' violates its schema: {reason}")]
    SchemaViolation { template: String, reason: String },

    #[error("nutrition aggregation failed: {0}")]
    Aggregation(#[source] Box<PipelineError>),
}

impl PipelineError {
    pub fn schema(template: &str, reason: impl Into<String>) -> Self {
        PipelineError::SchemaViolation {
            template: template.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether re-issuing the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Upstream(_) | PipelineError::SchemaViolation { .. } => true,
            PipelineError::Aggregation(inner) => inner.is_retryable(),
            PipelineError::Configuration(_) | PipelineError::Input(_) => false,
        }
    }

    /// Stable machine-readable name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Configuration(_) => "configuration_error",
            PipelineError::Input(_) => "input_error",
            PipelineError::Upstream(_) => "upstream_error",
            PipelineError::SchemaViolation { .. } => "schema_violation",
            PipelineError::Aggregation(_) => "aggregation_error",
        }
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PipelineError::Upstream(format!("request timed out: {}", e))
        } else {
            PipelineError::Upstream(e.to_string())
        }
    }
}

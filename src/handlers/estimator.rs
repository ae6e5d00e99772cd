use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::services::{templates, InferenceGateway, PipelineError, PromptTemplate};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EstimateInput<'a> {
    food_item_name: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EstimateOutput {
    estimated_weight: String,
}

/// Estimates a human-readable serving quantity for one food item.
pub struct QuantityEstimator {
    gateway: Arc<InferenceGateway>,
    template: PromptTemplate,
}

impl QuantityEstimator {
    pub fn new(gateway: Arc<InferenceGateway>) -> Self {
        Self {
            gateway,
            template: templates::estimate_quantity(),
        }
    }

    pub async fn estimate(&self, name: &str) -> Result<String, PipelineError> {
        let output: EstimateOutput = self
            .gateway
            .invoke(&self.template, &EstimateInput { food_item_name: name.trim() })
            .await?;

        let quantity = output.estimated_weight.trim().to_string();
        if quantity.is_empty() {
            return Err(PipelineError::schema(&self.template.name, "estimatedWeight is blank"));
        }

        log::debug!("⚖️ Estimated '{}' as {}", name, quantity);
        Ok(quantity)
    }

    /// Estimates every name concurrently. The result has one entry per input,
    /// in input order; a failure affects only its own entry.
    pub async fn estimate_all(&self, names: &[String]) -> Vec<Result<String, PipelineError>> {
        log::info!("⚖️ Estimating quantities for {} item(s)", names.len());
        join_all(names.iter().map(|name| self.estimate(name))).await
    }
}

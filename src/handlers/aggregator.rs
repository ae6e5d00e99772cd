use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::{FoodItem, NutritionReport};
use crate::services::{templates, InferenceGateway, PipelineError, PromptTemplate};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AggregateInput<'a> {
    food_items: Vec<ItemInput<'a>>,
}

#[derive(Serialize)]
struct ItemInput<'a> {
    name: &'a str,
    quantity: &'a str,
}

#[derive(Deserialize)]
struct AggregateOutput {
    nutrition: IndexMap<String, String>,
}

/// Produces one combined nutrition report for a list of food items.
pub struct NutritionAggregator {
    gateway: Arc<InferenceGateway>,
    fields: Vec<String>,
    template: PromptTemplate,
}

impl NutritionAggregator {
    pub fn new(gateway: Arc<InferenceGateway>, fields: Vec<String>) -> Self {
        let template = templates::nutrition_summary(&fields);
        Self {
            gateway,
            fields,
            template,
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub async fn aggregate(&self, items: &[FoodItem]) -> Result<NutritionReport, PipelineError> {
        let food_items: Vec<ItemInput> = items
            .iter()
            .filter(|item| !item.name.trim().is_empty())
            .map(|item| ItemInput {
                name: item.name.trim(),
                quantity: match item.quantity.trim() {
                    "" => "unknown",
                    quantity => quantity,
                },
            })
            .collect();

        if food_items.is_empty() {
            return Err(PipelineError::Input("no food items to aggregate".to_string()));
        }

        let unestimated = food_items.iter().filter(|i| i.quantity == "unknown").count();
        if unestimated > 0 {
            log::warn!("⚠️ Aggregating {} item(s) without a quantity, estimate will be rough", unestimated);
        }
        log::info!("🧮 Aggregating nutrition for {} item(s)", food_items.len());

        let output: AggregateOutput = self
            .gateway
            .invoke(&self.template, &AggregateInput { food_items })
            .await
            .map_err(|e| match e {
                fatal @ (PipelineError::Configuration(_) | PipelineError::Input(_)) => fatal,
                other => PipelineError::Aggregation(Box::new(other)),
            })?;

        let report = NutritionReport::from_values(&self.fields, output.nutrition);
        log::info!("📊 Nutrition report ready with {} field(s)", report.len());
        Ok(report)
    }
}

use serde::Serialize;
use std::sync::Arc;

use crate::handlers::session::{EstimateTarget, EstimateTicket, Outcome, PipelineSession};
use crate::handlers::{FoodIdentifier, FoodRecommender, NutritionAggregator, QuantityEstimator};
use crate::models::{FoodItem, ImageInput, NutritionReport, QuantityWarning, RecommendedFood};
use crate::services::{InferenceGateway, PipelineError};

/// Everything produced by one end-to-end run.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub items: Vec<FoodItem>,
    pub warnings: Vec<QuantityWarning>,
    /// `None` when the image contained no food.
    pub report: Option<NutritionReport>,
}

/// The operations the UI layer calls. Holds no per-user state; sessions are
/// owned by the caller.
pub struct Pipeline {
    identifier: FoodIdentifier,
    estimator: QuantityEstimator,
    aggregator: NutritionAggregator,
    recommender: FoodRecommender,
}

impl Pipeline {
    pub fn new(gateway: Arc<InferenceGateway>, nutrition_fields: Vec<String>) -> Self {
        Self {
            identifier: FoodIdentifier::new(gateway.clone()),
            estimator: QuantityEstimator::new(gateway.clone()),
            aggregator: NutritionAggregator::new(gateway.clone(), nutrition_fields),
            recommender: FoodRecommender::new(gateway),
        }
    }

    pub fn nutrition_fields(&self) -> &[String] {
        self.aggregator.fields()
    }

    pub async fn identify(&self, image: &ImageInput) -> Result<Vec<String>, PipelineError> {
        self.identifier.identify(image).await
    }

    pub async fn estimate_quantity(&self, name: &str) -> Result<String, PipelineError> {
        self.estimator.estimate(name).await
    }

    /// Fills in every blank quantity concurrently. Failed items keep an empty
    /// quantity and are reported as warnings.
    pub async fn estimate_quantities(&self, mut items: Vec<FoodItem>) -> (Vec<FoodItem>, Vec<QuantityWarning>) {
        let targets: Vec<usize> = (0..items.len()).filter(|&i| items[i].needs_quantity()).collect();
        let names: Vec<String> = targets.iter().map(|&i| items[i].name.trim().to_string()).collect();

        let results = self.estimator.estimate_all(&names).await;

        let mut warnings = Vec::new();
        for ((index, name), result) in targets.into_iter().zip(names).zip(results) {
            match result {
                Ok(quantity) => items[index].quantity = quantity,
                Err(e) => {
                    log::warn!("⚠️ Quantity estimation failed for '{}': {}", name, e);
                    items[index].quantity.clear();
                    warnings.push(QuantityWarning::failed(index, name, &e));
                }
            }
        }

        (items, warnings)
    }

    pub async fn aggregate(&self, items: &[FoodItem]) -> Result<NutritionReport, PipelineError> {
        self.aggregator.aggregate(items).await
    }

    pub async fn recommend(
        &self,
        nutrient_theme: &str,
        food_themes: &[String],
    ) -> Result<Vec<RecommendedFood>, PipelineError> {
        self.recommender.recommend(nutrient_theme, food_themes).await
    }

    pub async fn execute_estimate(&self, ticket: &EstimateTicket) -> Vec<Result<String, PipelineError>> {
        self.estimator.estimate_all(&ticket.names()).await
    }

    pub async fn run_identify(&self, session: &mut PipelineSession) -> Result<Outcome<()>, PipelineError> {
        let ticket = session.begin_identify()?;
        let result = self.identify(&ticket.image).await;
        session.finish_identify(ticket, result)
    }

    pub async fn run_estimate(
        &self,
        session: &mut PipelineSession,
        target: EstimateTarget,
    ) -> Result<Outcome<Vec<QuantityWarning>>, PipelineError> {
        let ticket = session.begin_estimate(target)?;
        let results = self.execute_estimate(&ticket).await;
        Ok(session.finish_estimate(ticket, results))
    }

    pub async fn run_aggregate(
        &self,
        session: &mut PipelineSession,
    ) -> Result<Outcome<NutritionReport>, PipelineError> {
        let ticket = session.begin_aggregate()?;
        let result = self.aggregate(&ticket.items).await;
        session.finish_aggregate(ticket, result)
    }

    /// Runs identify → estimate → aggregate on one image without user edits.
    pub async fn analyze(&self, image: ImageInput) -> Result<Analysis, PipelineError> {
        let mut session = PipelineSession::new();
        session.capture_image(image);

        self.run_identify(&mut session).await?;
        if session.items().is_empty() {
            log::info!("🤷 No food found in image");
            return Ok(Analysis {
                items: Vec::new(),
                warnings: Vec::new(),
                report: None,
            });
        }

        self.run_estimate(&mut session, EstimateTarget::Missing).await?;
        let report = self.run_aggregate(&mut session).await?.applied();

        Ok(Analysis {
            items: session.items().to_vec(),
            warnings: session.warnings().to_vec(),
            report,
        })
    }
}

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::RecommendedFood;
use crate::services::{templates, InferenceGateway, PipelineError, PromptTemplate};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecommendInput<'a> {
    nutrient_theme: &'a str,
    food_themes: &'a [String],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendOutput {
    recommended_foods: Vec<RecommendedFood>,
}

/// Suggests foods and dishes rich in a given nutrient.
pub struct FoodRecommender {
    gateway: Arc<InferenceGateway>,
    template: PromptTemplate,
}

impl FoodRecommender {
    pub fn new(gateway: Arc<InferenceGateway>) -> Self {
        Self {
            gateway,
            template: templates::food_recommendations(),
        }
    }

    pub async fn recommend(
        &self,
        nutrient_theme: &str,
        food_themes: &[String],
    ) -> Result<Vec<RecommendedFood>, PipelineError> {
        log::info!("🥗 Requesting {} recommendations for themes {:?}", nutrient_theme, food_themes);

        let output: RecommendOutput = self
            .gateway
            .invoke(
                &self.template,
                &RecommendInput {
                    nutrient_theme: nutrient_theme.trim(),
                    food_themes,
                },
            )
            .await?;

        Ok(output
            .recommended_foods
            .into_iter()
            .filter(|food| !food.name.trim().is_empty())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mock::ScriptedBackend;
    use std::time::Duration;

    fn recommender(backend: Arc<ScriptedBackend>) -> FoodRecommender {
        let gateway = InferenceGateway::new(backend, Some("key".to_string()), Duration::from_secs(1), 800);
        FoodRecommender::new(Arc::new(gateway))
    }

    #[tokio::test]
    async fn test_recommendations() {
        let backend = Arc::new(ScriptedBackend::new().reply(
            templates::FOOD_RECOMMENDATIONS,
            r#"{"recommendedFoods": [
                {"name": "Lentils", "description": "Plant protein", "nutrientAmount": "18g per 100g"},
                {"name": "Tofu", "description": "Complete protein", "nutrientAmount": 8}
            ]}"#,
        ));

        let foods = recommender(backend.clone())
            .recommend("Protein", &["Veg".to_string()])
            .await
            .unwrap();

        assert_eq!(foods.len(), 2);
        assert_eq!(foods[0].name, "Lentils");
        assert_eq!(foods[1].nutrient_amount, "8");
        assert!(backend.prompts()[0].contains("Nutrient Theme: Protein"));
    }

    #[tokio::test]
    async fn test_blank_theme_is_input_error() {
        let backend = Arc::new(ScriptedBackend::new());

        let result = recommender(backend.clone()).recommend(" ", &[]).await;

        assert!(matches!(result, Err(PipelineError::Input(_))));
        assert_eq!(backend.calls(), 0);
    }
}

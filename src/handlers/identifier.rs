use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::ImageInput;
use crate::services::{templates, InferenceGateway, PipelineError, PromptTemplate};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdentifyInput<'a> {
    image_type: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentifyOutput {
    food_items: Vec<String>,
}

/// Lists the food items visible in an image.
pub struct FoodIdentifier {
    gateway: Arc<InferenceGateway>,
    template: PromptTemplate,
}

impl FoodIdentifier {
    pub fn new(gateway: Arc<InferenceGateway>) -> Self {
        Self {
            gateway,
            template: templates::identify_food(),
        }
    }

    /// Returns the identified names, unordered. An image without food yields
    /// an empty list; undecodable image data fails before any request is made.
    pub async fn identify(&self, image: &ImageInput) -> Result<Vec<String>, PipelineError> {
        // Full decode of a large photo is CPU bound; keep it off the async workers.
        let owned = image.clone();
        let media = tokio::task::spawn_blocking(move || owned.to_inline_media())
            .await
            .map_err(|e| PipelineError::Input(format!("image check did not complete: {}", e)))??;
        log::debug!("📸 Identifying food in {} image ({} bytes)", media.media_type, image.data.len());

        let input = IdentifyInput {
            image_type: &media.media_type,
        };
        let output: IdentifyOutput = self
            .gateway
            .invoke_with_media(&self.template, &input, vec![media.clone()])
            .await?;

        let names: Vec<String> = output
            .food_items
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        log::info!("🍽️ Identified {} food item(s): {:?}", names.len(), names);
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample_png;
    use crate::services::mock::ScriptedBackend;
    use std::time::Duration;

    fn identifier(backend: Arc<ScriptedBackend>) -> FoodIdentifier {
        let gateway = InferenceGateway::new(backend, Some("key".to_string()), Duration::from_secs(1), 500);
        FoodIdentifier::new(Arc::new(gateway))
    }

    #[tokio::test]
    async fn test_identify_returns_non_empty_names() {
        let backend = Arc::new(ScriptedBackend::new().reply(
            templates::IDENTIFY_FOOD,
            r#"{"foodItems": ["Chicken Breast", " Rice ", "", "Rice"]}"#,
        ));

        let names = identifier(backend.clone())
            .identify(&ImageInput::new(sample_png(), "image/png"))
            .await
            .unwrap();

        assert_eq!(names, vec!["Chicken Breast", "Rice", "Rice"]);

        let request = &backend.requests()[0];
        assert_eq!(request.media.len(), 1);
        assert_eq!(request.media[0].media_type, "image/png");
        assert!(request.prompt.contains("(image/png)"));
    }

    #[tokio::test]
    async fn test_no_food_is_empty_success() {
        let backend = Arc::new(ScriptedBackend::new().reply(templates::IDENTIFY_FOOD, r#"{"foodItems": []}"#));

        let names = identifier(backend)
            .identify(&ImageInput::new(sample_png(), "image/png"))
            .await
            .unwrap();

        assert!(names.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_image_fails_before_gateway() {
        let backend = Arc::new(ScriptedBackend::new().reply(templates::IDENTIFY_FOOD, r#"{"foodItems": []}"#));

        let result = identifier(backend.clone())
            .identify(&ImageInput::new(b"not an image".to_vec(), "image/jpeg"))
            .await;

        assert!(matches!(result, Err(PipelineError::Input(_))));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_mislabelled_upload_sent_with_detected_type() {
        let backend = Arc::new(ScriptedBackend::new().reply(templates::IDENTIFY_FOOD, r#"{"foodItems": ["Toast"]}"#));

        let names = identifier(backend.clone())
            .identify(&ImageInput::new(sample_png(), "image/jpeg"))
            .await
            .unwrap();

        assert_eq!(names, vec!["Toast"]);
        assert_eq!(backend.requests()[0].media[0].media_type, "image/png");
    }
}

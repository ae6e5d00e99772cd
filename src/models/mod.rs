use base64::{engine::general_purpose, Engine};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::services::PipelineError;

/// Nutrition fields requested when `NUTRITION_FIELDS` is not set.
pub const DEFAULT_NUTRITION_FIELDS: [&str; 12] = [
    "calories",
    "protein",
    "carbohydrates",
    "fiber",
    "calcium",
    "iron",
    "vitaminA",
    "vitaminB",
    "vitaminC",
    "vitaminD",
    "potassium",
    "overall",
];

/// Placeholder for a report field the model did not fill in.
pub const UNKNOWN_VALUE: &str = "unknown";

/// An encoded image as captured or uploaded by the user.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub data: Vec<u8>,
    pub media_type: String,
}

/// Image bytes that passed the decodability check, ready to be inlined.
#[derive(Debug, Clone)]
pub struct InlineMedia {
    pub media_type: String,
    pub base64: String,
}

impl InlineMedia {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.base64)
    }
}

impl ImageInput {
    pub fn new(data: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            data,
            media_type: media_type.into(),
        }
    }

    /// Parses a `data:<mime>;base64,<payload>` URL as produced by browsers.
    pub fn from_data_url(url: &str) -> Result<Self, PipelineError> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| PipelineError::Input("image is not a data URL".to_string()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| PipelineError::Input("data URL has no payload".to_string()))?;
        let media_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| PipelineError::Input("data URL is not base64 encoded".to_string()))?;

        Self::from_base64(payload, media_type)
    }

    pub fn from_base64(payload: &str, media_type: &str) -> Result<Self, PipelineError> {
        let data = general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| PipelineError::Input(format!("invalid base64 image payload: {}", e)))?;

        Ok(Self::new(data, media_type))
    }

    /// Reads an image file, guessing the media type from its extension.
    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let data = std::fs::read(path)
            .map_err(|e| PipelineError::Input(format!("cannot read {}: {}", path.display(), e)))?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        let media_type = match extension.as_str() {
            "png" => "image/png",
            "webp" => "image/webp",
            "gif" => "image/gif",
            _ => "image/jpeg",
        };

        Ok(Self::new(data, media_type))
    }

    /// Checks that the payload decodes as an image and encodes it for the gateway.
    ///
    /// The detected format wins over the declared media type; browsers and
    /// camera captures routinely mislabel PNG data as JPEG.
    pub fn to_inline_media(&self) -> Result<InlineMedia, PipelineError> {
        if self.data.is_empty() {
            return Err(PipelineError::Input("image payload is empty".to_string()));
        }

        let format = image::guess_format(&self.data)
            .map_err(|e| PipelineError::Input(format!("unrecognized image data: {}", e)))?;
        image::load_from_memory_with_format(&self.data, format)
            .map_err(|e| PipelineError::Input(format!("image cannot be decoded: {}", e)))?;

        let detected = format.to_mime_type();
        let declared = self.media_type.trim();
        if declared.is_empty() {
            log::debug!("🖼️ No media type declared, using detected {}", detected);
        } else if !declared.eq_ignore_ascii_case(detected) {
            log::warn!(
                "⚠️ Declared media type {} does not match image data ({}), using detected type",
                declared,
                detected
            );
        }

        Ok(InlineMedia {
            media_type: detected.to_string(),
            base64: general_purpose::STANDARD.encode(&self.data),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoodItem {
    pub name: String,
    #[serde(default)]
    pub quantity: String,
}

impl FoodItem {
    pub fn new(name: impl Into<String>, quantity: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity: quantity.into(),
        }
    }

    /// An identified item whose quantity has not been estimated yet.
    pub fn unestimated(name: impl Into<String>) -> Self {
        Self::new(name, "")
    }

    pub fn needs_quantity(&self) -> bool {
        !self.name.trim().is_empty() && self.quantity.trim().is_empty()
    }
}

/// Combined nutrition estimate for a set of food items.
///
/// Values are free text approximations such as "250-300 kcal". Field order
/// follows the configured field set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NutritionReport {
    fields: IndexMap<String, String>,
}

impl NutritionReport {
    /// Builds a report containing exactly `field_names`, taking values from
    /// `values` and filling the rest with [`UNKNOWN_VALUE`].
    pub fn from_values(field_names: &[String], mut values: IndexMap<String, String>) -> Self {
        let fields = field_names
            .iter()
            .map(|name| {
                let value = values
                    .swap_remove(name)
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| UNKNOWN_VALUE.to_string());
                (name.clone(), value)
            })
            .collect();

        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn calories(&self) -> Option<&str> {
        self.get("calories")
    }

    pub fn overall(&self) -> Option<&str> {
        self.get("overall")
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl std::fmt::Display for NutritionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (name, value) in self.iter() {
            writeln!(f, "{}: {}", name, value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedFood {
    pub name: String,
    pub description: String,
    pub nutrient_amount: String,
}

/// Soft failure recorded when one item's quantity could not be estimated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityWarning {
    pub index: usize,
    pub name: String,
    pub message: String,
}

impl QuantityWarning {
    pub fn failed(index: usize, name: String, error: &PipelineError) -> Self {
        Self {
            index,
            name,
            message: format!("Failed to estimate quantity ({}). Please enter it manually.", error),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_png() -> Vec<u8> {
    let pixels = image::RgbImage::from_pixel(2, 2, image::Rgb([200, 120, 40]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(pixels)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

use serde_json::Value;

use super::schema::{self, FieldKind, FieldSpec};

pub const IDENTIFY_FOOD: &str = "identifyFood";
pub const ESTIMATE_QUANTITY: &str = "estimateQuantity";
pub const NUTRITION_SUMMARY: &str = "nutritionSummary";
pub const FOOD_RECOMMENDATIONS: &str = "foodRecommendations";

/// A named prompt with typed input and output.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub name: String,
    /// Prompt text; `{{field}}` placeholders are filled from the input.
    pub instructions: String,
    pub input: Vec<FieldSpec>,
    pub output: Vec<FieldSpec>,
}

impl PromptTemplate {
    /// Full prompt: rendered instructions followed by the JSON response contract.
    pub fn render(&self, input: &Value) -> String {
        let mut prompt = self.instructions.clone();
        for field in &self.input {
            let placeholder = format!("{{{{{}}}}}", field.name);
            let value = input.get(&field.name).map(render_value).unwrap_or_default();
            prompt = prompt.replace(&placeholder, &value);
        }

        let contract = serde_json::to_string_pretty(&schema::skeleton(&self.output))
            .unwrap_or_else(|_| "{}".to_string());

        format!(
            "{}\n\nRespond with a single JSON object and nothing else, using exactly this structure:\n{}",
            prompt.trim_end(),
            contract
        )
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) if items.iter().all(Value::is_string) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Array(items) => items
            .iter()
            .map(|item| format!("- {}", render_value(item)))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(object) => object
            .iter()
            .map(|(k, v)| format!("{}: {}", k, render_value(v)))
            .collect::<Vec<_>>()
            .join(", "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn identify_food() -> PromptTemplate {
    PromptTemplate {
        name: IDENTIFY_FOOD.to_string(),
        instructions: "You are an AI assistant that identifies food items in an image.\n\
                       \n\
                       Given the attached image ({{imageType}}), identify the food items present in the image \
                       and return a list of those items. Name each item the way it would appear on a menu, \
                       e.g. \"Chicken Breast\" or \"Rice\". List an item twice if there are two servings of it. \
                       If the image contains no food, return an empty list."
            .to_string(),
        input: vec![FieldSpec::text("imageType", "The MIME type of the image")],
        output: vec![FieldSpec::text_list(
            "foodItems",
            "A food item identified in the image",
        )],
    }
}

pub fn estimate_quantity() -> PromptTemplate {
    PromptTemplate {
        name: ESTIMATE_QUANTITY.to_string(),
        instructions: "You are a helpful AI assistant that estimates the weight of food items.\n\
                       \n\
                       Given the following food item name, estimate the weight of a typical single serving \
                       and provide it in a short human-readable format.\n\
                       \n\
                       Food Item Name: {{foodItemName}}"
            .to_string(),
        input: vec![FieldSpec::text("foodItemName", "The name of the food item")],
        output: vec![FieldSpec::text(
            "estimatedWeight",
            "The estimated weight of the food item (e.g., \"100g\", \"1 medium\")",
        )],
    }
}

/// Aggregation template for the configured set of report fields.
pub fn nutrition_summary(field_names: &[String]) -> PromptTemplate {
    let report_fields = field_names
        .iter()
        .map(|name| FieldSpec::text(name.clone(), describe_nutrient(name)).optional())
        .collect();

    PromptTemplate {
        name: NUTRITION_SUMMARY.to_string(),
        instructions: "You are a nutritional expert. Estimate the combined nutritional content of the \
                       following meal, taking every item and its quantity into account. Report one set of \
                       figures for the whole meal, not per item. Give each value as a short human-readable \
                       approximation with units, such as a range. Where a quantity is unknown assume a \
                       typical serving. Use \"unknown\" only when no reasonable estimate is possible.\n\
                       \n\
                       Food Items:\n\
                       {{foodItems}}"
            .to_string(),
        input: vec![FieldSpec::new(
            "foodItems",
            FieldKind::ObjectList(vec![
                FieldSpec::text("name", "Food item name"),
                FieldSpec::text("quantity", "Quantity of the item").optional(),
            ]),
            "The food items in the meal",
        )],
        output: vec![FieldSpec::new(
            "nutrition",
            FieldKind::Object(report_fields),
            "Nutrition estimate for the whole meal",
        )],
    }
}

fn describe_nutrient(name: &str) -> String {
    match name {
        "calories" => "Estimated calorie range (e.g., \"450-550 kcal\")".to_string(),
        "overall" => "A one or two sentence overall assessment of the meal's nutritional balance".to_string(),
        "vitaminA" => "Approximate Vitamin A content".to_string(),
        "vitaminB" => "Approximate Vitamin B content".to_string(),
        "vitaminC" => "Approximate Vitamin C content".to_string(),
        "vitaminD" => "Approximate Vitamin D content".to_string(),
        other => format!("Approximate {} content", other),
    }
}

pub fn food_recommendations() -> PromptTemplate {
    PromptTemplate {
        name: FOOD_RECOMMENDATIONS.to_string(),
        instructions: "You are a nutritional expert. Based on the nutrient theme and food themes, provide a \
                       list of 5 food items and 5 dishes. For each food item and dish, provide a brief \
                       description of its nutritional benefits and the approximate amount of the key \
                       nutrient. Be specific and provide accurate nutrient values.\n\
                       \n\
                       Nutrient Theme: {{nutrientTheme}}\n\
                       Food Themes: {{foodThemes}}"
            .to_string(),
        input: vec![
            FieldSpec::text("nutrientTheme", "The nutrient theme (e.g., protein, calories)"),
            FieldSpec::text_list("foodThemes", "Food themes (e.g., veg, non-veg, seafood)"),
        ],
        output: vec![FieldSpec::new(
            "recommendedFoods",
            FieldKind::ObjectList(vec![
                FieldSpec::text("name", "The name of the recommended food item or dish"),
                FieldSpec::text("description", "A brief description of its nutritional benefits"),
                FieldSpec::text(
                    "nutrientAmount",
                    "The amount of the nutrient (e.g., \"10g of protein per 100g serving\")",
                ),
            ]),
            "Recommended food items and dishes",
        )],
    }
}

use serde_json::{Map, Value};

/// Shape of one field in a template's input or output.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Text,
    TextList,
    Object(Vec<FieldSpec>),
    ObjectList(Vec<FieldSpec>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    pub description: String,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            description: description.into(),
        }
    }

    pub fn text(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text, description)
    }

    pub fn text_list(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, FieldKind::TextList, description)
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Checks caller-supplied input. Required text must be non-blank.
pub fn check_input(fields: &[FieldSpec], input: &Value) -> Result<(), String> {
    let object = input
        .as_object()
        .ok_or_else(|| "input must be an object".to_string())?;
    check_input_fields(fields, object, "")
}

fn check_input_fields(fields: &[FieldSpec], object: &Map<String, Value>, prefix: &str) -> Result<(), String> {
    for field in fields {
        let path = format!("{}{}", prefix, field.name);
        let value = match object.get(&field.name) {
            Some(Value::Null) | None if field.required => {
                return Err(format!("missing field '{}'", path));
            }
            Some(Value::Null) | None => continue,
            Some(value) => value,
        };

        match &field.kind {
            FieldKind::Text => {
                let text = value
                    .as_str()
                    .ok_or_else(|| format!("field '{}' must be a string", path))?;
                if field.required && text.trim().is_empty() {
                    return Err(format!("field '{}' must not be blank", path));
                }
            }
            FieldKind::TextList => {
                let items = value
                    .as_array()
                    .ok_or_else(|| format!("field '{}' must be a list", path))?;
                if items.iter().any(|v| !v.is_string()) {
                    return Err(format!("field '{}' must contain only strings", path));
                }
            }
            FieldKind::Object(inner) => {
                let nested = value
                    .as_object()
                    .ok_or_else(|| format!("field '{}' must be an object", path))?;
                check_input_fields(inner, nested, &format!("{}.", path))?;
            }
            FieldKind::ObjectList(inner) => {
                let items = value
                    .as_array()
                    .ok_or_else(|| format!("field '{}' must be a list", path))?;
                for (i, item) in items.iter().enumerate() {
                    let nested = item
                        .as_object()
                        .ok_or_else(|| format!("field '{}[{}]' must be an object", path, i))?;
                    check_input_fields(inner, nested, &format!("{}[{}].", path, i))?;
                }
            }
        }
    }

    Ok(())
}

/// Validates a model response and returns it reduced to the declared fields.
///
/// Numbers and booleans in text positions become strings, and `null` in an
/// optional position is treated as absent.
pub fn conform_output(fields: &[FieldSpec], value: Value) -> Result<Value, String> {
    match value {
        Value::Object(object) => conform_object(fields, object, "").map(Value::Object),
        other => Err(format!("expected a JSON object, got {}", type_name(&other))),
    }
}

fn conform_object(fields: &[FieldSpec], mut object: Map<String, Value>, prefix: &str) -> Result<Map<String, Value>, String> {
    let mut conformed = Map::new();

    for field in fields {
        let path = format!("{}{}", prefix, field.name);
        match object.remove(&field.name) {
            None | Some(Value::Null) => {
                if field.required {
                    return Err(format!("missing field '{}'", path));
                }
            }
            Some(value) => {
                let value = conform_value(&field.kind, value, &path)?;
                conformed.insert(field.name.clone(), value);
            }
        }
    }

    Ok(conformed)
}

fn conform_value(kind: &FieldKind, value: Value, path: &str) -> Result<Value, String> {
    match kind {
        FieldKind::Text => match value {
            Value::String(_) => Ok(value),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            other => Err(format!("field '{}' must be a string, got {}", path, type_name(&other))),
        },
        FieldKind::TextList => match value {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| conform_value(&FieldKind::Text, item, &format!("{}[{}]", path, i)))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Err(format!("field '{}' must be a list, got {}", path, type_name(&other))),
        },
        FieldKind::Object(inner) => match value {
            Value::Object(object) => conform_object(inner, object, &format!("{}.", path)).map(Value::Object),
            other => Err(format!("field '{}' must be an object, got {}", path, type_name(&other))),
        },
        FieldKind::ObjectList(inner) => match value {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::Object(object) => {
                        conform_object(inner, object, &format!("{}[{}].", path, i)).map(Value::Object)
                    }
                    other => Err(format!(
                        "field '{}[{}]' must be an object, got {}",
                        path,
                        i,
                        type_name(&other)
                    )),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Err(format!("field '{}' must be a list, got {}", path, type_name(&other))),
        },
    }
}

/// A JSON skeleton describing `fields`, used to tell the model what to return.
pub fn skeleton(fields: &[FieldSpec]) -> Value {
    let mut object = Map::new();
    for field in fields {
        let hint = if field.required {
            field.description.clone()
        } else {
            format!("{} (optional)", field.description)
        };
        let value = match &field.kind {
            FieldKind::Text => Value::String(hint),
            FieldKind::TextList => Value::Array(vec![Value::String(hint)]),
            FieldKind::Object(inner) => skeleton(inner),
            FieldKind::ObjectList(inner) => Value::Array(vec![skeleton(inner)]),
        };
        object.insert(field.name.clone(), value);
    }
    Value::Object(object)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nutrition_fields() -> Vec<FieldSpec> {
        vec![FieldSpec::new(
            "nutrition",
            FieldKind::Object(vec![
                FieldSpec::text("calories", "Calorie range").optional(),
                FieldSpec::text("overall", "Overall assessment").optional(),
            ]),
            "Combined nutrition",
        )]
    }

    #[test]
    fn test_conform_drops_undeclared_fields_and_coerces_numbers() {
        let output = json!({
            "nutrition": { "calories": 520, "overall": "Balanced", "sodium": "high" },
            "notes": "ignored"
        });

        let conformed = conform_output(&nutrition_fields(), output).unwrap();
        assert_eq!(
            conformed,
            json!({ "nutrition": { "calories": "520", "overall": "Balanced" } })
        );
    }

    #[test]
    fn test_conform_missing_container_fails() {
        let err = conform_output(&nutrition_fields(), json!({ "calories": "500 kcal" })).unwrap_err();
        assert_eq!(err, "missing field 'nutrition'");
    }

    #[test]
    fn test_conform_null_optional_is_absent() {
        let conformed = conform_output(
            &nutrition_fields(),
            json!({ "nutrition": { "calories": null } }),
        )
        .unwrap();
        assert_eq!(conformed, json!({ "nutrition": {} }));
    }

    #[test]
    fn test_conform_rejects_wrong_list_type() {
        let fields = vec![FieldSpec::text_list("foodItems", "Identified items")];

        let err = conform_output(&fields, json!({ "foodItems": "rice" })).unwrap_err();
        assert!(err.contains("must be a list"));

        let err = conform_output(&fields, json!({ "foodItems": ["rice", {"x": 1}] })).unwrap_err();
        assert!(err.contains("foodItems[1]"));
    }

    #[test]
    fn test_check_input_rejects_blank_required_text() {
        let fields = vec![FieldSpec::text("foodItemName", "Name")];

        assert!(check_input(&fields, &json!({ "foodItemName": "Rice" })).is_ok());
        assert!(check_input(&fields, &json!({ "foodItemName": "  " })).is_err());
        assert!(check_input(&fields, &json!({})).is_err());
    }

    #[test]
    fn test_check_input_nested_list() {
        let fields = vec![FieldSpec::new(
            "foodItems",
            FieldKind::ObjectList(vec![
                FieldSpec::text("name", "Name"),
                FieldSpec::text("quantity", "Quantity").optional(),
            ]),
            "Items",
        )];

        assert!(check_input(&fields, &json!({ "foodItems": [{ "name": "Rice", "quantity": "" }] })).is_ok());
        let err = check_input(&fields, &json!({ "foodItems": [{ "name": "" }] })).unwrap_err();
        assert_eq!(err, "field 'foodItems[0].name' must not be blank");
    }

    #[test]
    fn test_skeleton_marks_optional_fields() {
        let skeleton = skeleton(&nutrition_fields());
        assert_eq!(
            skeleton["nutrition"]["calories"],
            json!("Calorie range (optional)")
        );
    }
}

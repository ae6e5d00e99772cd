use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::models::DEFAULT_NUTRITION_FIELDS;

const DEFAULT_MODEL: &str = "meta-llama/llama-4-scout:free";
const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_TOKENS: u32 = 1000;
const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    /// Checked by the gateway on every call, not at startup.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_tokens: u32,
    pub nutrition_fields: Vec<String>,
    pub server_addr: String,
    /// Idle time after which an HTTP session and its image are dropped.
    pub session_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = var("OPENROUTER_API_KEY");
        if api_key.is_none() {
            log::warn!("⚠️ OPENROUTER_API_KEY not set, inference calls will fail until it is configured");
        }

        let nutrition_fields = var("NUTRITION_FIELDS")
            .map(|raw| parse_field_list(&raw))
            .filter(|fields| !fields.is_empty())
            .unwrap_or_else(|| DEFAULT_NUTRITION_FIELDS.iter().map(|f| f.to_string()).collect());

        Self {
            api_key,
            model: var("OPENROUTER_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: var("OPENROUTER_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_secs(parse_or("INFERENCE_TIMEOUT_SECS", var("INFERENCE_TIMEOUT_SECS"), DEFAULT_TIMEOUT_SECS)),
            max_tokens: parse_or("INFERENCE_MAX_TOKENS", var("INFERENCE_MAX_TOKENS"), DEFAULT_MAX_TOKENS),
            nutrition_fields,
            server_addr: var("SERVER_ADDR").unwrap_or_else(|| DEFAULT_SERVER_ADDR.to_string()),
            session_ttl: Duration::from_secs(parse_or("SESSION_TTL_SECS", var("SESSION_TTL_SECS"), DEFAULT_SESSION_TTL_SECS)),
        }
    }
}

fn parse_or<T: FromStr + Copy + PartialOrd + Default>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(raw) => match raw.parse::<T>() {
            Ok(value) if value > T::default() => value,
            _ => {
                log::warn!("⚠️ Invalid value '{}' for {}, using default", raw, key);
                default
            }
        },
    }
}

/// Splits a comma separated field list, dropping blanks and duplicates.
fn parse_field_list(raw: &str) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();
    for field in raw.split(',').map(str::trim).filter(|f| !f.is_empty()) {
        if !fields.iter().any(|f| f == field) {
            fields.push(field.to_string());
        }
    }
    fields
}

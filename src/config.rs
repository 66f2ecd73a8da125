use std::env;

use once_cell::sync::Lazy;

const BOT_TOKEN_PLACEHOLDER: &str = "YOUR_TELEGRAM_TOKEN_HERE";
const GEMINI_KEY_PLACEHOLDER: &str = "YOUR_GEMINI_API_KEY_HERE";

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub gemini_api_key: String,
    /// Chat that receives a copy of every inbound and generated photo.
    pub owner_id: i64,
    pub gemini_model: String,
    pub gemini_image_model: String,
    pub gemini_temperature: f32,
    pub gemini_max_output_tokens: i32,
    pub log_level: String,
}

pub static CONFIG: Lazy<Config> = Lazy::new(Config::load);

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_f32(name: &str, default: f32) -> f32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<f32>().ok())
        .unwrap_or(default)
}

fn env_i32(name: &str, default: i32) -> i32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<i32>().ok())
        .unwrap_or(default)
}

fn env_i64(name: &str, default: i64) -> i64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<i64>().ok())
        .unwrap_or(default)
}

fn is_placeholder(value: &str, placeholder: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed == placeholder
}

impl Config {
    fn load() -> Self {
        Config {
            bot_token: env_string("BOT_TOKEN", ""),
            gemini_api_key: env_string("GEMINI_API_KEY", ""),
            owner_id: env_i64("OWNER_ID", 0),
            gemini_model: env_string("GEMINI_MODEL", "gemini-2.5-flash"),
            gemini_image_model: env_string("GEMINI_IMAGE_MODEL", "gemini-2.5-flash-image"),
            gemini_temperature: env_f32("GEMINI_TEMPERATURE", 0.7),
            gemini_max_output_tokens: env_i32("GEMINI_MAX_OUTPUT_TOKENS", 8192),
            log_level: env_string("LOG_LEVEL", "info"),
        }
    }

    /// Names of required settings that are still unset or left at their
    /// placeholder value. Startup refuses to proceed while this is non-empty.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_placeholder(&self.bot_token, BOT_TOKEN_PLACEHOLDER) {
            missing.push("BOT_TOKEN");
        }
        if is_placeholder(&self.gemini_api_key, GEMINI_KEY_PLACEHOLDER) {
            missing.push("GEMINI_API_KEY");
        }
        if self.owner_id == 0 {
            missing.push("OWNER_ID");
        }
        missing
    }
}

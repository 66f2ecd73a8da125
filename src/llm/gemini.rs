use std::time::Duration;

use anyhow::Result;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::CONFIG;
use crate::llm::media::detect_mime_type;

const GEMINI_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);
const NO_EXPLANATION_PLACEHOLDER: &str = "The model did not provide an explanation.";

/// Provider failures, split by remedy: a 400 almost always means the request
/// was rejected for the caller's region or the provider's policy, which has a
/// different user-facing fix than everything else.
#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    #[error("Gemini rejected the request: {0}")]
    BadRequest(String),
    #[error("Gemini request failed: {0}")]
    Other(String),
}

/// What a multimodal edit call produced. A text-only answer is a valid
/// outcome (the model explained itself instead of drawing), not an error.
#[derive(Debug, PartialEq)]
pub enum EditOutcome {
    Image(Vec<u8>),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    #[allow(dead_code)]
    mime_type: String,
    data: String,
}

fn redact_api_key(text: &str) -> String {
    let key = CONFIG.gemini_api_key.trim();
    if key.is_empty() {
        return text.to_string();
    }
    text.replace(key, "[redacted]")
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(message) = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .or_else(|| value.get("message").and_then(|v| v.as_str()))
        {
            return message.to_string();
        }
        return truncate_for_log(&value.to_string(), 2000);
    }

    truncate_for_log(trimmed, 2000)
}

fn error_for_status(status: StatusCode, detail: String) -> GeminiError {
    if status == StatusCode::BAD_REQUEST {
        GeminiError::BadRequest(detail)
    } else {
        GeminiError::Other(format!("status {status}: {detail}"))
    }
}

fn first_part_of(response: GeminiResponse) -> Vec<GeminiPart> {
    response
        .candidates
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts)
        .unwrap_or_default()
}

fn joined_text(parts: &[GeminiPart]) -> String {
    let mut pieces = Vec::new();
    for part in parts {
        if let GeminiPart::Text { text } = part {
            if !text.trim().is_empty() {
                pieces.push(text.as_str());
            }
        }
    }
    pieces.join("\n")
}

/// The first content part decides the outcome: inline binary data is a
/// generated image, anything else falls back to the response text (or a fixed
/// placeholder when there is none).
fn classify_edit_response(response: GeminiResponse) -> EditOutcome {
    let parts = first_part_of(response);

    if let Some(GeminiPart::InlineData { inline_data }) = parts.first() {
        if let Ok(bytes) = general_purpose::STANDARD.decode(&inline_data.data) {
            return EditOutcome::Image(bytes);
        }
        warn!("Gemini inline image data did not decode as base64");
    }

    let text = joined_text(&parts);
    if text.is_empty() {
        EditOutcome::Text(NO_EXPLANATION_PLACEHOLDER.to_string())
    } else {
        EditOutcome::Text(text)
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
}

impl GeminiClient {
    pub fn new() -> Result<Self> {
        let http = Client::builder().timeout(GEMINI_REQUEST_TIMEOUT).build()?;
        Ok(GeminiClient { http })
    }

    async fn call_api(&self, model: &str, payload: Value) -> Result<GeminiResponse, GeminiError> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            model, CONFIG.gemini_api_key
        );

        let response = match self.http.post(&url).json(&payload).send().await {
            Ok(response) => response,
            Err(err) => {
                let err_text = redact_api_key(&err.to_string());
                warn!(
                    "Gemini request failed to send: {err_text} (timeout={}, connect={})",
                    err.is_timeout(),
                    err.is_connect()
                );
                return Err(GeminiError::Other(err_text));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = summarize_error_body(&body);
            warn!("Gemini API error: status={status}, detail={detail}");
            return Err(error_for_status(status, detail));
        }

        response
            .json::<GeminiResponse>()
            .await
            .map_err(|err| GeminiError::Other(redact_api_key(&err.to_string())))
    }

    /// Text-only generation for the plain-question path.
    pub async fn generate_text(&self, prompt: &str) -> Result<String, GeminiError> {
        let payload = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": CONFIG.gemini_temperature,
                "maxOutputTokens": CONFIG.gemini_max_output_tokens,
            },
        });

        let response = self.call_api(&CONFIG.gemini_model, payload).await?;
        let parts = first_part_of(response);
        let text = joined_text(&parts);
        if text.is_empty() {
            return Err(GeminiError::Other(
                "Gemini returned an empty response".to_string(),
            ));
        }
        debug!(target: "llm.gemini", "text response: {}", truncate_for_log(&text, 200));
        Ok(text)
    }

    /// Multimodal edit call: instruction text plus the image as an inline part.
    pub async fn edit_image(
        &self,
        image: &[u8],
        prompt: &str,
    ) -> Result<EditOutcome, GeminiError> {
        let mime_type = detect_mime_type(image).unwrap_or_else(|| "image/png".to_string());
        let encoded = general_purpose::STANDARD.encode(image);
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": prompt },
                    { "inlineData": { "mimeType": mime_type, "data": encoded } },
                ],
            }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
            },
        });

        let response = self.call_api(&CONFIG.gemini_image_model, payload).await?;
        Ok(classify_edit_response(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_from(json: Value) -> GeminiResponse {
        serde_json::from_value(json).expect("test response should deserialize")
    }

    #[test]
    fn inline_data_in_first_part_is_an_image() {
        let response = response_from(json!({
            "candidates": [{ "content": { "parts": [
                { "inlineData": { "mimeType": "image/png", "data": "AQID" } },
                { "text": "here you go" },
            ] } }]
        }));

        assert_eq!(
            classify_edit_response(response),
            EditOutcome::Image(vec![1, 2, 3])
        );
    }

    #[test]
    fn text_first_response_is_an_explanation_even_with_a_later_image() {
        let response = response_from(json!({
            "candidates": [{ "content": { "parts": [
                { "text": "I cannot edit this photo." },
                { "inlineData": { "mimeType": "image/png", "data": "AQID" } },
            ] } }]
        }));

        assert_eq!(
            classify_edit_response(response),
            EditOutcome::Text("I cannot edit this photo.".to_string())
        );
    }

    #[test]
    fn text_parts_are_joined_for_the_explanation() {
        let response = response_from(json!({
            "candidates": [{ "content": { "parts": [
                { "text": "First." },
                { "text": "   " },
                { "text": "Second." },
            ] } }]
        }));

        assert_eq!(
            classify_edit_response(response),
            EditOutcome::Text("First.\nSecond.".to_string())
        );
    }

    #[test]
    fn empty_response_falls_back_to_the_placeholder() {
        let response = response_from(json!({ "candidates": [] }));

        assert_eq!(
            classify_edit_response(response),
            EditOutcome::Text(NO_EXPLANATION_PLACEHOLDER.to_string())
        );
    }

    #[test]
    fn bad_request_status_maps_to_its_own_error_kind() {
        let err = error_for_status(StatusCode::BAD_REQUEST, "location not supported".into());
        assert!(matches!(err, GeminiError::BadRequest(detail) if detail == "location not supported"));

        let err = error_for_status(StatusCode::INTERNAL_SERVER_ERROR, "boom".into());
        assert!(matches!(err, GeminiError::Other(_)));
    }

    #[test]
    fn error_body_summary_prefers_the_provider_message() {
        let body = r#"{"error": {"code": 400, "message": "User location is not supported"}}"#;
        assert_eq!(summarize_error_body(body), "User location is not supported");
        assert_eq!(summarize_error_body("   "), "empty response body");
        assert_eq!(summarize_error_body("plain text"), "plain text");
    }
}

//! Gemini client that turns a drawing request into a list of shape entries.

use crate::shapes::{requests_from_values, ShapeRequest};
use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const API_KEY_VAR: &str = "GEMINI_API_KEY";
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const API_KEY_HEADER: &str = "x-goog-api-key";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You turn drawing requests into shapes for Microsoft Paint.
Reply with a JSON array only. Each element is an object:
{"shape": "<line|rectangle|triangle|circle|diamond|right_triangle|polygon>",
 "start_x": <number>, "start_y": <number>, "end_x": <number>, "end_y": <number>}
start/end are opposite corners of the shape's bounding box (the two end
points for a line). x runs from 0 to 1000 left to right, y from 0 to 500 top
to bottom. Shapes are drawn in array order, later shapes on top."#;

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("{0} environment variable is not set")]
    MissingApiKey(&'static str),
    /// The URL is stripped before wrapping so request details never reach
    /// the operator or the log.
    #[error("model request failed: {0}")]
    Http(#[source] reqwest::Error),
    #[error("model service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model returned an empty response")]
    EmptyResponse,
    #[error("model output is not valid JSON: {0}")]
    Format(#[source] serde_json::Error),
    #[error("expected a list of shapes from the model")]
    NotAList,
}

/// Produces shape entries for a natural-language request.
pub trait ShapeGenerator {
    fn generate(&self, query: &str) -> Result<Vec<ShapeRequest>, GenerateError>;
}

pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    system_prompt: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String, system_prompt: String) -> Result<Self, GenerateError> {
        let client = Client::builder()
            .user_agent("paint-prompter")
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(http_error)?;
        Ok(Self {
            client,
            base_url: API_BASE.to_string(),
            api_key,
            model,
            system_prompt,
        })
    }

    /// Point the client at another endpoint, e.g. a proxy or a local stub.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build a client from `GEMINI_API_KEY`.
    pub fn from_env(model: &str, system_prompt: String) -> Result<Self, GenerateError> {
        let api_key = std::env::var(API_KEY_VAR)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(GenerateError::MissingApiKey(API_KEY_VAR))?;
        Self::new(api_key, model.to_string(), system_prompt)
    }

    fn request_text(&self, prompt: &str) -> Result<String, GenerateError> {
        let url = format!("{}/{}:generateContent", self.base_url, self.model);
        let body = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });
        let resp = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .map_err(http_error)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(GenerateError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let value: Value = resp.json().map_err(http_error)?;
        response_text(&value).ok_or(GenerateError::EmptyResponse)
    }
}

fn http_error(e: reqwest::Error) -> GenerateError {
    GenerateError::Http(e.without_url())
}

impl ShapeGenerator for GeminiClient {
    fn generate(&self, query: &str) -> Result<Vec<ShapeRequest>, GenerateError> {
        let prompt = build_prompt(&self.system_prompt, query);
        tracing::debug!("requesting shapes from {}", self.model);
        let text = self.request_text(&prompt)?;
        let values = parse_shape_list(&text)?;
        tracing::info!("model returned {} shape entries", values.len());
        Ok(requests_from_values(&values))
    }
}

/// Read the system prompt from `path`, falling back to the built-in prompt
/// when no path is configured or the file cannot be read.
pub fn load_system_prompt(path: Option<&Path>) -> String {
    let Some(path) = path else {
        return DEFAULT_SYSTEM_PROMPT.to_string();
    };
    match std::fs::read_to_string(path) {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => DEFAULT_SYSTEM_PROMPT.to_string(),
        Err(e) => {
            tracing::warn!("could not read system prompt {}: {e}", path.display());
            DEFAULT_SYSTEM_PROMPT.to_string()
        }
    }
}

pub fn build_prompt(system_prompt: &str, query: &str) -> String {
    let user_block = format!("USER QUERY: {query}");
    if system_prompt.trim().is_empty() {
        user_block
    } else {
        format!("{system_prompt}\n\n{user_block}")
    }
}

/// Concatenated text parts of the first candidate.
fn response_text(value: &Value) -> Option<String> {
    let parts = value
        .pointer("/candidates/0/content/parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    (!text.trim().is_empty()).then_some(text)
}

/// Remove a surrounding Markdown code fence (with optional language tag).
pub fn strip_code_fences(text: &str) -> &str {
    let mut trimmed = text.trim();
    if trimmed.starts_with("```") {
        if let Some(newline) = trimmed.find('\n') {
            trimmed = &trimmed[newline + 1..];
        }
        if let Some(inner) = trimmed.strip_suffix("```") {
            trimmed = inner;
        }
    }
    trimmed.trim()
}

/// Parse model output into a list, retrying on the outermost `[`..`]` region
/// when the text has extra prose around the array.
pub fn parse_shape_list(text: &str) -> Result<Vec<Value>, GenerateError> {
    let stripped = strip_code_fences(text);
    let parsed = match serde_json::from_str::<Value>(stripped) {
        Ok(value) => value,
        Err(e) => {
            let (Some(start), Some(end)) = (stripped.find('['), stripped.rfind(']')) else {
                return Err(GenerateError::Format(e));
            };
            if end <= start {
                return Err(GenerateError::Format(e));
            }
            tracing::debug!("retrying parse on bracketed region of model output");
            serde_json::from_str(&stripped[start..=end]).map_err(GenerateError::Format)?
        }
    };
    match parsed {
        Value::Array(items) => Ok(items),
        _ => Err(GenerateError::NotAList),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_joins_system_and_query() {
        assert_eq!(build_prompt("SYS", "a house"), "SYS\n\nUSER QUERY: a house");
        assert_eq!(build_prompt("  ", "a house"), "USER QUERY: a house");
    }

    #[test]
    fn response_text_joins_parts() {
        let value = json!({
            "candidates": [{ "content": { "parts": [{ "text": "[1," }, { "text": "2]" }] } }]
        });
        assert_eq!(response_text(&value).as_deref(), Some("[1,2]"));
        assert_eq!(response_text(&json!({ "candidates": [] })), None);
    }

    #[test]
    fn request_errors_do_not_reveal_the_api_key() {
        let client = GeminiClient::new(
            "SECRET-API-KEY".into(),
            "gemini-test".into(),
            String::new(),
        )
        .expect("client")
        .with_base_url("http://127.0.0.1:9/v1beta/models");

        let err = client.generate("a house").expect_err("nothing listens on port 9");
        assert!(matches!(err, GenerateError::Http(_)));
        let rendered = format!("{err} {err:?}");
        assert!(!rendered.contains("SECRET-API-KEY"), "{rendered}");
    }

    #[test]
    fn missing_prompt_file_falls_back_to_builtin() {
        let dir = tempfile::tempdir().expect("temp dir");
        let prompt = load_system_prompt(Some(&dir.path().join("absent.txt")));
        assert_eq!(prompt, DEFAULT_SYSTEM_PROMPT);
    }
}

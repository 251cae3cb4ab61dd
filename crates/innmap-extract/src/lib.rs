//! innmap extraction layer
//!
//! Sends chapter text to the Anthropic Messages API and parses the response
//! into structured extraction records. The request pre-fills the assistant
//! turn with `{` to steer the model straight into JSON; the parser still
//! tolerates prose- or fence-wrapped output from less cooperative responses.

pub mod prompt;

use innmap_model::{Containment, ExtractedLocation, ExtractedRelationship};
use serde::Deserialize;
use serde_json::json;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 64_000;

/// Errors from the extraction client and parser.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("ANTHROPIC_API_KEY environment variable not set")]
    MissingApiKey,
    #[error("failed to build http client")]
    Client(#[source] reqwest::Error),
    #[error("failed to reach Anthropic at {url}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("anthropic http error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("API error ({error_type}): {message}")]
    Api { error_type: String, message: String },
    #[error("empty response from API")]
    EmptyResponse,
    #[error("failed to parse extraction response as JSON: {preview}...")]
    Parse { preview: String },
}

/// Token usage reported by the API.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

/// The structure the LLM is asked to return for one chapter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractionResponse {
    #[serde(default)]
    pub locations: Vec<ExtractedLocation>,
    #[serde(default)]
    pub relationships: Vec<ExtractedRelationship>,
    #[serde(default)]
    pub containment: Vec<Containment>,
}

/// Anthropic Messages API client.
pub struct Client {
    http: reqwest::blocking::Client,
    api_key: String,
    model: String,
    base_url: String,
    version: String,
}

impl Client {
    /// Build a client from the environment.
    ///
    /// Requires `ANTHROPIC_API_KEY`; honors `ANTHROPIC_BASE_URL` and
    /// `ANTHROPIC_VERSION` overrides.
    pub fn from_env(model: &str) -> Result<Self, ExtractError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ExtractError::MissingApiKey)?;

        let base_url = std::env::var("ANTHROPIC_BASE_URL")
            .ok()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let version = std::env::var("ANTHROPIC_VERSION")
            .unwrap_or_else(|_| DEFAULT_VERSION.to_string());

        let http = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(600))
            .build()
            .map_err(ExtractError::Client)?;

        Ok(Self {
            http,
            api_key,
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            version,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one chapter to the model and return the raw response text plus
    /// token usage. The assistant prefill `{` is re-attached so the returned
    /// text is the complete JSON document.
    pub fn extract(
        &self,
        chapter_title: &str,
        chapter_text: &str,
    ) -> Result<(String, Usage), ExtractError> {
        let url = format!("{}/v1/messages", self.base_url);
        let user = prompt::build_extraction_prompt(chapter_title, chapter_text);

        let body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "temperature": 0,
            "system": prompt::SYSTEM_PROMPT,
            "messages": [
                { "role": "user", "content": user },
                { "role": "assistant", "content": "{" }
            ]
        });

        tracing::debug!(model = %self.model, chapter = chapter_title, "requesting extraction");
        let resp = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.version)
            .json(&body)
            .send()
            .map_err(|source| ExtractError::Http {
                url: url.clone(),
                source,
            })?;

        let status = resp.status();
        let text = resp.text().map_err(|source| ExtractError::Http {
            url: url.clone(),
            source,
        })?;

        let parsed: ApiResponse = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(_) => {
                return Err(ExtractError::Status {
                    status: status.as_u16(),
                    body: truncate(&text, 400),
                })
            }
        };

        if let Some(err) = parsed.error {
            return Err(ExtractError::Api {
                error_type: err.error_type,
                message: err.message,
            });
        }
        if !status.is_success() {
            return Err(ExtractError::Status {
                status: status.as_u16(),
                body: truncate(&text, 400),
            });
        }

        let Some(block) = parsed.content.first() else {
            return Err(ExtractError::EmptyResponse);
        };

        // Re-attach the prefilled opening brace.
        Ok((format!("{{{}", block.text), parsed.usage))
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Usage,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "type", default)]
    error_type: String,
    #[serde(default)]
    message: String,
}

/// Parse the LLM response text as an extraction record.
///
/// Strategies, in order: direct parse; first *complete* JSON object found by
/// brace balancing (models sometimes wrap JSON in prose or emit trailing
/// content); fenced ```json blocks.
pub fn parse_extraction(text: &str) -> Result<ExtractionResponse, ExtractError> {
    let trimmed = text.trim();

    if let Ok(parsed) = serde_json::from_str(trimmed) {
        return Ok(parsed);
    }

    if let Some(candidate) = balanced_object(trimmed) {
        if let Ok(parsed) = serde_json::from_str(candidate) {
            return Ok(parsed);
        }
    }

    for fence in ["```json", "```"] {
        if let Some(start) = trimmed.find(fence) {
            let after = &trimmed[start + fence.len()..];
            if let Some(end) = after.find("```") {
                if let Ok(parsed) = serde_json::from_str(after[..end].trim()) {
                    return Ok(parsed);
                }
            }
        }
    }

    Err(ExtractError::Parse {
        preview: truncate(trimmed, 200),
    })
}

/// Locate the first complete JSON object in `text`, balancing braces outside
/// string literals. Balancing beats `rfind('}')`, which can land on an inner
/// brace and fail with "EOF while parsing an object".
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;

    let mut depth: i64 = 0;
    let mut in_string = false;
    let mut escape = false;

    for (idx, ch) in text.char_indices().skip(start) {
        if in_string {
            if escape {
                escape = false;
                continue;
            }
            match ch {
                '\\' => escape = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=idx]);
                }
            }
            _ => {}
        }
    }

    // Fall back to the last brace in sight; may still fail to parse, but
    // gives the caller a useful error.
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

//! Blocking client for the Gemini `generateContent` REST endpoint.
//!
//! Requests carry inline base64 image parts plus a text instruction and ask
//! for either a JSON answer (with a response schema) or an image answer.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{GatewayError, GenerativeBackend, Part};
use crate::data_uri::DataUri;
use crate::settings::AppSettings;

/// HTTP client for one Gemini deployment.
pub struct GeminiBackend {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    analysis_model: String,
    image_model: String,
}

impl std::fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("analysis_model", &self.analysis_model)
            .field("image_model", &self.image_model)
            .finish()
    }
}

// -- Response shape (only the fields we read) -------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePart {
    pub text: Option<String>,
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

impl GenerateResponse {
    fn first_parts(&self) -> &[ResponsePart] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or(&[])
    }

    /// Concatenated text of the first candidate.
    pub fn text(&self) -> String {
        self.first_parts()
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }

    /// First inline image of the first candidate.
    pub fn image(&self) -> Result<Option<DataUri>, GatewayError> {
        let Some(inline) = self.first_parts().iter().find_map(|p| p.inline_data.as_ref()) else {
            return Ok(None);
        };
        let bytes = STANDARD
            .decode(inline.data.as_bytes())
            .map_err(|e| GatewayError::InvalidResponse(format!("inline image payload: {e}")))?;
        Ok(Some(DataUri::new(inline.mime_type.clone(), bytes)))
    }
}

fn part_json(part: &Part) -> Value {
    match part {
        Part::Image(uri) => json!({
            "inlineData": { "mimeType": uri.mime(), "data": uri.base64_payload() }
        }),
        Part::Text(text) => json!({ "text": text }),
    }
}

/// Request body for `generateContent`.
pub fn request_body(parts: &[Part], generation_config: Value) -> Value {
    json!({
        "contents": [{ "parts": parts.iter().map(part_json).collect::<Vec<_>>() }],
        "generationConfig": generation_config,
    })
}

impl GeminiBackend {
    /// Build a client from settings. Fails when no API key is configured.
    pub fn from_settings(settings: &AppSettings) -> Result<Self, GatewayError> {
        let api_key = settings.effective_api_key().ok_or(GatewayError::MissingApiKey)?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            api_key,
            analysis_model: settings.analysis_model.clone(),
            image_model: settings.image_model.clone(),
        })
    }

    fn generate(&self, model: &str, body: &Value) -> Result<GenerateResponse, GatewayError> {
        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, model))
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(GatewayError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<GenerateResponse>()?)
    }
}

impl GenerativeBackend for GeminiBackend {
    fn generate_json(&self, parts: &[Part], schema: &Value) -> Result<String, GatewayError> {
        let body = request_body(
            parts,
            json!({ "responseMimeType": "application/json", "responseSchema": schema }),
        );
        let text = self.generate(&self.analysis_model, &body)?.text();
        if text.trim().is_empty() {
            return Err(GatewayError::InvalidAnalysis("empty response".into()));
        }
        Ok(text)
    }

    fn generate_image(&self, parts: &[Part]) -> Result<Option<DataUri>, GatewayError> {
        let body = request_body(parts, json!({ "responseModalities": ["IMAGE"] }));
        self.generate(&self.image_model, &body)?.image()
    }
}

// ============================================================================
// AI GATEWAY — hosted generative model behind a trait seam
// ============================================================================
//
// Template analysis and background remixing are delegated to a hosted
// multimodal model. Everything model-specific (HTTP, payload shapes) lives in
// `gemini`; the analysis and remix pipelines only see `GenerativeBackend`,
// which keeps them testable against an in-memory backend.

pub mod analysis;
pub mod gemini;
pub mod remix;

pub use analysis::analyze_image;
pub use gemini::GeminiBackend;
pub use remix::{RemixMode, RemixRequest, RenderingStyle, creative_remix};

use crate::data_uri::{DataUri, DataUriError};

/// One input part of a generation request.
#[derive(Clone, Debug, PartialEq)]
pub enum Part {
    Image(DataUri),
    Text(String),
}

impl Part {
    pub fn text(s: impl Into<String>) -> Self {
        Part::Text(s.into())
    }
}

/// Errors that can occur while talking to the generative service.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("generative API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("no API key configured (set api_key in the settings file or GEMINI_API_KEY)")]
    MissingApiKey,

    /// The analysis response could not be read as the expected structure.
    #[error("image analysis returned malformed data: {0}")]
    InvalidAnalysis(String),

    #[error("the generation request returned no image")]
    NoImageReturned,

    #[error("unexpected response from the generative API: {0}")]
    InvalidResponse(String),

    #[error("invalid image: {0}")]
    InvalidImage(#[from] DataUriError),
}

/// A model that can answer with structured JSON or with an image.
pub trait GenerativeBackend {
    /// Ask for a JSON document conforming to `schema`; returns the raw text.
    fn generate_json(&self, parts: &[Part], schema: &serde_json::Value) -> Result<String, GatewayError>;

    /// Ask for an image. `Ok(None)` means the model answered without one.
    fn generate_image(&self, parts: &[Part]) -> Result<Option<DataUri>, GatewayError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory backend for pipeline tests.

    use std::cell::RefCell;
    use std::collections::VecDeque;

    use super::*;

    #[derive(Default)]
    pub struct ScriptedBackend {
        pub json_replies: RefCell<VecDeque<Result<String, GatewayError>>>,
        pub image_replies: RefCell<VecDeque<Result<Option<DataUri>, GatewayError>>>,
        pub json_calls: RefCell<Vec<Vec<Part>>>,
        pub image_calls: RefCell<Vec<Vec<Part>>>,
    }

    impl ScriptedBackend {
        pub fn with_json(self, reply: &str) -> Self {
            self.json_replies.borrow_mut().push_back(Ok(reply.to_string()));
            self
        }

        pub fn with_image(self, reply: Option<DataUri>) -> Self {
            self.image_replies.borrow_mut().push_back(Ok(reply));
            self
        }

        pub fn last_image_prompt(&self) -> Option<String> {
            self.image_calls.borrow().last().and_then(|parts| {
                parts.iter().find_map(|p| match p {
                    Part::Text(t) => Some(t.clone()),
                    Part::Image(_) => None,
                })
            })
        }
    }

    impl GenerativeBackend for ScriptedBackend {
        fn generate_json(&self, parts: &[Part], _schema: &serde_json::Value) -> Result<String, GatewayError> {
            self.json_calls.borrow_mut().push(parts.to_vec());
            self.json_replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(GatewayError::InvalidResponse("no scripted reply".into())))
        }

        fn generate_image(&self, parts: &[Part]) -> Result<Option<DataUri>, GatewayError> {
            self.image_calls.borrow_mut().push(parts.to_vec());
            self.image_replies.borrow_mut().pop_front().unwrap_or(Ok(None))
        }
    }
}

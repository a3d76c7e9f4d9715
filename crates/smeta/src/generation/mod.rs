//! Boundary to the external text-generation service.
//!
//! The pipeline only sees [`GenerationClient`]; [`MessagesClient`] is the
//! production implementation, tests substitute scripted fakes.

pub mod extract;
pub mod messages;
pub mod prompts;

use thiserror::Error;

pub use extract::{extract_json_span, parse_json, ExtractError};
pub use messages::MessagesClient;

/// Transport and service failures of a single generation call.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Generation request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Generation request failed: {0}")]
    Transport(String),

    #[error("Generation service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Generation service returned no text content")]
    EmptyResponse,

    #[error("Invalid response from generation service: {0}")]
    InvalidResponse(String),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}

/// One blocking request/response exchange: prompt in, raw text out.
///
/// Implementations must be callable from several worker threads at once.
pub trait GenerationClient: Send + Sync {
    fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, GenerationError>;
}

impl<T: GenerationClient + ?Sized> GenerationClient for std::sync::Arc<T> {
    fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, GenerationError> {
        (**self).generate(prompt, max_tokens)
    }
}

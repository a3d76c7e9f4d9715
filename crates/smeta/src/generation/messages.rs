use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{GenerationClient, GenerationError};
use crate::config::GenerationConfig;
use crate::secrets;

/// Blocking client for the Messages API.
///
/// One instance is shared by every worker thread; `reqwest::blocking::Client`
/// pools connections internally.
pub struct MessagesClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_version: String,
    temperature: f32,
    api_key: SecretString,
    request_timeout_secs: u64,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: [UserMessage<'a>; 1],
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl MessagesClient {
    /// Builds the client, resolving the API key once.
    pub fn from_config(config: &GenerationConfig) -> crate::Result<Self> {
        let api_key = secrets::resolve_secret(
            config.api_key.as_deref(),
            config.api_key_file.as_deref(),
            config.api_key_env.as_deref(),
        )?;
        Ok(Self::new(config, api_key)?)
    }

    pub fn new(config: &GenerationConfig, api_key: SecretString) -> Result<Self, GenerationError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| GenerationError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_version: config.api_version.clone(),
            temperature: config.temperature,
            api_key,
            request_timeout_secs: config.request_timeout_secs,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn map_send_error(&self, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout {
                secs: self.request_timeout_secs,
            }
        } else {
            GenerationError::Transport(e.to_string())
        }
    }
}

impl GenerationClient for MessagesClient {
    fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, GenerationError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens,
            temperature: self.temperature,
            messages: [UserMessage {
                role: "user",
                content: prompt,
            }],
        };

        tracing::debug!(
            model = %self.model,
            max_tokens,
            prompt_chars = prompt.chars().count(),
            "Sending generation request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", &self.api_version)
            .json(&body)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MessagesResponse = response.json().map_err(|e| {
            if e.is_timeout() {
                self.map_send_error(e)
            } else {
                GenerationError::InvalidResponse(e.to_string())
            }
        })?;

        response_text(parsed)
    }
}

fn response_text(response: MessagesResponse) -> Result<String, GenerationError> {
    let text: String = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();

    if text.trim().is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    Ok(text)
}

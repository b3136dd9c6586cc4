//! HTTP collaborators behind the core classifier/embedder SPI.

mod anthropic;
mod voyage;

use anyhow::Result;
use kb_core::{ProviderConfig, ProviderError, ProviderErrorKind};
use reqwest::header::HeaderValue;

pub use anthropic::AnthropicClassifier;
pub use voyage::VoyageEmbedder;

const MAX_ERROR_BODY_CHARS: usize = 200;

/// Builds the classifier when an API key is configured.
pub fn classifier_from_config(config: &ProviderConfig) -> Result<Option<AnthropicClassifier>> {
    match &config.api_key {
        Some(api_key) => Ok(Some(AnthropicClassifier::new(
            api_key,
            &config.model,
            config.timeout,
        )?)),
        None => Ok(None),
    }
}

/// Builds the embedder when an API key is configured.
pub fn embedder_from_config(config: &ProviderConfig) -> Result<Option<VoyageEmbedder>> {
    match &config.api_key {
        Some(api_key) => Ok(Some(VoyageEmbedder::new(
            api_key,
            &config.model,
            config.timeout,
        )?)),
        None => Ok(None),
    }
}

fn secret_header(provider: &'static str, value: &str) -> Result<HeaderValue, ProviderError> {
    let mut header = HeaderValue::from_str(value).map_err(|err| {
        ProviderError::new(
            provider,
            ProviderErrorKind::MissingCredentials,
            format!("api key is not a valid header value: {err}"),
        )
    })?;
    header.set_sensitive(true);
    Ok(header)
}

fn request_error(provider: &'static str, err: reqwest::Error) -> ProviderError {
    let kind = if err.is_timeout() {
        ProviderErrorKind::Timeout
    } else if err.is_decode() {
        ProviderErrorKind::MalformedResponse
    } else {
        ProviderErrorKind::Transport
    };
    ProviderError::new(provider, kind, err.to_string())
}

/// Fails with the status and a short body excerpt unless the call succeeded.
fn ensure_success(
    provider: &'static str,
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    let excerpt: String = body
        .replace(['\n', '\r'], " ")
        .chars()
        .take(MAX_ERROR_BODY_CHARS)
        .collect();
    Err(ProviderError::new(
        provider,
        ProviderErrorKind::HttpStatus(status.as_u16()),
        excerpt,
    ))
}

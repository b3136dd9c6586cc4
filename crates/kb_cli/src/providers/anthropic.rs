use std::time::Duration;

use kb_core::provider::{build_classification_prompt, parse_classification_reply};
use kb_core::{Classifier, ProviderError, TagSuggestion};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use super::{ensure_success, request_error, secret_header};

const PROVIDER: &str = "anthropic";
const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

/// Classifier backed by the Anthropic Messages API.
pub struct AnthropicClassifier {
    http: Client,
    model: String,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicClassifier {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", secret_header(PROVIDER, api_key)?);
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| request_error(PROVIDER, err))?;
        Ok(Self {
            http,
            model: model.to_string(),
        })
    }
}

impl Classifier for AnthropicClassifier {
    fn classify(
        &self,
        content: &str,
        known_tags: &[String],
    ) -> Result<Vec<TagSuggestion>, ProviderError> {
        let prompt = build_classification_prompt(content, known_tags);
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            messages: [Message {
                role: "user",
                content: &prompt,
            }],
        };

        let response = self
            .http
            .post(MESSAGES_URL)
            .json(&request)
            .send()
            .map_err(|err| request_error(PROVIDER, err))?;
        let reply: MessagesResponse = ensure_success(PROVIDER, response)?
            .json()
            .map_err(|err| request_error(PROVIDER, err))?;

        let text: String = reply
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");
        if text.trim().is_empty() {
            return Err(ProviderError::malformed(PROVIDER, "reply has no text content"));
        }
        parse_classification_reply(PROVIDER, &text)
    }
}

use std::time::Duration;

use kb_core::{Embedder, ProviderError};
use reqwest::blocking::Client;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

use super::{ensure_success, request_error, secret_header};

const PROVIDER: &str = "voyage";
const EMBEDDINGS_URL: &str = "https://api.voyageai.com/v1/embeddings";

/// Embedder backed by the Voyage AI embeddings API.
pub struct VoyageEmbedder {
    http: Client,
    model: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: [&'a str; 1],
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f64>,
}

impl VoyageEmbedder {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            secret_header(PROVIDER, &format!("Bearer {api_key}"))?,
        );

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

impl Embedder for VoyageEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    fn embed(&self, text: &str) -> Result<Vec<f64>, ProviderError> {
        let request = EmbeddingRequest {
            input: [text],
            model: &self.model,
        };
        let response = self
            .http
            .post(EMBEDDINGS_URL)
            .json(&request)
            .send()
            .map_err(|err| request_error(PROVIDER, err))?;
        let reply: EmbeddingResponse = ensure_success(PROVIDER, response)?
            .json()
            .map_err(|err| request_error(PROVIDER, err))?;

        let vector = reply
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .ok_or_else(|| ProviderError::malformed(PROVIDER, "reply contains no embedding"))?;
        if vector.is_empty() {
            return Err(ProviderError::malformed(PROVIDER, "embedding is empty"));
        }
        Ok(vector)
    }
}

// 🤗 Hugging Face Inference - Hosted text generation over HTTP
// POST {inputs, parameters} with a bearer token; expects [{"generated_text": "..."}]

use crate::insights::{GenerationParams, InsightError, TextGenerator};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::trace;

/// Upper bound on one generation call
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct HuggingFaceClient {
    client: Client,
    api_key: String,
    model_url: String,
}

impl HuggingFaceClient {
    pub fn new(api_key: String, model_url: String) -> Result<Self, InsightError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| InsightError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            model_url,
        })
    }

    pub fn model_url(&self) -> &str {
        &self.model_url
    }
}

#[async_trait]
impl TextGenerator for HuggingFaceClient {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, InsightError> {
        let payload = json!({
            "inputs": prompt,
            "parameters": params,
        });
        trace!("POST {} ({} prompt chars)", self.model_url, prompt.len());

        let response = self
            .client
            .post(&self.model_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(InsightError::Status(status.as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| InsightError::Decode(e.to_string()))?;

        extract_generated_text(&body)
    }

    fn name(&self) -> &str {
        "huggingface"
    }
}

fn request_error(e: reqwest::Error) -> InsightError {
    if e.is_timeout() {
        InsightError::Timeout
    } else {
        InsightError::Network(e.to_string())
    }
}

/// Pull `generated_text` out of the first element of the response list
pub fn extract_generated_text(body: &Value) -> Result<String, InsightError> {
    let first = body
        .as_array()
        .and_then(|items| items.first())
        .ok_or_else(|| InsightError::InvalidResponse("expected a non-empty list".to_string()))?;

    let object = first
        .as_object()
        .ok_or_else(|| InsightError::InvalidResponse("list item is not an object".to_string()))?;

    match object.get("generated_text") {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(text)) => Ok(text.clone()),
        Some(other) => Err(InsightError::InvalidResponse(format!(
            "generated_text is not a string: {}",
            other
        ))),
    }
}

// src/reasoning_client.rs
//! Client for the hosted text-reasoning service (Gemini `generateContent`).
//!
//! The client is constructed with an explicit API key; it never reads
//! process-wide state, which keeps stage functions pure and testable.

use std::time::Duration;

use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PipelineError;
use crate::types::{ProductDescriptor, ReasoningModel};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Text-reasoning capability behind the analyze and storyboard stages.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Free-form product analysis from a source URL. Transport and parse
    /// trouble propagate here; the analyze *stage* applies the best-effort
    /// fallback policy.
    async fn analyze(
        &self,
        model: ReasoningModel,
        source_url: &str,
    ) -> Result<ProductDescriptor, PipelineError>;

    /// Schema-constrained generation: the service is instructed to return
    /// JSON matching `schema`. Incidental code fences are stripped before
    /// parsing; text that still is not JSON fails with `Parse`.
    async fn direct(
        &self,
        model: ReasoningModel,
        prompt: &str,
        system_instruction: Option<&str>,
        schema: Value,
    ) -> Result<Value, PipelineError>;
}

#[derive(Debug, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InlineData {
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub data: String, // base64 encoded data
}

#[derive(Debug, Serialize)]
pub struct GenerationConfig {
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(rename = "responseSchema", skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
    #[serde(rename = "finishReason")]
    pub finish_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate, if any.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let mut out = String::new();
        for part in &content.parts {
            if let Part::Text { text } = part {
                out.push_str(text);
            }
        }
        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }
}

/// Strips the ```json fences the model sometimes wraps around its payload.
pub(crate) fn clean_json(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    async fn generate_content(
        &self,
        model: ReasoningModel,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, PipelineError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url,
            model.wire_id(),
            self.api_key
        );

        // Transient 429/5xx responses and connection errors are retried with
        // exponential backoff before surfacing as a Transport failure.
        let backoff_config = ExponentialBackoff {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(30),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(120)),
            ..Default::default()
        };

        let operation = || async {
            let response = self
                .client
                .post(&url)
                .header("Content-Type", "application/json")
                .timeout(Duration::from_secs(60))
                .json(request)
                .send()
                .await
                .map_err(|e| {
                    if e.is_connect() || e.is_timeout() {
                        tracing::warn!("reasoning service connection error (retrying): {}", e);
                        backoff::Error::transient(PipelineError::Transport(e.to_string()))
                    } else {
                        backoff::Error::permanent(PipelineError::Transport(e.to_string()))
                    }
                })?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| backoff::Error::permanent(PipelineError::Transport(e.to_string())))?;

            if matches!(status.as_u16(), 429 | 500 | 502 | 503) {
                tracing::warn!("reasoning service returned {} (retrying)", status);
                return Err(backoff::Error::transient(PipelineError::Transport(format!(
                    "service error ({}): {}",
                    status, body
                ))));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(PipelineError::Transport(format!(
                    "service error ({}): {}",
                    status, body
                ))));
            }

            serde_json::from_str(&body).map_err(|e| {
                backoff::Error::permanent(PipelineError::Transport(format!(
                    "error decoding response body: {}",
                    e
                )))
            })
        };

        retry(backoff_config, operation).await
    }
}

#[async_trait]
impl ReasoningService for GeminiClient {
    async fn analyze(
        &self,
        model: ReasoningModel,
        source_url: &str,
    ) -> Result<ProductDescriptor, PipelineError> {
        let prompt = format!(
            "Analyze the product page at {}. Return the product name, a detailed \
             description, and the single most important unique selling point.",
            source_url
        );
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::Text { text: prompt }],
                role: Some("user".to_string()),
            }],
            system_instruction: None,
            generation_config: None,
        };

        let response = self.generate_content(model, &request).await?;
        let text = response
            .text()
            .unwrap_or_else(|| "Hot Trend Product".to_string());

        Ok(ProductDescriptor {
            name: text.chars().take(80).collect(),
            description: text,
            usp: "Premium Quality".to_string(),
            url: source_url.to_string(),
            image: None,
            category: None,
        })
    }

    async fn direct(
        &self,
        model: ReasoningModel,
        prompt: &str,
        system_instruction: Option<&str>,
        schema: Value,
    ) -> Result<Value, PipelineError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::Text {
                    text: prompt.to_string(),
                }],
                role: Some("user".to_string()),
            }],
            system_instruction: system_instruction.map(|text| Content {
                parts: vec![Part::Text {
                    text: text.to_string(),
                }],
                role: None,
            }),
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(schema),
            }),
        };

        let response = self.generate_content(model, &request).await?;
        let text = response
            .text()
            .ok_or_else(|| PipelineError::Parse("no text content in response".to_string()))?;

        let cleaned = clean_json(&text);
        serde_json::from_str(&cleaned).map_err(|e| PipelineError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_json_strips_fences() {
        assert_eq!(clean_json("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(clean_json("{\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(clean_json("  ```\n[]\n```  "), "[]");
    }

    #[test]
    fn response_text_concatenates_parts() {
        let response = GenerateContentResponse {
            candidates: vec![Candidate {
                content: Some(Content {
                    parts: vec![
                        Part::Text {
                            text: "hello ".to_string(),
                        },
                        Part::Text {
                            text: "world".to_string(),
                        },
                    ],
                    role: Some("model".to_string()),
                }),
                finish_reason: Some("STOP".to_string()),
            }],
        };
        assert_eq!(response.text().as_deref(), Some("hello world"));

        let empty = GenerateContentResponse { candidates: vec![] };
        assert!(empty.text().is_none());
    }
}

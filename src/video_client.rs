// src/video_client.rs
//! Client for the hosted video-generation service (Veo long-running
//! operations). Submission is asynchronous: completion is discovered only
//! by polling the returned job handle, never via callback.

use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::reasoning_client::GEMINI_BASE_URL;
use crate::types::{ReferenceImage, RenderProfile, VideoModel};

/// Opaque, serializable handle to an in-flight render request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderJob {
    pub operation_name: String,
    pub done: bool,
    pub asset_uri: Option<String>,
}

/// Video-generation capability behind the scene-render stage.
#[async_trait]
pub trait VideoService: Send + Sync {
    async fn submit(
        &self,
        model: VideoModel,
        prompt: &str,
        image: Option<&ReferenceImage>,
        profile: &RenderProfile,
    ) -> Result<RenderJob, PipelineError>;

    /// Returns an updated handle reflecting job progress.
    async fn poll(&self, job: &RenderJob) -> Result<RenderJob, PipelineError>;

    /// Authenticated download of the finished asset.
    async fn fetch_asset(&self, job: &RenderJob) -> Result<Vec<u8>, PipelineError>;
}

#[derive(Debug, Serialize)]
pub struct GenerateVideosRequest {
    pub instances: Vec<VideoInstance>,
    pub parameters: VideoParameters,
}

#[derive(Debug, Serialize)]
pub struct VideoInstance {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<InlineImage>,
}

#[derive(Debug, Serialize)]
pub struct InlineImage {
    #[serde(rename = "bytesBase64Encoded")]
    pub bytes_base64_encoded: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

#[derive(Debug, Serialize)]
pub struct VideoParameters {
    #[serde(rename = "sampleCount")]
    pub sample_count: u32,
    pub resolution: String,
    #[serde(rename = "aspectRatio")]
    pub aspect_ratio: String,
}

#[derive(Debug, Deserialize)]
pub struct OperationResponse {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    pub response: Option<OperationResult>,
    pub error: Option<OperationError>,
}

#[derive(Debug, Deserialize)]
pub struct OperationError {
    pub code: Option<i32>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OperationResult {
    #[serde(rename = "generateVideoResponse")]
    pub generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateVideoResponse {
    #[serde(rename = "generatedSamples", default)]
    pub generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Deserialize)]
pub struct GeneratedSample {
    pub video: Option<VideoRef>,
}

#[derive(Debug, Deserialize)]
pub struct VideoRef {
    pub uri: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VeoClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl VeoClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    fn job_from_operation(op: OperationResponse) -> Result<RenderJob, PipelineError> {
        if let Some(error) = op.error {
            return Err(PipelineError::Transport(format!(
                "render job failed: {}",
                error.message.unwrap_or_else(|| "unknown error".to_string())
            )));
        }
        let asset_uri = op
            .response
            .as_ref()
            .and_then(|r| r.generate_video_response.as_ref())
            .and_then(|g| g.generated_samples.first())
            .and_then(|s| s.video.as_ref())
            .and_then(|v| v.uri.clone());
        Ok(RenderJob {
            operation_name: op.name,
            done: op.done,
            asset_uri,
        })
    }

    async fn decode_operation(
        response: reqwest::Response,
    ) -> Result<OperationResponse, PipelineError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(PipelineError::Transport(format!(
                "video service error ({}): {}",
                status, body
            )));
        }
        serde_json::from_str(&body).map_err(|e| {
            PipelineError::Transport(format!("error decoding response body: {}", e))
        })
    }
}

#[async_trait]
impl VideoService for VeoClient {
    async fn submit(
        &self,
        model: VideoModel,
        prompt: &str,
        image: Option<&ReferenceImage>,
        profile: &RenderProfile,
    ) -> Result<RenderJob, PipelineError> {
        let url = format!(
            "{}/models/{}:predictLongRunning?key={}",
            self.base_url,
            model.wire_id(),
            self.api_key
        );

        let request = GenerateVideosRequest {
            instances: vec![VideoInstance {
                prompt: prompt.to_string(),
                image: image.map(|img| InlineImage {
                    bytes_base64_encoded: BASE64_STANDARD.encode(&img.data),
                    mime_type: img.mime_type.clone(),
                }),
            }],
            parameters: VideoParameters {
                sample_count: 1,
                resolution: profile.resolution.as_str().to_string(),
                aspect_ratio: profile.aspect_ratio.as_str().to_string(),
            },
        };

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .timeout(Duration::from_secs(60))
            .json(&request)
            .send()
            .await?;

        let op = Self::decode_operation(response).await?;
        tracing::debug!("render submitted as {}", op.name);
        Self::job_from_operation(op)
    }

    async fn poll(&self, job: &RenderJob) -> Result<RenderJob, PipelineError> {
        let url = format!("{}/{}?key={}", self.base_url, job.operation_name, self.api_key);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(30))
            .send()
            .await?;

        let op = Self::decode_operation(response).await?;
        Self::job_from_operation(op)
    }

    async fn fetch_asset(&self, job: &RenderJob) -> Result<Vec<u8>, PipelineError> {
        let uri = job.asset_uri.as_ref().ok_or_else(|| {
            PipelineError::Fetch("completed job carries no asset locator".to_string())
        })?;

        let url = format!("{}&key={}", uri, self.api_key);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(300))
            .send()
            .await
            .map_err(|e| PipelineError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PipelineError::Fetch(format!(
                "asset download failed with status {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::Fetch(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

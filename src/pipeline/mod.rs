// src/pipeline/mod.rs
//! Asynchronous production pipeline: analyze -> storyboard -> per-scene
//! render -> assemble, driven by the orchestrator. Every remote call and
//! delay is a suspension point; nothing runs in parallel.

pub mod analyze;
pub mod assemble;
pub mod orchestrator;
pub mod render;
pub mod storyboard;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Position of the current run in the production state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PipelineStatus {
    /// No run active. Also the "ready" state once a storyboard exists.
    Idle,
    Analyzing,
    Storyboarding,
    Rendering,
    Assembling,
    Completed,
    /// Terminal for the current run; re-starting discards its artifacts.
    Failed { error: String },
}

impl PipelineStatus {
    /// True while a stage is in flight and inputs must not change.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PipelineStatus::Analyzing
                | PipelineStatus::Storyboarding
                | PipelineStatus::Rendering
                | PipelineStatus::Assembling
        )
    }
}

/// Progress message published to observers on every transition. Render
/// progress is additionally observable through `clips_ready` relative to
/// `total_scenes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub status: PipelineStatus,
    pub clips_ready: usize,
    pub total_scenes: usize,
}

impl ProgressUpdate {
    pub fn new(
        message: String,
        status: PipelineStatus,
        clips_ready: usize,
        total_scenes: usize,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            message,
            status,
            clips_ready,
            total_scenes,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Mock service implementations shared by the pipeline tests.

    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use crate::error::PipelineError;
    use crate::reasoning_client::ReasoningService;
    use crate::types::{
        ProductDescriptor, ReasoningModel, ReferenceImage, RenderProfile, ScenePrompt,
        Storyboard, Transition, VideoModel, SCENE_COUNT,
    };
    use crate::video_client::{RenderJob, VideoService};

    /// Scripted reasoning service with call counters.
    pub(crate) struct MockReasoning {
        pub analyze_calls: AtomicU32,
        pub direct_calls: AtomicU32,
        pub fail_analyze: bool,
        pub direct_payload: Value,
        pub fail_direct: bool,
    }

    impl MockReasoning {
        pub fn new(direct_payload: Value) -> Self {
            Self {
                analyze_calls: AtomicU32::new(0),
                direct_calls: AtomicU32::new(0),
                fail_analyze: false,
                direct_payload,
                fail_direct: false,
            }
        }
    }

    #[async_trait]
    impl ReasoningService for MockReasoning {
        async fn analyze(
            &self,
            _model: ReasoningModel,
            source_url: &str,
        ) -> Result<ProductDescriptor, PipelineError> {
            self.analyze_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_analyze {
                return Err(PipelineError::Transport("connection refused".to_string()));
            }
            Ok(ProductDescriptor {
                name: "Widget X".to_string(),
                description: "A widget analyzed in a test".to_string(),
                usp: "Premium Quality".to_string(),
                url: source_url.to_string(),
                image: None,
                category: None,
            })
        }

        async fn direct(
            &self,
            _model: ReasoningModel,
            _prompt: &str,
            _system_instruction: Option<&str>,
            _schema: Value,
        ) -> Result<Value, PipelineError> {
            self.direct_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_direct {
                return Err(PipelineError::Transport("service unavailable".to_string()));
            }
            Ok(self.direct_payload.clone())
        }
    }

    /// Scripted video service. A job completes once `polls_until_done` poll
    /// calls have accumulated across the mock's lifetime.
    pub(crate) struct MockVideo {
        pub polls_until_done: u32,
        pub submit_calls: AtomicU32,
        pub poll_calls: AtomicU32,
        pub fetch_calls: AtomicU32,
        pub fail_fetch: bool,
    }

    impl MockVideo {
        pub fn new(polls_until_done: u32) -> Self {
            Self {
                polls_until_done,
                submit_calls: AtomicU32::new(0),
                poll_calls: AtomicU32::new(0),
                fetch_calls: AtomicU32::new(0),
                fail_fetch: false,
            }
        }
    }

    #[async_trait]
    impl VideoService for MockVideo {
        async fn submit(
            &self,
            _model: VideoModel,
            _prompt: &str,
            _image: Option<&ReferenceImage>,
            _profile: &RenderProfile,
        ) -> Result<RenderJob, PipelineError> {
            self.submit_calls.fetch_add(1, Ordering::SeqCst);
            Ok(RenderJob {
                operation_name: format!(
                    "operations/mock-{}",
                    self.submit_calls.load(Ordering::SeqCst)
                ),
                done: false,
                asset_uri: None,
            })
        }

        async fn poll(&self, job: &RenderJob) -> Result<RenderJob, PipelineError> {
            let polls = self.poll_calls.fetch_add(1, Ordering::SeqCst) + 1;
            let done = polls >= self.polls_until_done;
            Ok(RenderJob {
                operation_name: job.operation_name.clone(),
                done,
                asset_uri: done.then(|| "https://example.com/clip.mp4?alt=media".to_string()),
            })
        }

        async fn fetch_asset(&self, _job: &RenderJob) -> Result<Vec<u8>, PipelineError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_fetch {
                return Err(PipelineError::Fetch("download interrupted".to_string()));
            }
            Ok(b"clip-bytes".to_vec())
        }
    }

    pub(crate) fn sample_scene(id: usize) -> ScenePrompt {
        ScenePrompt {
            id: format!("s{}", id),
            timestamp: format!("00:{:02}", id * 3),
            visual_prompt: format!("scene {} close-up", id),
            audio_prompt: "upbeat synth".to_string(),
            negative_prompt: "blurry, watermark".to_string(),
            transition: Transition::Cut,
        }
    }

    pub(crate) fn storyboard_with_scenes(count: usize) -> Storyboard {
        Storyboard {
            character_seed_description: "woman in her 30s, red coat, short hair".to_string(),
            global_style: "soft morning light, film grain".to_string(),
            scenes: (1..=count).map(sample_scene).collect(),
        }
    }

    /// JSON payload shaped like a well-formed storyboard response.
    pub(crate) fn sample_storyboard_json() -> Value {
        let scenes: Vec<Value> = (1..=SCENE_COUNT)
            .map(|i| {
                json!({
                    "id": format!("s{}", i),
                    "timestamp": format!("00:{:02}", i * 3),
                    "visual_prompt": format!("scene {} close-up", i),
                    "audio_prompt": "upbeat synth",
                    "negative_prompt": "blurry, watermark",
                    "transition": if i % 2 == 0 { "fade" } else { "zoom" }
                })
            })
            .collect();
        json!({
            "character_seed_description": "woman in her 30s, red coat, short hair",
            "global_style": "soft morning light, film grain",
            "scenes": scenes
        })
    }

    /// Render options shrunk so polling tests run in microseconds. The
    /// 60-attempt budget and the two-tier shape are unchanged.
    pub(crate) fn fast_render_options() -> crate::pipeline::render::RenderOptions {
        crate::pipeline::render::RenderOptions {
            short_poll_delay: std::time::Duration::from_micros(10),
            long_poll_delay: std::time::Duration::from_micros(20),
            output_dir: std::env::temp_dir().join(format!("affgen-test-{}", uuid::Uuid::new_v4())),
            ..Default::default()
        }
    }
}

// src/pipeline/assemble.rs
//! Master assembly. The production cut (concatenation, transitions, audio
//! bed) belongs behind [`MasterAssembler`]; the default implementation is a
//! pick-first placeholder so the rest of the pipeline is exercisable end
//! to end.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::types::{MasterArtifact, RenderedClip, ScenePrompt};

/// Combines an ordered set of rendered clips into one master artifact.
#[async_trait]
pub trait MasterAssembler: Send + Sync {
    async fn assemble(
        &self,
        clips: &[RenderedClip],
        scenes: &[ScenePrompt],
    ) -> Result<MasterArtifact, PipelineError>;
}

/// Placeholder assembler: waits a settling period, then promotes the first
/// clip as the master. Transition markers on the scenes are ignored.
pub struct FirstClipAssembler {
    settling_delay: Duration,
}

impl FirstClipAssembler {
    pub fn new() -> Self {
        Self {
            settling_delay: Duration::from_secs(3),
        }
    }

    pub fn with_settling_delay(mut self, delay: Duration) -> Self {
        self.settling_delay = delay;
        self
    }
}

impl Default for FirstClipAssembler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MasterAssembler for FirstClipAssembler {
    async fn assemble(
        &self,
        clips: &[RenderedClip],
        _scenes: &[ScenePrompt],
    ) -> Result<MasterArtifact, PipelineError> {
        let first = clips
            .first()
            .ok_or_else(|| PipelineError::Assembly("no clips to assemble".to_string()))?;

        tokio::time::sleep(self.settling_delay).await;
        tracing::info!(
            "assembled master from {} clip(s), using {}",
            clips.len(),
            first.path.display()
        );

        Ok(MasterArtifact {
            path: first.path.clone(),
            clip_count: clips.len(),
        })
    }
}

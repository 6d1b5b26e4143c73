// src/pipeline/orchestrator.rs
//! Drives a production run through its stages and owns all run state. The
//! orchestrator is the only writer of that state; observers see it through
//! accessors and the progress channel.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::PipelineError;
use crate::pipeline::assemble::MasterAssembler;
use crate::pipeline::render::RenderOptions;
use crate::pipeline::{analyze, render, storyboard, PipelineStatus, ProgressUpdate};
use crate::reasoning_client::ReasoningService;
use crate::session::{Credentials, ModelSelection};
use crate::types::{
    MasterArtifact, ProductDescriptor, ReferenceImage, RenderProfile, RenderedClip, SceneField,
    Storyboard,
};
use crate::video_client::VideoService;

/// Owns one production session: credentials, model selections, and the
/// artifacts of the current run. Stages execute sequentially; a failure in
/// any stage moves the run to `Failed` and keeps the storyboard so the run
/// can be edited and restarted.
pub struct ProductionOrchestrator {
    reasoning: Arc<dyn ReasoningService>,
    video: Arc<dyn VideoService>,
    assembler: Arc<dyn MasterAssembler>,
    credentials: Credentials,
    models: ModelSelection,
    profile: RenderProfile,
    render_options: RenderOptions,
    progress: Option<mpsc::UnboundedSender<ProgressUpdate>>,
    status: PipelineStatus,
    status_message: String,
    product: Option<ProductDescriptor>,
    storyboard: Option<Storyboard>,
    clips: Vec<RenderedClip>,
    master: Option<MasterArtifact>,
}

impl ProductionOrchestrator {
    pub fn new(
        reasoning: Arc<dyn ReasoningService>,
        video: Arc<dyn VideoService>,
        assembler: Arc<dyn MasterAssembler>,
        credentials: Credentials,
        models: ModelSelection,
    ) -> Self {
        Self {
            reasoning,
            video,
            assembler,
            credentials,
            models,
            profile: RenderProfile::default(),
            render_options: RenderOptions::default(),
            progress: None,
            status: PipelineStatus::Idle,
            status_message: String::new(),
            product: None,
            storyboard: None,
            clips: Vec::new(),
            master: None,
        }
    }

    pub fn with_profile(mut self, profile: RenderProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render_options = options;
        self
    }

    pub fn with_progress(mut self, sender: mpsc::UnboundedSender<ProgressUpdate>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn status(&self) -> &PipelineStatus {
        &self.status
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn product(&self) -> Option<&ProductDescriptor> {
        self.product.as_ref()
    }

    pub fn storyboard(&self) -> Option<&Storyboard> {
        self.storyboard.as_ref()
    }

    /// Clips finished so far in the current run, in scene order. Grows as
    /// renders complete; each clip is usable before the run finishes.
    pub fn clips(&self) -> &[RenderedClip] {
        &self.clips
    }

    pub fn master(&self) -> Option<&MasterArtifact> {
        self.master.as_ref()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn models(&self) -> ModelSelection {
        self.models
    }

    /// Replaces the session credentials. Refused while a run is in flight
    /// so a stage never observes a key change mid-run.
    pub fn set_credentials(&mut self, credentials: Credentials) -> Result<(), PipelineError> {
        if self.status.is_active() {
            return Err(PipelineError::InvalidState(
                "cannot change credentials during an active run".to_string(),
            ));
        }
        self.credentials = credentials;
        Ok(())
    }

    pub fn set_models(&mut self, models: ModelSelection) -> Result<(), PipelineError> {
        if self.status.is_active() {
            return Err(PipelineError::InvalidState(
                "cannot change models during an active run".to_string(),
            ));
        }
        self.models = models;
        Ok(())
    }

    /// Typed edit of one scene in the held storyboard. Only permitted while
    /// no stage is in flight.
    pub fn update_scene(
        &mut self,
        index: usize,
        field: SceneField,
        value: &str,
    ) -> Result<(), PipelineError> {
        if self.status.is_active() {
            return Err(PipelineError::InvalidState(
                "cannot edit scenes during an active run".to_string(),
            ));
        }
        let board = self.storyboard.as_ref().ok_or_else(|| {
            PipelineError::InvalidState("no storyboard to edit".to_string())
        })?;
        self.storyboard = Some(board.update_scene(index, field, value)?);
        Ok(())
    }

    /// Resumes a prepared session from an existing product and storyboard,
    /// skipping the analysis and storyboard stages.
    pub fn restore(
        &mut self,
        product: ProductDescriptor,
        storyboard: Storyboard,
    ) -> Result<(), PipelineError> {
        if self.status.is_active() {
            return Err(PipelineError::InvalidState(
                "cannot restore during an active run".to_string(),
            ));
        }
        self.product = Some(product);
        self.storyboard = Some(storyboard);
        self.clips.clear();
        self.master = None;
        self.status = PipelineStatus::Idle;
        self.status_message.clear();
        Ok(())
    }

    /// Analysis + storyboard: turns a product URL into a ready-to-render
    /// storyboard. The reasoning credential is checked before any state
    /// changes, so a missing key leaves the session untouched.
    pub async fn start_analysis(
        &mut self,
        source_url: &str,
        reference_image: Option<ReferenceImage>,
    ) -> Result<(), PipelineError> {
        if self.status.is_active() {
            return Err(PipelineError::InvalidState(
                "a run is already in flight".to_string(),
            ));
        }
        if self.credentials.reasoning_key().is_none() {
            return Err(PipelineError::CredentialMissing("gemini"));
        }

        self.clips.clear();
        self.master = None;
        self.storyboard = None;

        self.transition(PipelineStatus::Analyzing, "ANALYZING PRODUCT DNA...");
        let product = analyze::run(
            self.reasoning.as_ref(),
            self.models.reasoning,
            source_url,
            reference_image,
        )
        .await;
        self.product = Some(product.clone());

        self.transition(PipelineStatus::Storyboarding, "DIRECTING SCENES...");
        let board =
            match storyboard::run(self.reasoning.as_ref(), self.models.reasoning, &product).await {
                Ok(board) => board,
                Err(e) => {
                    self.fail(&e);
                    return Err(e);
                }
            };
        self.storyboard = Some(board);

        self.status = PipelineStatus::Idle;
        self.status_message.clear();
        self.publish("STORYBOARD READY");
        Ok(())
    }

    /// Renders every scene sequentially, then assembles the master.
    /// Credentials are snapshotted at entry; each finished clip is published
    /// before the next render starts.
    pub async fn execute_production(&mut self) -> Result<MasterArtifact, PipelineError> {
        if self.status.is_active() {
            return Err(PipelineError::InvalidState(
                "a run is already in flight".to_string(),
            ));
        }
        let (board, product) = match (self.storyboard.clone(), self.product.clone()) {
            (Some(board), Some(product)) => (board, product),
            _ => {
                return Err(PipelineError::InvalidState(
                    "no storyboard to produce".to_string(),
                ))
            }
        };
        let credentials = self.credentials.clone();
        let total = board.scenes.len();

        self.clips.clear();
        self.master = None;
        self.status = PipelineStatus::Rendering;

        for (i, scene) in board.scenes.iter().enumerate() {
            self.set_message(format!("RENDERING SCENE {}/{}...", i + 1, total));
            let clip = match render::run(
                self.video.as_ref(),
                &credentials,
                self.models.video,
                scene,
                &board.character_seed_description,
                &product,
                &board.global_style,
                &self.profile,
                &self.render_options,
            )
            .await
            {
                Ok(clip) => clip,
                Err(e) => {
                    self.fail(&e);
                    return Err(e);
                }
            };
            self.clips.push(clip);
            self.set_message(format!("SCENE {}/{} READY", i + 1, total));
        }

        self.transition(PipelineStatus::Assembling, "ASSEMBLING MASTER...");
        let master = match self.assembler.assemble(&self.clips, &board.scenes).await {
            Ok(master) => master,
            Err(e) => {
                self.fail(&e);
                return Err(e);
            }
        };
        self.master = Some(master.clone());

        self.status = PipelineStatus::Completed;
        self.status_message.clear();
        self.publish("PRODUCTION COMPLETE");
        Ok(master)
    }

    fn transition(&mut self, status: PipelineStatus, message: &str) {
        self.status = status;
        self.status_message = message.to_string();
        self.publish(message);
    }

    fn set_message(&mut self, message: String) {
        self.status_message = message.clone();
        self.publish(&message);
    }

    fn fail(&mut self, error: &PipelineError) {
        tracing::error!("production run failed: {}", error);
        self.status = PipelineStatus::Failed {
            error: error.to_string(),
        };
        self.status_message = format!("FAILED: {}", error);
        let message = self.status_message.clone();
        self.publish(&message);
    }

    fn publish(&self, message: &str) {
        let total = self.storyboard.as_ref().map_or(0, |b| b.scenes.len());
        let update = ProgressUpdate::new(
            message.to_string(),
            self.status.clone(),
            self.clips.len(),
            total,
        );
        tracing::debug!("{:?}: {}", update.status, update.message);
        if let Some(sender) = &self.progress {
            // A dropped receiver only means nobody is watching.
            let _ = sender.send(update);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::assemble::FirstClipAssembler;
    use crate::pipeline::testing::{
        fast_render_options, sample_storyboard_json, storyboard_with_scenes, MockReasoning,
        MockVideo,
    };
    use crate::types::{Transition, VideoModel, SCENE_COUNT};
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn credentials() -> Credentials {
        Credentials {
            gemini: "g-key".to_string(),
            ..Default::default()
        }
    }

    fn assembler() -> Arc<FirstClipAssembler> {
        Arc::new(FirstClipAssembler::new().with_settling_delay(Duration::from_micros(10)))
    }

    fn orchestrator(
        reasoning: Arc<MockReasoning>,
        video: Arc<MockVideo>,
        credentials: Credentials,
    ) -> ProductionOrchestrator {
        ProductionOrchestrator::new(
            reasoning,
            video,
            assembler(),
            credentials,
            ModelSelection::default(),
        )
        .with_render_options(fast_render_options())
    }

    fn sample_product() -> ProductDescriptor {
        ProductDescriptor {
            name: "Widget X".to_string(),
            description: "A very good widget".to_string(),
            usp: "Lasts forever".to_string(),
            url: "https://example.com/widget".to_string(),
            image: None,
            category: None,
        }
    }

    #[tokio::test]
    async fn missing_credential_rejects_before_any_call() {
        let reasoning = Arc::new(MockReasoning::new(sample_storyboard_json()));
        let video = Arc::new(MockVideo::new(1));
        let mut orch = orchestrator(reasoning.clone(), video, Credentials::default());

        let err = orch
            .start_analysis("https://example.com/widget", None)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::CredentialMissing("gemini")));
        assert_eq!(reasoning.analyze_calls.load(Ordering::SeqCst), 0);
        assert_eq!(reasoning.direct_calls.load(Ordering::SeqCst), 0);
        assert_eq!(*orch.status(), PipelineStatus::Idle);
    }

    #[tokio::test]
    async fn analysis_produces_a_full_storyboard_and_returns_to_idle() {
        let reasoning = Arc::new(MockReasoning::new(sample_storyboard_json()));
        let video = Arc::new(MockVideo::new(1));
        let mut orch = orchestrator(reasoning.clone(), video, credentials());

        orch.start_analysis("https://example.com/widget", None)
            .await
            .unwrap();

        assert_eq!(*orch.status(), PipelineStatus::Idle);
        assert_eq!(orch.status_message(), "");
        assert_eq!(orch.product().unwrap().name, "Widget X");
        let board = orch.storyboard().unwrap();
        assert_eq!(board.scenes.len(), SCENE_COUNT);
        assert_eq!(board.scenes[0].transition, Transition::Zoom);
        assert_eq!(reasoning.analyze_calls.load(Ordering::SeqCst), 1);
        assert_eq!(reasoning.direct_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn analysis_failure_degrades_to_placeholder_product() {
        let mut reasoning = MockReasoning::new(sample_storyboard_json());
        reasoning.fail_analyze = true;
        let video = Arc::new(MockVideo::new(1));
        let mut orch = orchestrator(Arc::new(reasoning), video, credentials());

        orch.start_analysis("https://example.com/widget", None)
            .await
            .unwrap();

        assert_eq!(orch.product().unwrap().name, "Pro Product");
        assert_eq!(orch.storyboard().unwrap().scenes.len(), SCENE_COUNT);
    }

    #[tokio::test]
    async fn storyboard_failure_marks_the_run_failed() {
        let mut reasoning = MockReasoning::new(json!({}));
        reasoning.fail_direct = true;
        let video = Arc::new(MockVideo::new(1));
        let mut orch = orchestrator(Arc::new(reasoning), video, credentials());

        let err = orch
            .start_analysis("https://example.com/widget", None)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Transport(_)));
        assert!(matches!(orch.status(), PipelineStatus::Failed { .. }));
        assert!(orch.storyboard().is_none());
        // The analysis result survives for a retry.
        assert!(orch.product().is_some());
    }

    #[tokio::test]
    async fn production_publishes_each_clip_and_promotes_the_first() {
        let reasoning = Arc::new(MockReasoning::new(sample_storyboard_json()));
        let video = Arc::new(MockVideo::new(1));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let options = fast_render_options();
        let mut orch = ProductionOrchestrator::new(
            reasoning,
            video.clone(),
            assembler(),
            credentials(),
            ModelSelection::default(),
        )
        .with_render_options(options.clone())
        .with_progress(tx);

        orch.restore(sample_product(), storyboard_with_scenes(3))
            .unwrap();
        let master = orch.execute_production().await.unwrap();

        assert_eq!(orch.clips().len(), 3);
        assert_eq!(master.clip_count, 3);
        assert_eq!(master.path, orch.clips()[0].path);
        assert_eq!(orch.master(), Some(&master));
        assert_eq!(*orch.status(), PipelineStatus::Completed);
        assert_eq!(video.submit_calls.load(Ordering::SeqCst), 3);

        // Clip counts grow 1, 2, 3 across the READY updates.
        let mut ready_counts = Vec::new();
        while let Ok(update) = rx.try_recv() {
            if update.message.ends_with("READY") {
                ready_counts.push(update.clips_ready);
            }
        }
        assert_eq!(ready_counts, vec![1, 2, 3]);

        std::fs::remove_dir_all(&options.output_dir).unwrap();
    }

    #[tokio::test]
    async fn render_failure_keeps_the_storyboard_for_a_retry() {
        let reasoning = Arc::new(MockReasoning::new(sample_storyboard_json()));
        let video = Arc::new(MockVideo::new(1));
        let mut orch = orchestrator(reasoning, video.clone(), credentials());
        orch.set_models(ModelSelection {
            video: VideoModel::KlingV15,
            ..Default::default()
        })
        .unwrap();

        orch.restore(sample_product(), storyboard_with_scenes(3))
            .unwrap();
        let err = orch.execute_production().await.unwrap_err();

        assert!(matches!(err, PipelineError::UnsupportedModel(_)));
        assert!(matches!(orch.status(), PipelineStatus::Failed { .. }));
        assert_eq!(video.submit_calls.load(Ordering::SeqCst), 0);
        assert!(orch.clips().is_empty());
        assert_eq!(orch.storyboard().unwrap().scenes.len(), 3);
    }

    #[tokio::test]
    async fn production_without_a_storyboard_is_an_invalid_state() {
        let reasoning = Arc::new(MockReasoning::new(sample_storyboard_json()));
        let video = Arc::new(MockVideo::new(1));
        let mut orch = orchestrator(reasoning, video, credentials());

        let err = orch.execute_production().await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidState(_)));
    }

    #[tokio::test]
    async fn scene_edits_apply_between_runs() {
        let reasoning = Arc::new(MockReasoning::new(sample_storyboard_json()));
        let video = Arc::new(MockVideo::new(1));
        let mut orch = orchestrator(reasoning, video, credentials());

        // Nothing to edit before a storyboard exists.
        let err = orch
            .update_scene(0, SceneField::VisualPrompt, "wide shot")
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidState(_)));

        orch.restore(sample_product(), storyboard_with_scenes(3))
            .unwrap();
        orch.update_scene(1, SceneField::Transition, "glitch").unwrap();
        assert_eq!(
            orch.storyboard().unwrap().scenes[1].transition,
            Transition::Glitch
        );

        let err = orch
            .update_scene(7, SceneField::Timestamp, "00:21")
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidState(_)));
    }

    #[tokio::test]
    async fn credentials_can_change_while_idle() {
        let reasoning = Arc::new(MockReasoning::new(sample_storyboard_json()));
        let video = Arc::new(MockVideo::new(1));
        let mut orch = orchestrator(reasoning, video, Credentials::default());

        orch.set_credentials(credentials()).unwrap();
        assert_eq!(orch.credentials().reasoning_key(), Some("g-key"));
    }
}

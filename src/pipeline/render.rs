// src/pipeline/render.rs
//! Scene-render stage: submit one render job and poll it to completion
//! under a hard attempt budget.

use std::path::PathBuf;
use std::time::Duration;

use uuid::Uuid;

use crate::error::PipelineError;
use crate::session::Credentials;
use crate::types::{ProductDescriptor, RenderProfile, RenderedClip, ScenePrompt, VideoModel};
use crate::video_client::VideoService;

/// Polling and output policy for a single render.
///
/// The two delay tiers approximate exponential backoff: a short delay for
/// the first `short_tier_attempts` polls, a longer delay thereafter. The
/// 60-attempt bound is the contract; the delay curve is policy.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Hard bound on poll calls per job.
    pub max_poll_attempts: u32,
    pub short_poll_delay: Duration,
    pub long_poll_delay: Duration,
    pub short_tier_attempts: u32,
    /// Directory the fetched asset is written to.
    pub output_dir: PathBuf,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_poll_attempts: 60,
            short_poll_delay: Duration::from_secs(5),
            long_poll_delay: Duration::from_secs(10),
            short_tier_attempts: 5,
            output_dir: PathBuf::from("outputs"),
        }
    }
}

/// Builds the enhanced prompt submitted for one scene: global style, the
/// scene's visual description, the character-seed anchor, the product name,
/// and fixed quality modifiers.
pub(crate) fn compose_prompt(
    scene: &ScenePrompt,
    character_seed: &str,
    product: &ProductDescriptor,
    global_style: &str,
) -> String {
    format!(
        "{}. {}. Character: {}. Product: {}. 4k, hyper-realistic, consistent lighting, 24fps.",
        global_style, scene.visual_prompt, character_seed, product.name
    )
}

/// Renders one scene to a locally addressable clip.
///
/// The model family and credential are validated before anything else: an
/// unsupported family or missing key fails immediately, with no network
/// call and no delay.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    video: &dyn VideoService,
    credentials: &Credentials,
    model: VideoModel,
    scene: &ScenePrompt,
    character_seed: &str,
    product: &ProductDescriptor,
    global_style: &str,
    profile: &RenderProfile,
    options: &RenderOptions,
) -> Result<RenderedClip, PipelineError> {
    if !model.is_veo() || credentials.video_key(model).is_none() {
        return Err(PipelineError::UnsupportedModel(model.label().to_string()));
    }

    let prompt = compose_prompt(scene, character_seed, product, global_style);
    tracing::debug!("scene {} render prompt: {}", scene.id, prompt);

    let mut job = video
        .submit(model, &prompt, product.image.as_ref(), profile)
        .await?;

    let mut attempts = 0u32;
    while !job.done && attempts < options.max_poll_attempts {
        let delay = if attempts < options.short_tier_attempts {
            options.short_poll_delay
        } else {
            options.long_poll_delay
        };
        tokio::time::sleep(delay).await;
        job = video.poll(&job).await?;
        attempts += 1;
    }

    if !job.done {
        return Err(PipelineError::Timeout { attempts });
    }

    let bytes = video.fetch_asset(&job).await?;
    std::fs::create_dir_all(&options.output_dir)?;
    let path = options.output_dir.join(format!("{}.mp4", Uuid::new_v4()));
    std::fs::write(&path, &bytes)?;
    tracing::info!(
        "scene {} rendered to {} ({} bytes)",
        scene.id,
        path.display(),
        bytes.len()
    );

    Ok(RenderedClip {
        scene_id: scene.id.clone(),
        path,
    })
}

// src/types.rs
//! Core data model for the production pipeline: product descriptors,
//! storyboards, rendered clips, and the model/profile selections.

use std::path::PathBuf;

use base64::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// A storyboard always carries exactly this many scenes.
pub const SCENE_COUNT: usize = 10;

/// Inline reference image used to anchor image-to-video generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ReferenceImage {
    /// Parses a `data:image/png;base64,...` style reference. Anything that
    /// is not an embedded base64 image yields `None`.
    pub fn from_data_url(url: &str) -> Option<Self> {
        let rest = url.strip_prefix("data:")?;
        let (meta, payload) = rest.split_once(',')?;
        let mime_type = meta.strip_suffix(";base64")?.to_string();
        if !mime_type.starts_with("image/") {
            return None;
        }
        let data = BASE64_STANDARD.decode(payload).ok()?;
        Some(Self { mime_type, data })
    }
}

/// Product information derived by the analysis stage. Immutable once the
/// storyboard stage begins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDescriptor {
    pub name: String,
    pub description: String,
    pub usp: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ReferenceImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ProductDescriptor {
    /// Degraded descriptor substituted when analysis is unreachable.
    pub fn placeholder(url: &str) -> Self {
        Self {
            name: "Pro Product".to_string(),
            description: "High-end product analyzed by AI".to_string(),
            usp: "Top Rated".to_string(),
            url: url.to_string(),
            image: None,
            category: None,
        }
    }
}

/// Transition into the following scene on the timeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    #[default]
    Cut,
    Fade,
    Glitch,
    Zoom,
}

impl Transition {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "cut" => Some(Transition::Cut),
            "fade" => Some(Transition::Fade),
            "glitch" => Some(Transition::Glitch),
            "zoom" => Some(Transition::Zoom),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Transition::Cut => "cut",
            Transition::Fade => "fade",
            Transition::Glitch => "glitch",
            Transition::Zoom => "zoom",
        }
    }
}

/// One independently generated unit of video, identified by id and timeline
/// timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenePrompt {
    pub id: String,
    pub timestamp: String,
    pub visual_prompt: String,
    pub audio_prompt: String,
    pub negative_prompt: String,
    #[serde(default)]
    pub transition: Transition,
}

/// The editable fields of a scene prompt. Scene ids are assigned by the
/// storyboard stage and never edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneField {
    Timestamp,
    VisualPrompt,
    AudioPrompt,
    NegativePrompt,
    Transition,
}

/// Ordered creative plan: a consistency anchor, a shared visual style, and
/// the scene sequence. Order maps to timeline position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Storyboard {
    pub character_seed_description: String,
    pub global_style: String,
    pub scenes: Vec<ScenePrompt>,
}

impl Storyboard {
    /// Typed scene edit. Returns a new storyboard; the receiver is never
    /// mutated, which keeps orchestrator transitions auditable.
    pub fn update_scene(
        &self,
        index: usize,
        field: SceneField,
        value: &str,
    ) -> Result<Storyboard, PipelineError> {
        let mut next = self.clone();
        let scene = next.scenes.get_mut(index).ok_or_else(|| {
            PipelineError::InvalidState(format!("scene index {} out of range", index))
        })?;
        match field {
            SceneField::Timestamp => scene.timestamp = value.to_string(),
            SceneField::VisualPrompt => scene.visual_prompt = value.to_string(),
            SceneField::AudioPrompt => scene.audio_prompt = value.to_string(),
            SceneField::NegativePrompt => scene.negative_prompt = value.to_string(),
            SceneField::Transition => {
                scene.transition = Transition::parse(value).ok_or_else(|| {
                    PipelineError::SchemaViolation(format!("unknown transition '{}'", value))
                })?;
            }
        }
        Ok(next)
    }
}

/// Locally addressable handle to one finished clip. One-to-one with a scene
/// once its render succeeds; never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedClip {
    pub scene_id: String,
    pub path: PathBuf,
}

/// Final assembled output of a production run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterArtifact {
    pub path: PathBuf,
    pub clip_count: usize,
}

/// Hosted text-reasoning model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReasoningModel {
    #[default]
    #[serde(rename = "gemini-3-pro")]
    Gemini3Pro,
    #[serde(rename = "gemini-3-flash")]
    Gemini3Flash,
}

impl ReasoningModel {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "gemini-3-pro" => Some(ReasoningModel::Gemini3Pro),
            "gemini-3-flash" => Some(ReasoningModel::Gemini3Flash),
            _ => None,
        }
    }

    /// Model identifier on the wire.
    pub fn wire_id(self) -> &'static str {
        match self {
            ReasoningModel::Gemini3Pro => "gemini-3-pro-preview",
            ReasoningModel::Gemini3Flash => "gemini-3-flash-preview",
        }
    }
}

/// Hosted video-generation model variants. Only the Veo family has a
/// configured path in this client; the others fail fast at render time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoModel {
    #[default]
    #[serde(rename = "veo-3.1-fast")]
    Veo31Fast,
    #[serde(rename = "veo-3.1-high")]
    Veo31High,
    #[serde(rename = "kling-v1.5")]
    KlingV15,
    #[serde(rename = "luma-dream-machine")]
    LumaDreamMachine,
}

impl VideoModel {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "veo-3.1-fast" => Some(VideoModel::Veo31Fast),
            "veo-3.1-high" => Some(VideoModel::Veo31High),
            "kling-v1.5" => Some(VideoModel::KlingV15),
            "luma-dream-machine" => Some(VideoModel::LumaDreamMachine),
            _ => None,
        }
    }

    pub fn is_veo(self) -> bool {
        matches!(self, VideoModel::Veo31Fast | VideoModel::Veo31High)
    }

    pub fn label(self) -> &'static str {
        match self {
            VideoModel::Veo31Fast => "veo-3.1-fast",
            VideoModel::Veo31High => "veo-3.1-high",
            VideoModel::KlingV15 => "kling-v1.5",
            VideoModel::LumaDreamMachine => "luma-dream-machine",
        }
    }

    /// Model identifier on the wire. Meaningful only for the Veo family.
    pub fn wire_id(self) -> &'static str {
        match self {
            VideoModel::Veo31Fast => "veo-3.1-fast-generate-preview",
            VideoModel::Veo31High => "veo-3.1-generate-preview",
            VideoModel::KlingV15 => "kling-v1.5",
            VideoModel::LumaDreamMachine => "luma-dream-machine",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "1:1")]
    Square,
}

impl AspectRatio {
    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Portrait => "9:16",
            AspectRatio::Landscape => "16:9",
            AspectRatio::Square => "1:1",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
}

impl Resolution {
    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::P720 => "720p",
            Resolution::P1080 => "1080p",
        }
    }
}

/// Output geometry for render submissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderProfile {
    pub aspect_ratio: AspectRatio,
    pub resolution: Resolution,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> Storyboard {
        Storyboard {
            character_seed_description: "woman in her 30s, red coat".to_string(),
            global_style: "soft morning light".to_string(),
            scenes: vec![ScenePrompt {
                id: "s1".to_string(),
                timestamp: "00:00".to_string(),
                visual_prompt: "close-up of the product".to_string(),
                audio_prompt: "upbeat synth".to_string(),
                negative_prompt: "blurry".to_string(),
                transition: Transition::Cut,
            }],
        }
    }

    #[test]
    fn update_scene_returns_new_storyboard() {
        let original = board();
        let updated = original
            .update_scene(0, SceneField::VisualPrompt, "wide shot")
            .unwrap();
        assert_eq!(updated.scenes[0].visual_prompt, "wide shot");
        assert_eq!(original.scenes[0].visual_prompt, "close-up of the product");
    }

    #[test]
    fn update_scene_parses_transition() {
        let updated = board()
            .update_scene(0, SceneField::Transition, "zoom")
            .unwrap();
        assert_eq!(updated.scenes[0].transition, Transition::Zoom);

        let err = board()
            .update_scene(0, SceneField::Transition, "wipe")
            .unwrap_err();
        assert!(matches!(err, PipelineError::SchemaViolation(_)));
    }

    #[test]
    fn update_scene_rejects_out_of_range_index() {
        let err = board()
            .update_scene(5, SceneField::Timestamp, "00:03")
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidState(_)));
    }

    #[test]
    fn reference_image_from_data_url() {
        let img = ReferenceImage::from_data_url("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(img.mime_type, "image/png");
        assert_eq!(img.data, b"hello");

        assert!(ReferenceImage::from_data_url("https://example.com/a.png").is_none());
        assert!(ReferenceImage::from_data_url("data:text/plain;base64,aGVsbG8=").is_none());
    }

    #[test]
    fn model_parsing_round_trips() {
        assert_eq!(VideoModel::parse("kling-v1.5"), Some(VideoModel::KlingV15));
        assert_eq!(VideoModel::parse("veo-3.1-high"), Some(VideoModel::Veo31High));
        assert!(VideoModel::parse("sora-2").is_none());
        assert_eq!(
            ReasoningModel::parse("gemini-3-flash"),
            Some(ReasoningModel::Gemini3Flash)
        );
        assert!(!VideoModel::KlingV15.is_veo());
        assert!(VideoModel::Veo31Fast.is_veo());
    }
}

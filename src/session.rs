// src/session.rs
//! Session settings: service credentials and model selections.
//!
//! Credentials are the only state that survives across sessions. They live
//! in a single JSON record at a fixed path, read at startup and rewritten
//! on every change.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::{ReasoningModel, VideoModel};

/// Environment variable overriding the credential record location.
pub const KEYS_FILE_ENV: &str = "AFFGEN_KEYS_FILE";
/// Default location of the credential record.
pub const DEFAULT_KEYS_FILE: &str = "affgen_keys.json";

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// API keys for the hosted services. An empty string means the key is not
/// configured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub gemini: String,
    #[serde(default)]
    pub veo: String,
    #[serde(default)]
    pub kling: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub luma: Option<String>,
}

impl Credentials {
    /// Key used by the analyze and storyboard stages.
    pub fn reasoning_key(&self) -> Option<&str> {
        non_empty(&self.gemini)
    }

    /// Key used to submit renders for `model`. Veo renders fall back to the
    /// Gemini key when no dedicated Veo key is configured.
    pub fn video_key(&self, model: VideoModel) -> Option<&str> {
        match model {
            VideoModel::Veo31Fast | VideoModel::Veo31High => {
                non_empty(&self.veo).or_else(|| non_empty(&self.gemini))
            }
            VideoModel::KlingV15 => non_empty(&self.kling),
            VideoModel::LumaDreamMachine => self.luma.as_deref().and_then(non_empty),
        }
    }
}

/// Reads and rewrites the credential record.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_env() -> Self {
        let path = std::env::var(KEYS_FILE_ENV).unwrap_or_else(|_| DEFAULT_KEYS_FILE.to_string());
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the persisted record. A missing file is a first run; an
    /// unreadable record is logged and treated as unconfigured rather than
    /// blocking startup.
    pub fn load(&self) -> Credentials {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(credentials) => credentials,
                Err(e) => {
                    tracing::warn!(
                        "credential record at {} is unreadable ({}), starting unconfigured",
                        self.path.display(),
                        e
                    );
                    Credentials::default()
                }
            },
            Err(_) => Credentials::default(),
        }
    }

    /// Rewrites the whole record. Called on every credential change.
    pub fn save(&self, credentials: &Credentials) -> std::io::Result<()> {
        let raw = serde_json::to_string_pretty(credentials)?;
        std::fs::write(&self.path, raw)?;
        tracing::info!("credential record written to {}", self.path.display());
        Ok(())
    }
}

/// Model choices for the current session. Read by every stage invocation,
/// mutated only through settings edits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelSelection {
    pub reasoning: ReasoningModel,
    pub video: VideoModel,
}

impl ModelSelection {
    /// Reads `AFFGEN_REASONING_MODEL` / `AFFGEN_VIDEO_MODEL`, keeping the
    /// defaults when unset and warning on unknown names.
    pub fn from_env() -> Self {
        let mut selection = Self::default();
        if let Ok(value) = std::env::var("AFFGEN_REASONING_MODEL") {
            match ReasoningModel::parse(&value) {
                Some(model) => selection.reasoning = model,
                None => tracing::warn!("unknown reasoning model '{}', keeping default", value),
            }
        }
        if let Ok(value) = std::env::var("AFFGEN_VIDEO_MODEL") {
            match VideoModel::parse(&value) {
                Some(model) => selection.video = model,
                None => tracing::warn!("unknown video model '{}', keeping default", value),
            }
        }
        selection
    }
}

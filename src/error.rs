// src/error.rs
//! Error taxonomy for the production pipeline.
//!
//! The analyze stage is the only place an error is swallowed: product
//! analysis is best-effort and degrades to a placeholder descriptor. Every
//! other stage propagates unchanged, and the orchestrator maps whatever
//! arrives into a `Failed` transition with the raw message.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// A stage was entered without the credential it needs. This blocks
    /// entry before any transition or network call; callers route the user
    /// to configuration rather than reporting a run failure.
    #[error("no credential configured for {0}")]
    CredentialMissing(&'static str),

    /// The reasoning service returned text that is not valid JSON even
    /// after fence stripping.
    #[error("reasoning service returned invalid JSON: {0}")]
    Parse(String),

    /// Well-formed JSON that does not match the storyboard shape.
    #[error("storyboard violates the expected schema: {0}")]
    SchemaViolation(String),

    /// The selected video model has no configured path in this client.
    #[error("no configured path for model {0}")]
    UnsupportedModel(String),

    /// The render polling budget ran out before the job completed.
    #[error("render polling budget exhausted after {attempts} attempts")]
    Timeout { attempts: u32 },

    /// A completed job's asset could not be retrieved or stored.
    #[error("failed to fetch rendered asset: {0}")]
    Fetch(String),

    /// Generic network or remote-service failure.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The assemble stage was handed nothing to work with.
    #[error("cannot assemble master: {0}")]
    Assembly(String),

    /// An operation was attempted in a state that does not allow it.
    #[error("invalid pipeline state: {0}")]
    InvalidState(String),
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        PipelineError::Transport(err.to_string())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Fetch(err.to_string())
    }
}

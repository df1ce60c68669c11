use std::{fmt, path::PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Pipeline stage, used to attribute timeouts and crash manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Analyze,
    Layout,
    Render,
    Synthesize,
    Align,
    Encode,
    Publish,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Analyze => "analyze",
            Stage::Layout => "layout",
            Stage::Render => "render",
            Stage::Synthesize => "synthesize",
            Stage::Align => "align",
            Stage::Encode => "encode",
            Stage::Publish => "publish",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The two ffmpeg invocations of the encoder, and the duration check after them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodeStep {
    SilentVideo,
    Mux,
    Verify,
}

impl fmt::Display for EncodeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeStep::SilentVideo => f.write_str("silent video"),
            EncodeStep::Mux => f.write_str("mux"),
            EncodeStep::Verify => f.write_str("verify"),
        }
    }
}

#[derive(Error, Debug)]
pub enum SlidecastError {
    #[error("Invalid script: {reason}")]
    InvalidScript { reason: String },

    #[error("Invalid options: {reason}")]
    InvalidOptions { reason: String },

    #[error("Headless browser unavailable: {reason}")]
    RendererUnavailable { reason: String },

    #[error("Rendering slide {index} failed: {reason}")]
    SlideRenderFailed { index: usize, reason: String },

    #[error("TTS provider is not configured: {env_var} environment variable is not set")]
    ProviderUnconfigured { env_var: String },

    #[error("TTS provider rejected the credentials (HTTP {status}); check TTS_API_KEY")]
    ProviderRejected { status: u16 },

    #[error("Speech synthesis failed: {reason}")]
    SynthesisFailed { reason: String },

    #[error("Media probe failed for {path}: {reason}")]
    ProbeFailed { path: PathBuf, reason: String },

    #[error("Cannot align slides to narration: {reason}")]
    CannotAlign { reason: String },

    #[error("Encoder unavailable: {reason}")]
    EncoderUnavailable { reason: String },

    #[error("Encoding failed during {step}: {stderr_tail}")]
    EncodingFailed { step: EncodeStep, stderr_tail: String },

    #[error("Working directory {path} is in use by another job")]
    WorkDirBusy { path: PathBuf },

    #[error("Render cancelled")]
    Cancelled,

    #[error("Stage {stage} timed out")]
    Timeout { stage: Stage },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),
}

impl SlidecastError {
    /// Process exit code the CLI reports for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            SlidecastError::InvalidScript { .. } | SlidecastError::InvalidOptions { .. } => 2,
            SlidecastError::RendererUnavailable { .. }
            | SlidecastError::EncoderUnavailable { .. } => 3,
            SlidecastError::ProviderUnconfigured { .. }
            | SlidecastError::ProviderRejected { .. }
            | SlidecastError::SynthesisFailed { .. } => 4,
            _ => 5,
        }
    }

    /// Short machine-readable kind, recorded in crash manifests.
    pub fn kind(&self) -> &'static str {
        match self {
            SlidecastError::InvalidScript { .. } => "invalid_script",
            SlidecastError::InvalidOptions { .. } => "invalid_options",
            SlidecastError::RendererUnavailable { .. } => "renderer_unavailable",
            SlidecastError::SlideRenderFailed { .. } => "slide_render_failed",
            SlidecastError::ProviderUnconfigured { .. } => "provider_unconfigured",
            SlidecastError::ProviderRejected { .. } => "provider_rejected",
            SlidecastError::SynthesisFailed { .. } => "synthesis_failed",
            SlidecastError::ProbeFailed { .. } => "probe_failed",
            SlidecastError::CannotAlign { .. } => "cannot_align",
            SlidecastError::EncoderUnavailable { .. } => "encoder_unavailable",
            SlidecastError::EncodingFailed { .. } => "encoding_failed",
            SlidecastError::WorkDirBusy { .. } => "work_dir_busy",
            SlidecastError::Cancelled => "cancelled",
            SlidecastError::Timeout { .. } => "timeout",
            SlidecastError::IoError(_) => "io",
            SlidecastError::JsonError(_) => "json",
            SlidecastError::ApiError(_) => "api",
            SlidecastError::ImageError(_) => "image",
        }
    }
}

pub type Result<T> = std::result::Result<T, SlidecastError>;

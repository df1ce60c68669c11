//! Job artifact manifest (`manifest.json`) and crash manifest (`crash.json`).

use std::{
    path::{Path, PathBuf},
    time::SystemTime,
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{Result, SlidecastError, Stage},
    theme::Theme,
    types::{AudioArtifact, FrameArtifact, Layout, ProfileKind, Quality, TimedSlide},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideEntry {
    pub index: usize,
    pub layout: Layout,
    pub heading: String,
    pub start_ms: u64,
    pub duration_ms: u64,
    pub frame_path: PathBuf,
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioEntry {
    pub path: PathBuf,
    pub duration_seconds: f64,
    pub profile: ProfileKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobManifest {
    pub job_id: Uuid,
    pub script_hash: String,
    pub theme: Theme,
    pub quality: Quality,
    pub slides: Vec<SlideEntry>,
    pub audio: AudioEntry,
    pub output: PathBuf,
}

impl JobManifest {
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        job_id: Uuid,
        script_hash: &str,
        theme: Theme,
        quality: Quality,
        timed: &[TimedSlide],
        frames: &[FrameArtifact],
        audio: &AudioArtifact,
        output: &Path,
    ) -> Self {
        let slides = timed
            .iter()
            .map(|slide| {
                let frame = frames.iter().find(|f| f.index == slide.spec.index);
                SlideEntry {
                    index: slide.spec.index,
                    layout: slide.spec.layout(),
                    heading: slide.spec.body.heading().to_string(),
                    start_ms: slide.start_ms,
                    duration_ms: slide.duration_ms,
                    frame_path: frame.map(|f| f.path.clone()).unwrap_or_default(),
                    fingerprint: frame.map(|f| f.fingerprint.clone()).unwrap_or_default(),
                }
            })
            .collect();

        Self {
            job_id,
            script_hash: script_hash.to_string(),
            theme,
            quality,
            slides,
            audio: AudioEntry {
                path: audio.path.clone(),
                duration_seconds: audio.duration_seconds,
                profile: audio.profile,
            },
            output: output.to_path_buf(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrashManifest {
    pub job_id: Uuid,
    pub script_hash: String,
    pub state: TerminalState,
    pub stage: Option<Stage>,
    pub error_kind: &'static str,
    pub error: String,
    pub exit_code: i32,
    /// Artifacts left in the working directory for inspection.
    pub preserved: Vec<PathBuf>,
    pub at: SystemTime,
}

impl CrashManifest {
    pub fn new(
        job_id: Uuid,
        script_hash: &str,
        stage: Option<Stage>,
        error: &SlidecastError,
        preserved: Vec<PathBuf>,
    ) -> Self {
        let state = match error {
            SlidecastError::Cancelled => TerminalState::Cancelled,
            _ => TerminalState::Failed,
        };
        Self {
            job_id,
            script_hash: script_hash.to_string(),
            state,
            stage,
            error_kind: error.kind(),
            error: error.to_string(),
            exit_code: error.exit_code(),
            preserved,
            at: SystemTime::now(),
        }
    }
}

/// Writes `value` as pretty JSON through a temp file and rename.
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

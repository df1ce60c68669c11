//! Builds the final MP4 from timed frames and the narration with ffmpeg:
//! concat demuxer to a silent H.264 video, then a mux with the audio.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use tracing::{debug, info, instrument, warn};

use crate::{
    cache,
    cancel::CancelSignal,
    error::{EncodeStep, Result, SlidecastError, Stage},
    runner::{ProcessRunner, RunError, ToolCommand},
    types::{AudioArtifact, FrameArtifact, Quality, TimedSlide},
};

/// Lines of ffmpeg stderr kept in an `EncodingFailed` error.
const STDERR_TAIL_LINES: usize = 20;
const FRAME_RATE: &str = "30";
const AUDIO_BITRATE: &str = "192k";

pub struct VideoEncoder {
    runner: Arc<dyn ProcessRunner>,
    ffmpeg: PathBuf,
    job_dir: PathBuf,
    timeout: Duration,
}

/// Everything one encode needs.
pub struct EncodeJob<'a> {
    pub timed: &'a [TimedSlide],
    pub frames: &'a [FrameArtifact],
    pub audio: &'a AudioArtifact,
    pub quality: Quality,
    pub captions: Option<&'a Path>,
    pub output: &'a Path,
}

impl VideoEncoder {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        ffmpeg: impl Into<PathBuf>,
        job_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            ffmpeg: ffmpeg.into(),
            job_dir: job_dir.into(),
            timeout: Duration::from_secs(600),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Checks ffmpeg starts at all.
    pub async fn preflight(&self, cancel: &CancelSignal) -> Result<()> {
        let cmd = ToolCommand::new(&self.ffmpeg, "ffmpeg")
            .arg("-version")
            .timeout(Duration::from_secs(15));
        let output = self.runner.run(&cmd, cancel).await.map_err(|e| match e {
            RunError::Cancelled => SlidecastError::Cancelled,
            other => SlidecastError::EncoderUnavailable {
                reason: format!("{}: {other}", self.ffmpeg.display()),
            },
        })?;
        if !output.success {
            return Err(SlidecastError::EncoderUnavailable {
                reason: format!(
                    "{} -version failed: {}",
                    self.ffmpeg.display(),
                    output.stderr_tail(5)
                ),
            });
        }
        Ok(())
    }

    #[instrument(skip_all, fields(slides = job.timed.len(), quality = job.quality.name()))]
    pub async fn encode(&self, job: &EncodeJob<'_>, cancel: &CancelSignal) -> Result<PathBuf> {
        let manifest_path = cache::concat_manifest_path(&self.job_dir);
        let silent_path = cache::silent_video_path(&self.job_dir);

        let manifest = concat_manifest(job.timed, job.frames, &self.job_dir)?;
        tokio::fs::write(&manifest_path, manifest).await?;
        debug!(path = %manifest_path.display(), "wrote concat manifest");

        let result = self.run_steps(job, &manifest_path, &silent_path, cancel).await;

        remove_if_exists(&silent_path).await;
        match result {
            Ok(()) => {
                remove_if_exists(&manifest_path).await;
                info!(output = %job.output.display(), "video encoded");
                Ok(job.output.to_path_buf())
            }
            Err(e) => {
                remove_if_exists(job.output).await;
                Err(e)
            }
        }
    }

    async fn run_steps(
        &self,
        job: &EncodeJob<'_>,
        manifest_path: &Path,
        silent_path: &Path,
        cancel: &CancelSignal,
    ) -> Result<()> {
        let silent = ToolCommand::new(&self.ffmpeg, "ffmpeg")
            .args(["-y", "-loglevel", "error", "-f", "concat", "-safe", "0", "-i"])
            .arg(manifest_path)
            .args(["-c:v", "libx264", "-crf"])
            .arg(job.quality.crf().to_string())
            .args(["-pix_fmt", "yuv420p", "-r", FRAME_RATE])
            .arg(silent_path)
            .timeout(self.timeout);
        self.run_step(&silent, EncodeStep::SilentVideo, silent_path, cancel)
            .await?;

        cancel.check()?;

        let mut mux = ToolCommand::new(&self.ffmpeg, "ffmpeg")
            .args(["-y", "-loglevel", "error", "-i"])
            .arg(silent_path)
            .arg("-i")
            .arg(&job.audio.path);
        if let Some(captions) = job.captions {
            mux = mux.arg("-i").arg(captions);
        }
        mux = mux.args(["-map", "0:v:0", "-map", "1:a:0"]);
        if job.captions.is_some() {
            mux = mux.args(["-map", "2:s:0", "-c:s", "mov_text"]);
        }
        let mux = mux
            .args(["-c:v", "copy", "-c:a", "aac", "-b:a", AUDIO_BITRATE, "-shortest"])
            .arg(job.output)
            .timeout(self.timeout);
        self.run_step(&mux, EncodeStep::Mux, job.output, cancel).await
    }

    async fn run_step(
        &self,
        cmd: &ToolCommand,
        step: EncodeStep,
        produces: &Path,
        cancel: &CancelSignal,
    ) -> Result<()> {
        let output = self.runner.run(cmd, cancel).await.map_err(|e| match e {
            RunError::NotFound { program } => SlidecastError::EncoderUnavailable {
                reason: format!("{program} not found"),
            },
            RunError::Timeout { .. } => SlidecastError::Timeout { stage: Stage::Encode },
            RunError::Cancelled => SlidecastError::Cancelled,
            RunError::Io(e) => SlidecastError::IoError(e),
        })?;

        if !output.success {
            warn!(%step, code = ?output.code, "ffmpeg failed");
            return Err(SlidecastError::EncodingFailed {
                step,
                stderr_tail: output.stderr_tail(STDERR_TAIL_LINES),
            });
        }
        if !produces.exists() {
            return Err(SlidecastError::EncodingFailed {
                step,
                stderr_tail: format!(
                    "ffmpeg reported success but {} is missing",
                    produces.display()
                ),
            });
        }
        debug!(%step, "ffmpeg step finished");
        Ok(())
    }
}

/// Concat-demuxer script: one `file`/`duration` pair per slide, then the last
/// frame again with `duration 0` so its own duration is honoured.
pub fn concat_manifest(
    timed: &[TimedSlide],
    frames: &[FrameArtifact],
    base: &Path,
) -> Result<String> {
    let by_index: HashMap<usize, &FrameArtifact> =
        frames.iter().map(|f| (f.index, f)).collect();

    let mut out = String::new();
    let mut last_entry = None;
    for slide in timed {
        let frame = by_index
            .get(&slide.spec.index)
            .ok_or_else(|| SlidecastError::EncodingFailed {
                step: EncodeStep::SilentVideo,
                stderr_tail: format!("no frame for slide {}", slide.spec.index),
            })?;
        let entry = concat_path(&frame.path, base);
        out.push_str(&format!("file '{entry}'\nduration {}\n", seconds_3dp(slide.duration_ms)));
        last_entry = Some(entry);
    }
    if let Some(entry) = last_entry {
        out.push_str(&format!("file '{entry}'\nduration 0\n"));
    }
    Ok(out)
}

fn concat_path(frame: &Path, base: &Path) -> String {
    let path = frame.strip_prefix(base).unwrap_or(frame);
    path.to_string_lossy().replace('\'', r"'\''")
}

/// Milliseconds as seconds with exactly three decimals, without float error.
fn seconds_3dp(ms: u64) -> String {
    format!("{}.{:03}", ms / 1000, ms % 1000)
}

async fn remove_if_exists(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "failed to remove intermediate file");
    }
}

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use tracing::debug;

use crate::{
    cancel::CancelSignal,
    error::{Result, SlidecastError, Stage},
    runner::{ProcessRunner, RunError, ToolCommand},
};

/// Reads media durations with `ffprobe`.
#[derive(Clone)]
pub struct MediaProber {
    runner: Arc<dyn ProcessRunner>,
    ffprobe: PathBuf,
    timeout: Duration,
}

impl MediaProber {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        ffprobe: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            ffprobe: ffprobe.into(),
            timeout,
        }
    }

    /// Container duration in seconds. `stage` attributes a timeout.
    pub async fn duration_seconds(
        &self,
        path: &Path,
        stage: Stage,
        cancel: &CancelSignal,
    ) -> Result<f64> {
        let cmd = ToolCommand::new(&self.ffprobe, "ffprobe")
            .args(["-v", "error", "-show_entries", "format=duration", "-of", "default=nw=1:nk=1"])
            .arg(path)
            .timeout(self.timeout);

        let output = self.runner.run(&cmd, cancel).await.map_err(|e| match e {
            RunError::NotFound { .. } => SlidecastError::EncoderUnavailable {
                reason: format!("ffprobe not found at {}", self.ffprobe.display()),
            },
            RunError::Timeout { .. } => SlidecastError::Timeout { stage },
            RunError::Cancelled => SlidecastError::Cancelled,
            RunError::Io(e) => SlidecastError::IoError(e),
        })?;

        if !output.success {
            return Err(SlidecastError::ProbeFailed {
                path: path.to_path_buf(),
                reason: output.stderr_tail(5),
            });
        }

        let seconds = parse_duration(&output.stdout).ok_or_else(|| SlidecastError::ProbeFailed {
            path: path.to_path_buf(),
            reason: format!("unexpected ffprobe output '{}'", output.stdout.trim()),
        })?;
        debug!(path = %path.display(), seconds, "probed duration");
        Ok(seconds)
    }
}

fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .and_then(|l| l.parse::<f64>().ok())
        .filter(|s| s.is_finite() && *s >= 0.0)
}

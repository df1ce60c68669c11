use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use tracing::debug;

use crate::{
    cache::root_cache_dir,
    error::{Result, SlidecastError},
};

pub const ENV_WORK_DIR: &str = "SLIDECAST_WORK_DIR";
pub const ENV_FFMPEG: &str = "SLIDECAST_FFMPEG";
pub const ENV_FFPROBE: &str = "SLIDECAST_FFPROBE";
pub const ENV_BROWSER: &str = "SLIDECAST_BROWSER";

/// Chromium-compatible binaries tried in order when no browser is configured.
const BROWSER_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
    "headless_shell",
];

/// Explicit tool locations. `None` means "look it up on PATH".
#[derive(Debug, Clone, Default)]
pub struct ToolPaths {
    pub browser: Option<PathBuf>,
    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
}

impl ToolPaths {
    pub fn browser(&self) -> Result<PathBuf> {
        if let Some(path) = &self.browser {
            return Ok(path.clone());
        }
        BROWSER_CANDIDATES
            .iter()
            .find_map(|name| which::which(name).ok())
            .ok_or_else(|| SlidecastError::RendererUnavailable {
                reason: format!(
                    "no Chromium-compatible browser on PATH (tried {}); set {ENV_BROWSER}",
                    BROWSER_CANDIDATES.join(", ")
                ),
            })
    }

    pub fn ffmpeg(&self) -> Result<PathBuf> {
        resolve(self.ffmpeg.as_deref(), "ffmpeg").ok_or_else(|| {
            SlidecastError::EncoderUnavailable {
                reason: format!("ffmpeg not found on PATH; install it or set {ENV_FFMPEG}"),
            }
        })
    }

    pub fn ffprobe(&self) -> Result<PathBuf> {
        resolve(self.ffprobe.as_deref(), "ffprobe").ok_or_else(|| {
            SlidecastError::EncoderUnavailable {
                reason: format!("ffprobe not found on PATH; install it or set {ENV_FFPROBE}"),
            }
        })
    }
}

fn resolve(configured: Option<&Path>, name: &str) -> Option<PathBuf> {
    match configured {
        Some(path) => Some(path.to_path_buf()),
        None => which::which(name).ok(),
    }
}

#[derive(Debug, Clone)]
pub struct Timeouts {
    pub slide: Duration,
    pub synthesis: Duration,
    pub encoder: Duration,
    pub probe: Duration,
    /// Time between SIGTERM and SIGKILL.
    pub grace: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            slide: Duration::from_secs(30),
            synthesis: Duration::from_secs(120),
            encoder: Duration::from_secs(600),
            probe: Duration::from_secs(30),
            grace: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Sleep before each synthesis retry; its length is the retry count.
    pub synthesis_backoff: Vec<Duration>,
    pub slide_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            synthesis_backoff: vec![Duration::from_secs(1), Duration::from_secs(4)],
            slide_retries: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub work_root: PathBuf,
    pub tools: ToolPaths,
    pub timeouts: Timeouts,
    pub retry: RetryPolicy,
    /// Keep the working directory after a successful job (frame and audio cache).
    pub keep_artifacts: bool,
    /// Keep the working directory after a failed or cancelled job.
    pub preserve_on_failure: bool,
    /// Remove the working directory whatever the outcome.
    pub purge: bool,
    /// Ignore cached frames and narration.
    pub force: bool,
    /// Run the browser with its sandbox; containers usually need this off.
    pub browser_sandbox: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_root: root_cache_dir(),
            tools: ToolPaths::default(),
            timeouts: Timeouts::default(),
            retry: RetryPolicy::default(),
            keep_artifacts: true,
            preserve_on_failure: true,
            purge: false,
            force: false,
            browser_sandbox: true,
        }
    }
}

impl PipelineConfig {
    /// Defaults overlaid with `SLIDECAST_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = env_path(ENV_WORK_DIR) {
            config.work_root = dir;
        }
        config.tools.ffmpeg = env_path(ENV_FFMPEG);
        config.tools.ffprobe = env_path(ENV_FFPROBE);
        config.tools.browser = env_path(ENV_BROWSER);
        debug!(work_root = %config.work_root.display(), "loaded pipeline config");
        config
    }

    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = root.into();
        self
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_stage_limits() {
        let config = PipelineConfig::default();
        assert_eq!(config.timeouts.slide, Duration::from_secs(30));
        assert_eq!(config.timeouts.synthesis, Duration::from_secs(120));
        assert_eq!(config.timeouts.encoder, Duration::from_secs(600));
        assert_eq!(config.timeouts.grace, Duration::from_secs(5));
        assert_eq!(config.retry.synthesis_backoff.len(), 2);
        assert_eq!(config.retry.slide_retries, 1);
        assert!(config.work_root.ends_with("slidecast"));
    }

    #[test]
    fn explicit_tool_paths_win() {
        let tools = ToolPaths {
            browser: Some(PathBuf::from("/opt/chrome/chrome")),
            ffmpeg: Some(PathBuf::from("/opt/ffmpeg/ffmpeg")),
            ffprobe: None,
        };
        assert_eq!(tools.browser().unwrap(), PathBuf::from("/opt/chrome/chrome"));
        assert_eq!(tools.ffmpeg().unwrap(), PathBuf::from("/opt/ffmpeg/ffmpeg"));
    }
}

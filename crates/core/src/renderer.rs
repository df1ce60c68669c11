//! Rasterizes slide specs to 1920x1080 PNG frames with a headless
//! Chromium-compatible browser.
//!
//! Frames are content addressed by fingerprint inside the job directory; a
//! frame already on disk with the right dimensions is reused.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use reqwest::Url;
use tracing::{debug, info, instrument, warn};

use crate::{
    cache,
    cancel::CancelSignal,
    error::{Result, SlidecastError},
    events::{EventSink, Progress},
    fingerprint::frame_fingerprint,
    runner::{ProcessRunner, RunError, ToolCommand},
    template::{SLIDE_HEIGHT, SLIDE_WIDTH, render_html},
    types::{FrameArtifact, SlideSpec},
};

/// Virtual time the page gets to load fonts and settle before the capture.
const VIRTUAL_TIME_BUDGET_MS: u32 = 3000;

const PREFLIGHT_TIMEOUT: Duration = Duration::from_secs(15);

pub struct SlideRenderer {
    runner: Arc<dyn ProcessRunner>,
    browser: PathBuf,
    job_dir: PathBuf,
    timeout: Duration,
    retries: u32,
    sandbox: bool,
    force: bool,
}

impl SlideRenderer {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        browser: impl Into<PathBuf>,
        job_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            browser: browser.into(),
            job_dir: job_dir.into(),
            timeout: Duration::from_secs(30),
            retries: 1,
            sandbox: true,
            force: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Checks the browser binary starts at all.
    pub async fn preflight(&self, cancel: &CancelSignal) -> Result<()> {
        let cmd = ToolCommand::new(&self.browser, "browser")
            .arg("--version")
            .timeout(PREFLIGHT_TIMEOUT);
        let output = self.runner.run(&cmd, cancel).await.map_err(|e| match e {
            RunError::Cancelled => SlidecastError::Cancelled,
            other => SlidecastError::RendererUnavailable {
                reason: format!("{}: {other}", self.browser.display()),
            },
        })?;
        if !output.success {
            return Err(SlidecastError::RendererUnavailable {
                reason: format!(
                    "{} --version failed: {}",
                    self.browser.display(),
                    output.stderr_tail(5)
                ),
            });
        }
        debug!(version = %output.stdout.trim(), "browser available");
        Ok(())
    }

    /// Renders every spec in index order, reusing cached frames.
    #[instrument(skip_all, fields(slides = specs.len()))]
    pub async fn render_slides(
        &self,
        specs: &[SlideSpec],
        events: &EventSink,
        cancel: &CancelSignal,
    ) -> Result<Vec<FrameArtifact>> {
        let total = specs.len();
        let mut frames = Vec::with_capacity(total);

        for spec in specs {
            cancel.check()?;
            let fingerprint = frame_fingerprint(spec)?;
            let path = cache::frame_path(&self.job_dir, &fingerprint);

            let cached = !self.force && frame_is_valid(&path);
            if cached {
                debug!(index = spec.index, %fingerprint, "frame cache hit");
            } else {
                let html_path = cache::frame_html_path(&self.job_dir, &fingerprint);
                self.render_to(spec, &html_path, &path, cancel).await?;
            }

            events.emit(Progress::SlideRendered {
                index: spec.index,
                total,
                cached,
            });
            frames.push(FrameArtifact {
                index: spec.index,
                path,
                width: SLIDE_WIDTH,
                height: SLIDE_HEIGHT,
                fingerprint,
                cached,
            });
        }

        info!(
            rendered = frames.iter().filter(|f| !f.cached).count(),
            cached = frames.iter().filter(|f| f.cached).count(),
            "slides rasterized"
        );
        Ok(frames)
    }

    /// Renders one slide to `output_path`, retrying per the renderer's policy.
    pub async fn render_slide(
        &self,
        spec: &SlideSpec,
        output_path: &Path,
        cancel: &CancelSignal,
    ) -> Result<PathBuf> {
        self.render_to(spec, &output_path.with_extension("html"), output_path, cancel)
            .await
    }

    async fn render_to(
        &self,
        spec: &SlideSpec,
        html_path: &Path,
        output_path: &Path,
        cancel: &CancelSignal,
    ) -> Result<PathBuf> {
        tokio::fs::write(html_path, render_html(spec)).await?;

        let attempts = self.retries + 1;
        let mut last_reason = String::new();
        for attempt in 1..=attempts {
            cancel.check()?;
            match self.capture(html_path, output_path, cancel).await {
                Ok(()) => return Ok(output_path.to_path_buf()),
                Err(Attempt::Fatal(e)) => return Err(e),
                Err(Attempt::Retryable(reason)) => {
                    warn!(index = spec.index, attempt, %reason, "slide render attempt failed");
                    last_reason = reason;
                }
            }
        }

        Err(SlidecastError::SlideRenderFailed {
            index: spec.index,
            reason: last_reason,
        })
    }

    async fn capture(
        &self,
        html_path: &Path,
        output_path: &Path,
        cancel: &CancelSignal,
    ) -> std::result::Result<(), Attempt> {
        let staging = output_path.with_extension("tmp.png");
        let _ = tokio::fs::remove_file(&staging).await;

        let html_abs = std::path::absolute(html_path).map_err(|e| Attempt::Fatal(e.into()))?;
        let url = Url::from_file_path(&html_abs).map_err(|_| {
            Attempt::Fatal(SlidecastError::RendererUnavailable {
                reason: format!("cannot build a file URL for {}", html_abs.display()),
            })
        })?;

        let cmd = ToolCommand::new(&self.browser, "browser")
            .args(self.browser_args(&staging))
            .arg(url.as_str())
            .timeout(self.timeout);

        let output = self.runner.run(&cmd, cancel).await.map_err(|e| match e {
            RunError::NotFound { program } => Attempt::Fatal(SlidecastError::RendererUnavailable {
                reason: format!("{program} not found"),
            }),
            RunError::Cancelled => Attempt::Fatal(SlidecastError::Cancelled),
            RunError::Timeout { after, .. } => {
                Attempt::Retryable(format!("timed out after {}s", after.as_secs()))
            }
            RunError::Io(e) => Attempt::Retryable(e.to_string()),
        })?;

        if !output.success {
            return Err(Attempt::Retryable(format!(
                "browser exited with {:?}: {}",
                output.code,
                output.stderr_tail(5)
            )));
        }

        match image::image_dimensions(&staging) {
            Ok((SLIDE_WIDTH, SLIDE_HEIGHT)) => {}
            Ok((w, h)) => {
                let _ = tokio::fs::remove_file(&staging).await;
                return Err(Attempt::Retryable(format!(
                    "screenshot is {w}x{h}, expected {SLIDE_WIDTH}x{SLIDE_HEIGHT}"
                )));
            }
            Err(e) => return Err(Attempt::Retryable(format!("no usable screenshot: {e}"))),
        }

        tokio::fs::rename(&staging, output_path)
            .await
            .map_err(|e| Attempt::Fatal(e.into()))
    }

    fn browser_args(&self, screenshot: &Path) -> Vec<String> {
        let mut args = vec![
            "--headless=new".to_string(),
            "--disable-gpu".to_string(),
            "--hide-scrollbars".to_string(),
            "--mute-audio".to_string(),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--disable-extensions".to_string(),
            "--force-device-scale-factor=1".to_string(),
            format!("--window-size={SLIDE_WIDTH},{SLIDE_HEIGHT}"),
            format!("--virtual-time-budget={VIRTUAL_TIME_BUDGET_MS}"),
            format!(
                "--user-data-dir={}",
                self.job_dir.join("browser-profile").display()
            ),
            format!("--screenshot={}", screenshot.display()),
        ];
        if !self.sandbox {
            args.push("--no-sandbox".to_string());
        }
        args
    }
}

enum Attempt {
    Retryable(String),
    Fatal(SlidecastError),
}

/// A cached frame counts only if it decodes as a 1920x1080 image.
pub fn frame_is_valid(path: &Path) -> bool {
    matches!(image::image_dimensions(path), Ok((SLIDE_WIDTH, SLIDE_HEIGHT)))
}

#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{
        cancel::cancel_pair,
        layout::plan_slides,
        runner::CommandOutput,
        theme::Theme,
        types::{ContentType, SlideChunk},
    };

    /// Writes a blank screenshot of the requested size, failing the first
    /// `fail_first` captures.
    struct FakeBrowser {
        calls: AtomicUsize,
        fail_first: usize,
        size: (u32, u32),
    }

    impl FakeBrowser {
        fn new(fail_first: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_first,
                size: (SLIDE_WIDTH, SLIDE_HEIGHT),
            }
        }
    }

    #[async_trait]
    impl ProcessRunner for FakeBrowser {
        async fn run(
            &self,
            cmd: &ToolCommand,
            _cancel: &CancelSignal,
        ) -> std::result::Result<CommandOutput, RunError> {
            let args = cmd.arg_strings();
            if args.iter().any(|a| a == "--version") {
                return Ok(CommandOutput {
                    code: Some(0),
                    stdout: "Chromium 120.0".into(),
                    success: true,
                    ..Default::default()
                });
            }
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                return Ok(CommandOutput {
                    code: Some(1),
                    stderr: "crashed".into(),
                    ..Default::default()
                });
            }
            let shot = args
                .iter()
                .find_map(|a| a.strip_prefix("--screenshot="))
                .expect("screenshot flag");
            image::RgbImage::new(self.size.0, self.size.1).save(shot).unwrap();
            Ok(CommandOutput {
                code: Some(0),
                success: true,
                ..Default::default()
            })
        }
    }

    fn specs() -> Vec<SlideSpec> {
        let chunk = |heading: &str| SlideChunk {
            heading: heading.to_string(),
            subheading: None,
            key_points: vec![],
            suggested: ContentType::Content,
            source_range: 0..0,
        };
        plan_slides(&[chunk("Welcome"), chunk("Wrap up")], Theme::Dark, &BTreeMap::new())
    }

    #[tokio::test]
    async fn renders_then_reuses_frames() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(cache::frames_dir(dir.path())).unwrap();
        let browser = Arc::new(FakeBrowser::new(0));
        let renderer = SlideRenderer::new(browser.clone(), "chromium", dir.path());
        let cancel = CancelSignal::never();

        let frames = renderer
            .render_slides(&specs(), &EventSink::disabled(), &cancel)
            .await
            .unwrap();
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| !f.cached && frame_is_valid(&f.path)));
        assert!(cache::frame_html_path(dir.path(), &frames[0].fingerprint).exists());
        assert_eq!(browser.calls.load(Ordering::SeqCst), 2);

        let again = renderer
            .render_slides(&specs(), &EventSink::disabled(), &cancel)
            .await
            .unwrap();
        assert!(again.iter().all(|f| f.cached));
        assert_eq!(again[1].fingerprint, frames[1].fingerprint);
        assert_eq!(browser.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn one_failure_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(cache::frames_dir(dir.path())).unwrap();
        let browser = Arc::new(FakeBrowser::new(1));
        let renderer = SlideRenderer::new(browser.clone(), "chromium", dir.path());

        let frames = renderer
            .render_slides(&specs()[..1], &EventSink::disabled(), &CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(browser.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn persistent_failure_names_the_slide() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(cache::frames_dir(dir.path())).unwrap();
        let renderer = SlideRenderer::new(Arc::new(FakeBrowser::new(10)), "chromium", dir.path());

        let err = renderer
            .render_slides(&specs(), &EventSink::disabled(), &CancelSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(err, SlidecastError::SlideRenderFailed { index: 0, .. }));
    }

    #[tokio::test]
    async fn wrong_size_screenshot_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(cache::frames_dir(dir.path())).unwrap();
        let browser = FakeBrowser {
            size: (800, 600),
            ..FakeBrowser::new(0)
        };
        let renderer = SlideRenderer::new(Arc::new(browser), "chromium", dir.path());

        let err = renderer
            .render_slides(&specs()[..1], &EventSink::disabled(), &CancelSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(err, SlidecastError::SlideRenderFailed { .. }));
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, signal) = cancel_pair();
        handle.cancel();
        let renderer = SlideRenderer::new(Arc::new(FakeBrowser::new(0)), "chromium", dir.path());
        let err = renderer
            .render_slides(&specs(), &EventSink::disabled(), &signal)
            .await
            .unwrap_err();
        assert!(matches!(err, SlidecastError::Cancelled));
    }

    #[tokio::test]
    async fn preflight_reports_missing_browser() {
        struct Missing;
        #[async_trait]
        impl ProcessRunner for Missing {
            async fn run(
                &self,
                cmd: &ToolCommand,
                _: &CancelSignal,
            ) -> std::result::Result<CommandOutput, RunError> {
                Err(RunError::NotFound {
                    program: cmd.program.display().to_string(),
                })
            }
        }
        let renderer = SlideRenderer::new(Arc::new(Missing), "chromium", "/tmp");
        let err = renderer.preflight(&CancelSignal::never()).await.unwrap_err();
        assert!(matches!(err, SlidecastError::RendererUnavailable { .. }));
        assert_eq!(err.exit_code(), 3);
    }
}

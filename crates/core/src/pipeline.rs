//! The render driver: script in, narrated MP4 out.
//!
//! Stages run in order: analyze, layout, then rendering and synthesis as two
//! concurrent branches joined before alignment, encoding and publishing. A
//! failure after the working directory is acquired leaves a `crash.json`
//! next to the preserved artifacts.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    analyzer::analyze,
    audio::{AudioGenerator, ENV_API_KEY, SpeechProvider},
    cache,
    cancel::CancelSignal,
    config::PipelineConfig,
    encoder::{EncodeJob, VideoEncoder},
    error::{EncodeStep, Result, SlidecastError, Stage},
    events::{EventSink, PipelineEvent, Progress},
    fingerprint::{audio_key, script_hash},
    layout::plan_slides,
    manifest::{CrashManifest, JobManifest, write_json},
    probe::MediaProber,
    renderer::SlideRenderer,
    runner::ProcessRunner,
    timing::align,
    types::{RenderOutcome, RenderRequest, SlideSpec},
    workdir::{Retention, WorkDir},
};

/// Allowed gap between the narration and the muxed MP4, in milliseconds.
const DRIFT_TOLERANCE_MS: f64 = 40.0;

/// A failed stage, kept together with the error until the crash manifest is written.
struct Failure {
    stage: Stage,
    error: SlidecastError,
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> std::result::Result<T, Failure>;
}

impl<T> AtStage<T> for Result<T> {
    fn at(self, stage: Stage) -> std::result::Result<T, Failure> {
        self.map_err(|error| Failure { stage, error })
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    runner: Arc<dyn ProcessRunner>,
    provider: Option<Arc<dyn SpeechProvider>>,
    events: Option<mpsc::UnboundedSender<PipelineEvent>>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        runner: Arc<dyn ProcessRunner>,
        provider: Option<Arc<dyn SpeechProvider>>,
    ) -> Self {
        Self {
            config,
            runner,
            provider,
            events: None,
        }
    }

    /// Publish progress events to `tx` while jobs run.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Analyze and lay out the script without touching tools or credentials.
    pub fn plan(request: &RenderRequest) -> Result<Vec<SlideSpec>> {
        request.validate()?;
        let chunks = analyze(&request.script, request.max_slides)?;
        Ok(plan_slides(&chunks, request.theme, request.script.duration_hints()))
    }

    #[instrument(skip_all, fields(output = %request.output_path.display()))]
    pub async fn render(
        &self,
        request: &RenderRequest,
        cancel: &CancelSignal,
    ) -> Result<RenderOutcome> {
        let job_id = Uuid::new_v4();
        let events = EventSink::new(job_id, self.events.clone());

        events.emit(Progress::StageStarted { stage: Stage::Analyze });
        request.validate()?;
        let chunks = analyze(&request.script, request.max_slides)?;
        events.emit(Progress::StageFinished { stage: Stage::Analyze });

        events.emit(Progress::StageStarted { stage: Stage::Layout });
        let specs = plan_slides(&chunks, request.theme, request.script.duration_hints());
        events.emit(Progress::StageFinished { stage: Stage::Layout });
        info!(%job_id, slides = specs.len(), "planned slides");

        let Some(provider) = self.provider.clone() else {
            return Err(SlidecastError::ProviderUnconfigured {
                env_var: ENV_API_KEY.to_string(),
            });
        };
        let browser = self.config.tools.browser()?;
        let ffmpeg = self.config.tools.ffmpeg()?;
        let ffprobe = self.config.tools.ffprobe()?;
        cancel.check()?;

        let hash = script_hash(&request.script);
        let mut workdir = WorkDir::acquire(
            cache::job_dir(&self.config.work_root, &hash),
            Retention {
                keep_artifacts: self.config.keep_artifacts,
                preserve_on_failure: self.config.preserve_on_failure,
                purge: self.config.purge,
            },
        )?;

        let tools = Tools {
            renderer: SlideRenderer::new(self.runner.clone(), browser, workdir.path())
                .with_timeout(self.config.timeouts.slide)
                .with_retries(self.config.retry.slide_retries)
                .with_sandbox(self.config.browser_sandbox)
                .with_force(self.config.force),
            audio: AudioGenerator::new(
                provider,
                MediaProber::new(self.runner.clone(), &ffprobe, self.config.timeouts.probe),
            )
            .with_backoff(self.config.retry.synthesis_backoff.clone())
            .with_timeout(self.config.timeouts.synthesis)
            .with_force(self.config.force),
            encoder: VideoEncoder::new(self.runner.clone(), ffmpeg, workdir.path())
                .with_timeout(self.config.timeouts.encoder),
            prober: MediaProber::new(self.runner.clone(), ffprobe, self.config.timeouts.probe),
        };

        match self
            .run_job(job_id, &hash, request, &specs, &tools, workdir.path(), &events, cancel)
            .await
        {
            Ok(outcome) => {
                workdir.mark_succeeded();
                Ok(outcome)
            }
            Err(Failure { stage, error }) => {
                error!(%job_id, %stage, error = %error, "render failed");
                workdir.mark_failed();
                self.write_crash(job_id, &hash, stage, &error, &workdir).await;
                Err(error)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_job(
        &self,
        job_id: Uuid,
        hash: &str,
        request: &RenderRequest,
        specs: &[SlideSpec],
        tools: &Tools,
        dir: &Path,
        events: &EventSink,
        cancel: &CancelSignal,
    ) -> std::result::Result<RenderOutcome, Failure> {
        tools.renderer.preflight(cancel).await.at(Stage::Render)?;
        tools.encoder.preflight(cancel).await.at(Stage::Encode)?;

        let key = audio_key(&request.script, request.profile).at(Stage::Synthesize)?;
        let narration_path = cache::audio_path(dir, &key);

        events.emit(Progress::StageStarted { stage: Stage::Render });
        events.emit(Progress::StageStarted { stage: Stage::Synthesize });
        let render = async {
            let frames = tools
                .renderer
                .render_slides(specs, events, cancel)
                .await
                .at(Stage::Render)?;
            events.emit(Progress::StageFinished { stage: Stage::Render });
            Ok::<_, Failure>(frames)
        };
        let synthesize = async {
            let audio = tools
                .audio
                .generate(&request.script, &narration_path, request.profile, events, cancel)
                .await
                .at(Stage::Synthesize)?;
            events.emit(Progress::StageFinished { stage: Stage::Synthesize });
            Ok::<_, Failure>(audio)
        };
        let (frames, audio) = tokio::try_join!(render, synthesize)?;
        cancel.check().at(Stage::Align)?;

        events.emit(Progress::StageStarted { stage: Stage::Align });
        let timed = align(specs, &audio).at(Stage::Align)?;
        let explicit_ms: u64 = specs.iter().filter_map(|s| s.duration_ms).sum();
        if explicit_ms > audio.duration_ms() {
            events.emit(Progress::Warning {
                message: format!(
                    "slide durations add up to {explicit_ms} ms but the narration is {} ms; scaled down to fit",
                    audio.duration_ms()
                ),
            });
        }
        events.emit(Progress::StageFinished { stage: Stage::Align });
        cancel.check().at(Stage::Encode)?;

        events.emit(Progress::StageStarted { stage: Stage::Encode });
        let staged = cache::staged_output_path(dir);
        let job = EncodeJob {
            timed: &timed,
            frames: &frames,
            audio: &audio,
            quality: request.quality,
            captions: request.captions.as_deref(),
            output: &staged,
        };
        tools.encoder.encode(&job, cancel).await.at(Stage::Encode)?;
        if let Err(e) =
            verify_duration(&tools.prober, &staged, audio.duration_seconds, cancel).await
        {
            remove_if_exists(&staged).await;
            return Err(e).at(Stage::Encode);
        }
        events.emit(Progress::StageFinished { stage: Stage::Encode });

        events.emit(Progress::StageStarted { stage: Stage::Publish });
        publish(&staged, &request.output_path).await.at(Stage::Publish)?;
        let manifest = JobManifest::build(
            job_id,
            hash,
            request.theme,
            request.quality,
            &timed,
            &frames,
            &audio,
            &request.output_path,
        );
        let manifest_path = cache::manifest_path(dir);
        write_json(&manifest_path, &manifest).await.at(Stage::Publish)?;
        events.emit(Progress::StageFinished { stage: Stage::Publish });

        info!(
            %job_id,
            output = %request.output_path.display(),
            slides = timed.len(),
            duration_seconds = audio.duration_seconds,
            "render complete"
        );
        Ok(RenderOutcome {
            mp4_path: request.output_path.clone(),
            slide_count: timed.len(),
            duration_seconds: audio.duration_seconds,
            manifest,
            manifest_path,
        })
    }

    async fn write_crash(
        &self,
        job_id: Uuid,
        hash: &str,
        stage: Stage,
        error: &SlidecastError,
        workdir: &WorkDir,
    ) {
        let preserved = if workdir.retained() {
            preserved_artifacts(workdir.path())
        } else {
            Vec::new()
        };
        let crash = CrashManifest::new(job_id, hash, Some(stage), error, preserved);
        let path = cache::crash_manifest_path(workdir.path());
        if let Err(e) = write_json(&path, &crash).await {
            warn!(path = %path.display(), error = %e, "failed to write crash manifest");
        }
    }
}

struct Tools {
    renderer: SlideRenderer,
    audio: AudioGenerator,
    encoder: VideoEncoder,
    prober: MediaProber,
}

/// The muxed MP4 must match the narration it was built from.
async fn verify_duration(
    prober: &MediaProber,
    mp4: &Path,
    narration_seconds: f64,
    cancel: &CancelSignal,
) -> Result<()> {
    let actual = prober.duration_seconds(mp4, Stage::Encode, cancel).await?;
    let drift_ms = (actual - narration_seconds).abs() * 1000.0;
    if drift_ms > DRIFT_TOLERANCE_MS {
        warn!(actual, narration_seconds, drift_ms, "output duration drifts from the narration");
        return Err(SlidecastError::EncodingFailed {
            step: EncodeStep::Verify,
            stderr_tail: format!(
                "output is {actual:.3}s but the narration is {narration_seconds:.3}s ({drift_ms:.0} ms drift)"
            ),
        });
    }
    debug!(actual, drift_ms, "output duration verified");
    Ok(())
}

/// Moves the finished MP4 from the working directory to its destination.
async fn publish(staged: &Path, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    if tokio::fs::rename(staged, output).await.is_err() {
        // Different filesystem.
        copy_into_place(staged, output).await?;
    }
    debug!(output = %output.display(), "published output");
    Ok(())
}

/// Copies next to `output` and renames over it, so the destination is
/// either the old file or the complete new one.
async fn copy_into_place(staged: &Path, output: &Path) -> Result<()> {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output.mp4".to_string());
    let partial = output.with_file_name(format!(".{name}.part"));

    let copied = match tokio::fs::copy(staged, &partial).await {
        Ok(_) => tokio::fs::rename(&partial, output).await,
        Err(e) => Err(e),
    };
    if let Err(e) = copied {
        remove_if_exists(&partial).await;
        return Err(e.into());
    }
    tokio::fs::remove_file(staged).await?;
    Ok(())
}

async fn remove_if_exists(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "failed to remove file");
    }
}

/// Frames and narration left in `dir`.
fn preserved_artifacts(dir: &Path) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for sub in [cache::frames_dir(dir), cache::audio_dir(dir)] {
        let Ok(entries) = fs::read_dir(&sub) else {
            continue;
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| matches!(path.extension().and_then(|e| e.to_str()), Some("png" | "mp3")))
            .collect();
        files.sort();
        paths.extend(files);
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Layout, Script};

    #[test]
    fn plan_runs_without_tools() {
        let request = RenderRequest::new(
            Script::new("Today we cover three topics: prompt engineering, personalization, and second brain."),
            "out.mp4",
        );
        let specs = Pipeline::plan(&request).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].layout(), Layout::Title);
        assert_eq!(specs[1].layout(), Layout::Content);
    }

    #[test]
    fn plan_treats_max_slides_as_a_cap() {
        let text = "We start small. Then we grow. Teams adopt it. Results follow.";
        let mut request = RenderRequest::new(Script::new(text), "out.mp4");
        let natural = Pipeline::plan(&request).unwrap().len();
        request.max_slides = Some(7);
        assert_eq!(Pipeline::plan(&request).unwrap().len(), natural);
    }

    #[test]
    fn plan_rejects_bad_options() {
        let mut request = RenderRequest::new(Script::new("Hello there."), "out.mp4");
        request.max_slides = Some(9);
        assert!(matches!(
            Pipeline::plan(&request),
            Err(SlidecastError::InvalidOptions { .. })
        ));
    }

    #[test]
    fn empty_script_is_invalid() {
        let request = RenderRequest::new(Script::new("   "), "out.mp4");
        assert!(matches!(
            Pipeline::plan(&request),
            Err(SlidecastError::InvalidScript { .. })
        ));
    }

    #[test]
    fn preserved_artifacts_lists_frames_and_audio() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(cache::frames_dir(dir.path())).unwrap();
        fs::create_dir_all(cache::audio_dir(dir.path())).unwrap();
        fs::write(cache::frame_path(dir.path(), "b"), b"png").unwrap();
        fs::write(cache::frame_path(dir.path(), "a"), b"png").unwrap();
        fs::write(cache::frame_html_path(dir.path(), "a"), b"html").unwrap();
        fs::write(cache::audio_path(dir.path(), "k"), b"mp3").unwrap();

        let preserved = preserved_artifacts(dir.path());
        assert_eq!(
            preserved,
            vec![
                cache::frame_path(dir.path(), "a"),
                cache::frame_path(dir.path(), "b"),
                cache::audio_path(dir.path(), "k"),
            ]
        );
    }

    #[tokio::test]
    async fn copy_into_place_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let staged = dir.path().join("staged.mp4");
        let output = dir.path().join("out").join("talk.mp4");
        fs::create_dir_all(output.parent().unwrap()).unwrap();
        fs::write(&staged, b"new video").unwrap();

        copy_into_place(&staged, &output).await.unwrap();

        assert_eq!(fs::read(&output).unwrap(), b"new video");
        assert!(!staged.exists());
        assert!(!output.with_file_name(".talk.mp4.part").exists());
    }

    #[tokio::test]
    async fn failed_copy_keeps_the_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("talk.mp4");
        fs::write(&output, b"old video").unwrap();

        let err = copy_into_place(&dir.path().join("missing.mp4"), &output).await;

        assert!(err.is_err());
        assert_eq!(fs::read(&output).unwrap(), b"old video");
        assert!(!dir.path().join(".talk.mp4.part").exists());
    }
}

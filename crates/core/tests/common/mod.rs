#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use slidecast_core::{
    CancelHandle, CancelSignal, PipelineConfig, Pipeline, Result, SpeechProvider, VoiceProfile,
    runner::{CommandOutput, ProcessRunner, RunError, ToolCommand},
};
use tempfile::TempDir;

/// Stands in for the browser, ffmpeg and ffprobe, dispatching on the
/// command label.
pub struct FakeTools {
    pub media_seconds: f64,
    pub fail_silent_video: bool,
    /// Duration reported for the muxed MP4, when it should differ from the narration.
    pub output_seconds: Option<f64>,
    screenshots: AtomicUsize,
    ffmpeg_calls: Mutex<Vec<Vec<String>>>,
}

impl FakeTools {
    pub fn new(media_seconds: f64) -> Self {
        Self {
            media_seconds,
            fail_silent_video: false,
            output_seconds: None,
            screenshots: AtomicUsize::new(0),
            ffmpeg_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_silent_video(mut self) -> Self {
        self.fail_silent_video = true;
        self
    }

    pub fn drifting_output(mut self, seconds: f64) -> Self {
        self.output_seconds = Some(seconds);
        self
    }

    pub fn screenshots(&self) -> usize {
        self.screenshots.load(Ordering::SeqCst)
    }

    pub fn ffmpeg_calls(&self) -> Vec<Vec<String>> {
        self.ffmpeg_calls.lock().unwrap().clone()
    }

    fn ok(stdout: impl Into<String>) -> CommandOutput {
        CommandOutput {
            code: Some(0),
            stdout: stdout.into(),
            success: true,
            ..Default::default()
        }
    }

    fn browser(&self, args: &[String]) -> CommandOutput {
        if args.iter().any(|a| a == "--version") {
            return Self::ok("Chromium 120.0.6099.109");
        }
        let shot = args
            .iter()
            .find_map(|a| a.strip_prefix("--screenshot="))
            .expect("screenshot flag");
        image::RgbImage::new(1920, 1080).save(shot).unwrap();
        self.screenshots.fetch_add(1, Ordering::SeqCst);
        Self::ok("")
    }

    fn ffmpeg(&self, args: Vec<String>) -> CommandOutput {
        if args.iter().any(|a| a == "-version") {
            return Self::ok("ffmpeg version 6.1");
        }
        let silent_step = args.iter().any(|a| a == "concat");
        self.ffmpeg_calls.lock().unwrap().push(args.clone());
        if silent_step && self.fail_silent_video {
            return CommandOutput {
                code: Some(1),
                stderr: "frames/missing.png: Invalid data found when processing input".into(),
                ..Default::default()
            };
        }
        let output = args.last().expect("output path");
        std::fs::write(output, b"\x00\x00\x00\x18ftypmp42").unwrap();
        Self::ok("")
    }

    fn ffprobe(&self, args: &[String]) -> CommandOutput {
        let probing_output = args.last().is_some_and(|p| p.ends_with("output.mp4"));
        let seconds = match self.output_seconds {
            Some(seconds) if probing_output => seconds,
            _ => self.media_seconds,
        };
        Self::ok(format!("{seconds:.6}\n"))
    }
}

#[async_trait]
impl ProcessRunner for FakeTools {
    async fn run(
        &self,
        cmd: &ToolCommand,
        cancel: &CancelSignal,
    ) -> std::result::Result<CommandOutput, RunError> {
        if cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        let args = cmd.arg_strings();
        Ok(match cmd.label.as_str() {
            "browser" => self.browser(&args),
            "ffmpeg" => self.ffmpeg(args),
            "ffprobe" => self.ffprobe(&args),
            other => panic!("unexpected tool {other}"),
        })
    }
}

/// Returns a fixed byte string for every request and counts them.
#[derive(Default)]
pub struct FakeSpeech {
    calls: AtomicUsize,
    cancel_on_call: Mutex<Option<CancelHandle>>,
}

impl FakeSpeech {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Fires `handle` when synthesis is requested.
    pub fn cancelling(handle: CancelHandle) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            cancel_on_call: Mutex::new(Some(handle)),
        }
    }
}

#[async_trait]
impl SpeechProvider for FakeSpeech {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn synthesize(&self, _text: &str, _voice: &VoiceProfile) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.cancel_on_call.lock().unwrap().take() {
            handle.cancel();
        }
        Ok(b"ID3\x04\x00fake-mp3".to_vec())
    }
}

/// Temporary work root and output directory for one test.
pub struct Harness {
    pub root: TempDir,
    pub tools: Arc<FakeTools>,
    pub speech: Arc<FakeSpeech>,
}

impl Harness {
    pub fn new(tools: FakeTools) -> Self {
        Self::with_speech(tools, FakeSpeech::default())
    }

    pub fn with_speech(tools: FakeTools, speech: FakeSpeech) -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
            tools: Arc::new(tools),
            speech: Arc::new(speech),
        }
    }

    pub fn work_root(&self) -> PathBuf {
        self.root.path().join("work")
    }

    pub fn output(&self, name: &str) -> PathBuf {
        self.root.path().join("out").join(name)
    }

    pub fn config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::default().with_work_root(self.work_root());
        config.tools.browser = Some("chromium".into());
        config.tools.ffmpeg = Some("ffmpeg".into());
        config.tools.ffprobe = Some("ffprobe".into());
        config.retry.synthesis_backoff = vec![];
        config
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            self.config(),
            self.tools.clone(),
            Some(self.speech.clone() as Arc<dyn SpeechProvider>),
        )
    }
}

pub fn png_dimensions(path: &Path) -> (u32, u32) {
    image::image_dimensions(path).unwrap()
}

//! Narration synthesis: voice profiles, the TTS provider seam and the
//! generator that turns a script into a measured MP3.

use std::{path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::{
    cancel::CancelSignal,
    error::{Result, SlidecastError, Stage},
    events::{EventSink, Progress},
    fingerprint::audio_key,
    probe::MediaProber,
    types::{AudioArtifact, ProfileKind, Script},
};

pub const ENV_API_KEY: &str = "TTS_API_KEY";
pub const ENV_VOICE_ID: &str = "TTS_VOICE_ID";
pub const ENV_BASE_URL: &str = "TTS_BASE_URL";

const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";
const DEFAULT_MODEL: &str = "eleven_multilingual_v2";
/// 44.1 kHz at 128 kbps.
const OUTPUT_FORMAT: &str = "mp3_44100_128";

/// Voice parameters sent with every synthesis request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceProfile {
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
    pub speed: f32,
    #[serde(skip)]
    pub model_id: String,
}

pub fn voice_profile(kind: ProfileKind) -> VoiceProfile {
    let (stability, similarity_boost, style, use_speaker_boost, speed) = match kind {
        ProfileKind::Podcast => (0.5, 0.75, 0.3, true, 1.0),
        ProfileKind::Educational => (0.6, 0.8, 0.2, true, 0.95),
        ProfileKind::Marketing => (0.4, 0.8, 0.6, true, 1.05),
        ProfileKind::Meditation => (0.8, 0.7, 0.1, false, 0.85),
        ProfileKind::Narration => (0.55, 0.75, 0.25, true, 1.0),
    };
    VoiceProfile {
        stability,
        similarity_boost,
        style,
        use_speaker_boost,
        speed,
        model_id: DEFAULT_MODEL.to_string(),
    }
}

#[async_trait]
pub trait SpeechProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// MP3 bytes for `text` spoken with `voice`.
    async fn synthesize(&self, text: &str, voice: &VoiceProfile) -> Result<Vec<u8>>;
}

/// ElevenLabs-compatible text-to-speech over HTTPS.
pub struct ElevenLabsProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    voice_id: String,
}

impl ElevenLabsProvider {
    /// Reads `TTS_API_KEY`, `TTS_VOICE_ID` and optionally `TTS_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| SlidecastError::ProviderUnconfigured {
                    env_var: name.to_string(),
                })
        };
        let api_key = required(ENV_API_KEY)?;
        let voice_id = required(ENV_VOICE_ID)?;
        let base_url = lookup(ENV_BASE_URL)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            voice_id,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/text-to-speech/{}?output_format={OUTPUT_FORMAT}",
            self.base_url, self.voice_id
        )
    }
}

fn request_body(text: &str, voice: &VoiceProfile) -> serde_json::Value {
    serde_json::json!({
        "text": text,
        "model_id": voice.model_id,
        "voice_settings": voice,
    })
}

#[async_trait]
impl SpeechProvider for ElevenLabsProvider {
    fn name(&self) -> &'static str {
        "elevenlabs"
    }

    async fn synthesize(&self, text: &str, voice: &VoiceProfile) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(self.endpoint())
            .header("xi-api-key", &self.api_key)
            .header("Accept", "audio/mpeg")
            .json(&request_body(text, voice))
            .send()
            .await
            .map_err(|e| SlidecastError::SynthesisFailed {
                reason: format!("request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

/// Bad credentials are a configuration problem; anything else may be transient.
fn status_error(status: StatusCode, body: &str) -> SlidecastError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SlidecastError::ProviderRejected {
            status: status.as_u16(),
        },
        _ => SlidecastError::SynthesisFailed {
            reason: format!("provider returned {status}: {}", body.trim()),
        },
    }
}

/// One piece of a multi-voice narration.
#[derive(Debug, Clone)]
pub struct AudioSegment {
    pub text: String,
    pub profile: ProfileKind,
}

pub struct AudioGenerator {
    provider: Arc<dyn SpeechProvider>,
    prober: MediaProber,
    backoff: Vec<Duration>,
    timeout: Duration,
    force: bool,
}

impl AudioGenerator {
    pub fn new(provider: Arc<dyn SpeechProvider>, prober: MediaProber) -> Self {
        Self {
            provider,
            prober,
            backoff: vec![Duration::from_secs(1), Duration::from_secs(4)],
            timeout: Duration::from_secs(120),
            force: false,
        }
    }

    pub fn with_backoff(mut self, backoff: Vec<Duration>) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Synthesizes the whole script into `output_path` and measures it.
    /// An existing file is reused unless forced.
    #[instrument(skip_all, fields(profile = profile.name(), provider = self.provider.name()))]
    pub async fn generate(
        &self,
        script: &Script,
        output_path: &Path,
        profile: ProfileKind,
        events: &EventSink,
        cancel: &CancelSignal,
    ) -> Result<AudioArtifact> {
        if !self.force && is_nonempty_file(output_path).await {
            let duration_seconds = self
                .prober
                .duration_seconds(output_path, Stage::Synthesize, cancel)
                .await?;
            debug!(path = %output_path.display(), duration_seconds, "narration cache hit");
            events.emit(Progress::NarrationReady {
                duration_seconds,
                cached: true,
            });
            return Ok(AudioArtifact {
                path: output_path.to_path_buf(),
                duration_seconds,
                profile,
                cached: true,
            });
        }

        let voice = voice_profile(profile);
        let bytes = self.synthesize_with_retry(script.text(), &voice, events, cancel).await?;
        if bytes.is_empty() {
            return Err(SlidecastError::SynthesisFailed {
                reason: "provider returned no audio".to_string(),
            });
        }

        let staging = output_path.with_extension("part");
        tokio::fs::write(&staging, &bytes).await?;
        tokio::fs::rename(&staging, output_path).await?;

        let duration_seconds = self
            .prober
            .duration_seconds(output_path, Stage::Synthesize, cancel)
            .await?;
        info!(bytes = bytes.len(), duration_seconds, "narration synthesized");
        events.emit(Progress::NarrationReady {
            duration_seconds,
            cached: false,
        });

        Ok(AudioArtifact {
            path: output_path.to_path_buf(),
            duration_seconds,
            profile,
            cached: false,
        })
    }

    /// Synthesizes each segment in order into `out_dir`, one file per
    /// text and profile so edited segments are never served stale.
    pub async fn generate_segments(
        &self,
        segments: &[AudioSegment],
        out_dir: &Path,
        events: &EventSink,
        cancel: &CancelSignal,
    ) -> Result<Vec<AudioArtifact>> {
        tokio::fs::create_dir_all(out_dir).await?;
        let mut artifacts = Vec::with_capacity(segments.len());
        for segment in segments {
            cancel.check()?;
            let script = Script::new(segment.text.clone());
            let path = out_dir.join(format!("{}.mp3", audio_key(&script, segment.profile)?));
            artifacts.push(self.generate(&script, &path, segment.profile, events, cancel).await?);
        }
        Ok(artifacts)
    }

    async fn synthesize_with_retry(
        &self,
        text: &str,
        voice: &VoiceProfile,
        events: &EventSink,
        cancel: &CancelSignal,
    ) -> Result<Vec<u8>> {
        let mut attempt = 0;
        loop {
            cancel.check()?;
            let err = match self.synthesize_once(text, voice, cancel).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) => e,
            };

            let SlidecastError::SynthesisFailed { reason } = &err else {
                return Err(err);
            };
            let Some(delay) = self.backoff.get(attempt).copied() else {
                return Err(err);
            };

            attempt += 1;
            warn!(attempt, ?delay, %reason, "speech synthesis failed, retrying");
            events.emit(Progress::Retrying {
                stage: Stage::Synthesize,
                attempt: attempt as u32,
                reason: reason.clone(),
            });
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return Err(SlidecastError::Cancelled),
            }
        }
    }

    async fn synthesize_once(
        &self,
        text: &str,
        voice: &VoiceProfile,
        cancel: &CancelSignal,
    ) -> Result<Vec<u8>> {
        tokio::select! {
            res = tokio::time::timeout(self.timeout, self.provider.synthesize(text, voice)) => {
                res.map_err(|_| SlidecastError::Timeout { stage: Stage::Synthesize })?
            }
            _ = cancel.cancelled() => Err(SlidecastError::Cancelled),
        }
    }
}

async fn is_nonempty_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

pub mod analyzer;
pub mod audio;
pub mod cache;
pub mod cancel;
pub mod config;
pub mod encoder;
pub mod error;
pub mod events;
pub mod fingerprint;
pub mod format;
pub mod layout;
pub mod manifest;
pub mod pipeline;
pub mod probe;
pub mod renderer;
pub mod runner;
pub mod template;
pub mod theme;
pub mod timing;
pub mod types;
pub mod workdir;

pub use audio::{ElevenLabsProvider, SpeechProvider, VoiceProfile};
pub use cancel::{CancelHandle, CancelSignal, cancel_pair};
pub use config::PipelineConfig;
pub use error::{Result, SlidecastError, Stage};
pub use events::{PipelineEvent, Progress};
pub use format::{format_outcome, format_plan, format_timestamp};
pub use manifest::{CrashManifest, JobManifest};
pub use pipeline::Pipeline;
pub use runner::{ProcessRunner, SystemRunner};
pub use theme::Theme;
pub use types::{ProfileKind, Quality, RenderOutcome, RenderRequest, Script, SlideSpec};

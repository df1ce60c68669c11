use std::{collections::BTreeMap, ops::Range, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, SlidecastError},
    theme::{Palette, Theme},
};

/// Hard bounds on the number of slides a script may produce.
pub const MIN_SLIDES: usize = 1;
pub const MAX_SLIDES: usize = 7;

/// Upper bound on key points carried by a single slide.
pub const MAX_KEY_POINTS: usize = 5;

/// Upper bound on words in a single bullet.
pub const MAX_BULLET_WORDS: usize = 12;

/// Narration script as supplied by the caller. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    text: String,
    title: Option<String>,
    duration_hints: BTreeMap<usize, u64>,
}

impl Script {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            title: None,
            duration_hints: BTreeMap::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        self.title = (!title.trim().is_empty()).then_some(title);
        self
    }

    /// Pin slide `index` to `duration_ms` instead of an equal share of the narration.
    pub fn with_duration_hint(mut self, index: usize, duration_ms: u64) -> Self {
        self.duration_hints.insert(index, duration_ms);
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn duration_hints(&self) -> &BTreeMap<usize, u64> {
        &self.duration_hints
    }

    /// Markdown outlines are recognised by at least one `# ` heading line.
    pub fn is_markdown(&self) -> bool {
        self.text
            .lines()
            .any(|line| line.trim_start().starts_with("# "))
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Coarse classification of a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Title,
    Question,
    Content,
}

/// Analyzer output: the raw content of one slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideChunk {
    pub heading: String,
    pub subheading: Option<String>,
    pub key_points: Vec<String>,
    pub suggested: ContentType,
    pub source_range: Range<usize>,
}

impl SlideChunk {
    /// Heading, subheading and key points joined into one text block.
    pub fn full_text(&self) -> String {
        let mut parts = vec![self.heading.as_str()];
        if let Some(sub) = &self.subheading {
            parts.push(sub.as_str());
        }
        parts.extend(self.key_points.iter().map(String::as_str));
        parts.join("\n")
    }

    pub fn ends_with_question(&self) -> bool {
        let last = self
            .key_points
            .last()
            .map(String::as_str)
            .unwrap_or(self.heading.as_str());
        last.trim_end().ends_with('?') || self.heading.trim_end().ends_with('?')
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    Title,
    Content,
    Question,
    Framework,
}

impl Layout {
    pub fn name(&self) -> &'static str {
        match self {
            Layout::Title => "title",
            Layout::Content => "content",
            Layout::Question => "question",
            Layout::Framework => "framework",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlidePosition {
    First,
    Middle,
    Last,
}

impl SlidePosition {
    pub fn of(index: usize, count: usize) -> Self {
        if index == 0 {
            SlidePosition::First
        } else if index + 1 == count {
            SlidePosition::Last
        } else {
            SlidePosition::Middle
        }
    }
}

/// What a finalized slide shows, one variant per layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum SlideBody {
    Title {
        heading: String,
        subtitle: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        bullets: Vec<String>,
    },
    Content {
        heading: String,
        bullets: Vec<String>,
    },
    Question {
        prompt: String,
        bullets: Vec<String>,
    },
    Framework {
        name: String,
        heading: String,
        bullets: Vec<String>,
    },
}

impl SlideBody {
    pub fn layout(&self) -> Layout {
        match self {
            SlideBody::Title { .. } => Layout::Title,
            SlideBody::Content { .. } => Layout::Content,
            SlideBody::Question { .. } => Layout::Question,
            SlideBody::Framework { .. } => Layout::Framework,
        }
    }

    pub fn heading(&self) -> &str {
        match self {
            SlideBody::Title { heading, .. }
            | SlideBody::Content { heading, .. }
            | SlideBody::Framework { heading, .. } => heading,
            SlideBody::Question { prompt, .. } => prompt,
        }
    }

    pub fn bullets(&self) -> &[String] {
        match self {
            SlideBody::Title { bullets, .. }
            | SlideBody::Content { bullets, .. }
            | SlideBody::Question { bullets, .. }
            | SlideBody::Framework { bullets, .. } => bullets,
        }
    }
}

/// Finalized slide description, ready for rasterization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideSpec {
    pub index: usize,
    pub chunk: SlideChunk,
    pub body: SlideBody,
    pub theme: Theme,
    pub palette: Palette,
    pub duration_ms: Option<u64>,
}

impl SlideSpec {
    pub fn layout(&self) -> Layout {
        self.body.layout()
    }
}

/// A rasterized slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameArtifact {
    pub index: usize,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fingerprint: String,
    pub cached: bool,
}

/// Named bundle of voice parameters keyed by content type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    Podcast,
    Educational,
    Marketing,
    Meditation,
    #[default]
    Narration,
}

impl ProfileKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProfileKind::Podcast => "podcast",
            ProfileKind::Educational => "educational",
            ProfileKind::Marketing => "marketing",
            ProfileKind::Meditation => "meditation",
            ProfileKind::Narration => "narration",
        }
    }
}

/// A synthesized narration track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioArtifact {
    pub path: PathBuf,
    pub duration_seconds: f64,
    pub profile: ProfileKind,
    pub cached: bool,
}

impl AudioArtifact {
    pub fn duration_ms(&self) -> u64 {
        (self.duration_seconds * 1000.0).round() as u64
    }
}

/// A slide aligned to the narration timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedSlide {
    pub spec: SlideSpec,
    pub start_ms: u64,
    pub duration_ms: u64,
}

/// Encoder quality level; maps onto an x264 CRF.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Low,
    Medium,
    #[default]
    High,
}

impl Quality {
    pub fn crf(&self) -> u8 {
        match self {
            Quality::Low => 28,
            Quality::Medium => 23,
            Quality::High => 18,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Quality::Low => "low",
            Quality::Medium => "medium",
            Quality::High => "high",
        }
    }
}

/// Everything the caller decides about one render.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub script: Script,
    pub theme: Theme,
    pub quality: Quality,
    pub max_slides: Option<usize>,
    pub profile: ProfileKind,
    pub output_path: PathBuf,
    pub captions: Option<PathBuf>,
}

impl RenderRequest {
    pub fn new(script: Script, output_path: impl Into<PathBuf>) -> Self {
        Self {
            script,
            theme: Theme::default(),
            quality: Quality::default(),
            max_slides: None,
            profile: ProfileKind::default(),
            output_path: output_path.into(),
            captions: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(max) = self.max_slides
            && !(MIN_SLIDES..=MAX_SLIDES).contains(&max)
        {
            return Err(SlidecastError::InvalidOptions {
                reason: format!("max slides must be between {MIN_SLIDES} and {MAX_SLIDES}, got {max}"),
            });
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(SlidecastError::InvalidOptions {
                reason: "output path is empty".to_string(),
            });
        }
        if let Some(captions) = &self.captions
            && !captions.is_file()
        {
            return Err(SlidecastError::InvalidOptions {
                reason: format!("captions file {} does not exist", captions.display()),
            });
        }
        Ok(())
    }
}

/// What a successful render hands back.
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub mp4_path: PathBuf,
    pub slide_count: usize,
    pub duration_seconds: f64,
    pub manifest: crate::manifest::JobManifest,
    pub manifest_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_detection_needs_a_top_level_heading() {
        assert!(Script::new("# Welcome\n- one").is_markdown());
        assert!(!Script::new("## Only a subheading").is_markdown());
        assert!(!Script::new("Welcome to the AI workshop.").is_markdown());
    }

    #[test]
    fn blank_title_is_dropped() {
        let script = Script::new("text").with_title("   ");
        assert_eq!(script.title(), None);
    }

    #[test]
    fn quality_maps_to_crf() {
        assert_eq!(Quality::Low.crf(), 28);
        assert_eq!(Quality::Medium.crf(), 23);
        assert_eq!(Quality::High.crf(), 18);
        assert_eq!(Quality::default(), Quality::High);
    }

    #[test]
    fn positions_cover_single_and_multi_slide_decks() {
        assert_eq!(SlidePosition::of(0, 1), SlidePosition::First);
        assert_eq!(SlidePosition::of(1, 3), SlidePosition::Middle);
        assert_eq!(SlidePosition::of(2, 3), SlidePosition::Last);
    }

    #[test]
    fn request_rejects_out_of_range_slide_cap() {
        let mut request = RenderRequest::new(Script::new("hello"), "out.mp4");
        request.max_slides = Some(9);
        assert!(matches!(
            request.validate(),
            Err(SlidecastError::InvalidOptions { .. })
        ));
        request.max_slides = Some(7);
        assert!(request.validate().is_ok());
    }
}

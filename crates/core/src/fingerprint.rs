//! Content addressing for frames, narration and working directories.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::{
    error::Result,
    template::TEMPLATE_VERSION,
    theme::{Palette, Theme},
    types::{ProfileKind, Script, SlideBody, SlideSpec},
};

/// Everything that influences the pixels of a frame. Slide index, source
/// range and timing stay out so identical slides share a frame.
#[derive(Serialize)]
struct FrameKey<'a> {
    template_version: &'a str,
    theme: Theme,
    palette: &'a Palette,
    body: &'a SlideBody,
}

#[derive(Serialize)]
struct AudioKey<'a> {
    text: &'a str,
    profile: ProfileKind,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// `hash(slide body, theme, template version)` as lowercase hex.
pub fn frame_fingerprint(spec: &SlideSpec) -> Result<String> {
    let key = FrameKey {
        template_version: TEMPLATE_VERSION,
        theme: spec.theme,
        palette: &spec.palette,
        body: &spec.body,
    };
    Ok(sha256_hex(&serde_json::to_vec(&key)?))
}

/// `hash(script, profile)`; names the cached narration file.
pub fn audio_key(script: &Script, profile: ProfileKind) -> Result<String> {
    let key = AudioKey {
        text: script.text(),
        profile,
    };
    Ok(sha256_hex(&serde_json::to_vec(&key)?))
}

/// Short hash of the script text, used as the working directory name.
pub fn script_hash(script: &Script) -> String {
    let mut hash = sha256_hex(script.text().as_bytes());
    hash.truncate(16);
    hash
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::{
        layout::plan_slides,
        types::{ContentType, SlideChunk},
    };

    fn specs(theme: Theme) -> Vec<SlideSpec> {
        let chunk = |heading: &str| SlideChunk {
            heading: heading.to_string(),
            subheading: None,
            key_points: vec!["Point".to_string()],
            suggested: ContentType::Content,
            source_range: 0..0,
        };
        plan_slides(&[chunk("Welcome"), chunk("Topics"), chunk("Wrap up")], theme, &BTreeMap::new())
    }

    #[test]
    fn fingerprint_is_stable_and_content_sensitive() {
        let dark = specs(Theme::Dark);
        let again = specs(Theme::Dark);
        assert_eq!(
            frame_fingerprint(&dark[1]).unwrap(),
            frame_fingerprint(&again[1]).unwrap()
        );
        assert_ne!(
            frame_fingerprint(&dark[1]).unwrap(),
            frame_fingerprint(&dark[2]).unwrap()
        );

        let light = specs(Theme::Light);
        assert_ne!(
            frame_fingerprint(&dark[1]).unwrap(),
            frame_fingerprint(&light[1]).unwrap()
        );
    }

    #[test]
    fn timing_does_not_change_the_frame() {
        let mut slides = specs(Theme::Dark);
        let before = frame_fingerprint(&slides[0]).unwrap();
        slides[0].duration_ms = Some(4_000);
        slides[0].index = 5;
        assert_eq!(frame_fingerprint(&slides[0]).unwrap(), before);
    }

    #[test]
    fn audio_key_depends_on_profile() {
        let script = Script::new("Welcome to the AI workshop.");
        let narration = audio_key(&script, ProfileKind::Narration).unwrap();
        let podcast = audio_key(&script, ProfileKind::Podcast).unwrap();
        assert_ne!(narration, podcast);
        assert_eq!(narration.len(), 64);
        assert_eq!(script_hash(&script).len(), 16);
    }
}

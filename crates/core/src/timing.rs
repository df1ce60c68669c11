use tracing::{debug, warn};

use crate::{
    error::{Result, SlidecastError},
    types::{AudioArtifact, SlideSpec, TimedSlide},
};

/// Lay slides out along the narration so their durations sum to exactly
/// `round(audio.duration_seconds * 1000)` milliseconds.
///
/// Slides with an explicit `duration_ms` keep it; the remainder is shared
/// equally by the others. When the explicit durations alone exceed the audio
/// they are scaled down proportionally and the other slides get nothing.
pub fn align(specs: &[SlideSpec], audio: &AudioArtifact) -> Result<Vec<TimedSlide>> {
    align_to(specs, audio.duration_ms())
}

pub fn align_to(specs: &[SlideSpec], audio_ms: u64) -> Result<Vec<TimedSlide>> {
    if specs.is_empty() {
        return Err(SlidecastError::CannotAlign {
            reason: "no slides to align".to_string(),
        });
    }
    if audio_ms == 0 {
        return Err(SlidecastError::CannotAlign {
            reason: "narration has zero duration".to_string(),
        });
    }

    let explicit_ms: u64 = specs.iter().filter_map(|s| s.duration_ms).sum();
    let auto_count = specs.iter().filter(|s| s.duration_ms.is_none()).count() as u64;

    let mut durations: Vec<u64> = if explicit_ms > audio_ms {
        warn!(
            explicit_ms,
            audio_ms, "explicit slide durations exceed the narration; scaling them down"
        );
        specs
            .iter()
            .map(|s| match s.duration_ms {
                Some(ms) => {
                    (u128::from(ms) * u128::from(audio_ms) / u128::from(explicit_ms)) as u64
                }
                None => 0,
            })
            .collect()
    } else {
        let auto_ms = audio_ms - explicit_ms;
        let share = auto_ms.checked_div(auto_count).unwrap_or(0);
        specs.iter().map(|s| s.duration_ms.unwrap_or(share)).collect()
    };

    // The last slide absorbs rounding so the total is exact.
    let assigned: u64 = durations.iter().sum();
    if let Some(last) = durations.last_mut() {
        *last += audio_ms.saturating_sub(assigned);
    }

    let mut start_ms = 0;
    let timed: Vec<TimedSlide> = specs
        .iter()
        .zip(durations)
        .map(|(spec, duration_ms)| {
            let slide = TimedSlide {
                spec: spec.clone(),
                start_ms,
                duration_ms,
            };
            start_ms += duration_ms;
            slide
        })
        .collect();

    debug!(
        audio_ms,
        durations = ?timed.iter().map(|t| t.duration_ms).collect::<Vec<_>>(),
        "aligned slides"
    );
    Ok(timed)
}

use crate::{
    manifest::JobManifest,
    types::{RenderOutcome, SlideBody, SlideSpec},
};

/// Format milliseconds as MM:SS timestamp
pub fn format_timestamp(ms: u64) -> String {
    let total = ms / 1000;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Format a slide plan as a readable outline, one block per slide.
pub fn format_plan(specs: &[SlideSpec]) -> String {
    let mut output = String::new();
    for spec in specs {
        output.push_str(&format!(
            "{:>2}. [{}] {}",
            spec.index + 1,
            spec.layout().name(),
            spec.body.heading()
        ));
        if let Some(ms) = spec.duration_ms {
            output.push_str(&format!(" ({}s)", ms as f64 / 1000.0));
        }
        output.push('\n');

        match &spec.body {
            SlideBody::Title {
                subtitle: Some(subtitle),
                ..
            } => output.push_str(&format!("      {}\n", subtitle)),
            SlideBody::Framework { name, .. } => {
                output.push_str(&format!("      framework: {}\n", name))
            }
            _ => {}
        }
        for bullet in spec.body.bullets() {
            output.push_str(&format!("      • {}\n", bullet));
        }
    }
    output
}

/// Format the slide timeline of a finished job.
pub fn format_timeline(manifest: &JobManifest) -> String {
    manifest
        .slides
        .iter()
        .map(|slide| {
            format!(
                "[{}–{}] {} ({})",
                format_timestamp(slide.start_ms),
                format_timestamp(slide.start_ms + slide.duration_ms),
                slide.heading,
                slide.layout.name()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_outcome(outcome: &RenderOutcome) -> String {
    let mut output = String::new();
    output.push_str(&format!("# {}\n\n", outcome.mp4_path.display()));
    output.push_str(&format!(
        "**Slides:** {} | **Duration:** {} | **Theme:** {} | **Quality:** {}\n\n",
        outcome.slide_count,
        format_timestamp((outcome.duration_seconds * 1000.0).round() as u64),
        outcome.manifest.theme,
        outcome.manifest.quality.name()
    ));
    output.push_str("## Timeline\n\n");
    output.push_str(&format_timeline(&outcome.manifest));
    output.push_str("\n\n");
    output.push_str(&format!("Manifest: {}\n", outcome.manifest_path.display()));
    output
}

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use slidecast_core::{PipelineEvent, Progress, Stage};
use tokio::{sync::mpsc, task::JoinHandle};

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

fn create_spinner(multi: &MultiProgress, msg: &str) -> ProgressBar {
    let pb = multi.add(ProgressBar::new_spinner());
    if let Ok(spinner_style) = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.cyan} {msg}")
    {
        pb.set_style(spinner_style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn started_message(stage: Stage) -> &'static str {
    match stage {
        Stage::Analyze => "Analyzing script...",
        Stage::Layout => "Choosing layouts...",
        Stage::Render => "Rendering slides...",
        Stage::Synthesize => "Synthesizing narration...",
        Stage::Align => "Aligning slides to narration...",
        Stage::Encode => "Encoding video...",
        Stage::Publish => "Writing output...",
    }
}

/// Terminal view of a running job, one spinner per active stage.
#[derive(Default)]
struct ProgressView {
    multi: MultiProgress,
    bars: HashMap<Stage, (ProgressBar, Instant)>,
    slides_total: usize,
    slides_cached: usize,
    narration: Option<(f64, bool)>,
}

impl ProgressView {
    fn handle(&mut self, event: PipelineEvent) {
        match event.progress {
            Progress::StageStarted { stage } => {
                let pb = create_spinner(&self.multi, started_message(stage));
                self.bars.insert(stage, (pb, Instant::now()));
            }
            Progress::StageFinished { stage } => {
                if let Some((pb, started)) = self.bars.remove(&stage) {
                    pb.finish_with_message(format!(
                        "{} {} {}",
                        style("✓").green().bold(),
                        self.finished_message(stage),
                        style(format!("[{}]", format_duration(started.elapsed()))).dim()
                    ));
                }
            }
            Progress::SlideRendered { index, total, cached } => {
                self.slides_total = total;
                if cached {
                    self.slides_cached += 1;
                }
                if let Some((pb, _)) = self.bars.get(&Stage::Render) {
                    pb.set_message(format!("Rendering slides... {}/{}", index + 1, total));
                }
            }
            Progress::NarrationReady {
                duration_seconds,
                cached,
            } => self.narration = Some((duration_seconds, cached)),
            Progress::Retrying { stage, attempt, reason } => {
                if let Some((pb, _)) = self.bars.get(&stage) {
                    pb.set_message(format!("{} retry {attempt}: {reason}", started_message(stage)));
                }
            }
            Progress::Warning { message } => {
                let _ = self
                    .multi
                    .println(format!("{} {}", style("!").yellow().bold(), message));
            }
        }
    }

    fn finished_message(&self, stage: Stage) -> String {
        match stage {
            Stage::Render if self.slides_cached > 0 => format!(
                "Rendered {} slides {}",
                self.slides_total,
                style(format!("({} cached)", self.slides_cached)).dim()
            ),
            Stage::Render => format!("Rendered {} slides", self.slides_total),
            Stage::Synthesize => match self.narration {
                Some((secs, true)) => format!("Narration: {secs:.1}s {}", style("(cached)").dim()),
                Some((secs, false)) => format!("Narration: {secs:.1}s"),
                None => "Narration ready".to_string(),
            },
            Stage::Analyze => "Script analyzed".to_string(),
            Stage::Layout => "Layouts chosen".to_string(),
            Stage::Align => "Slides aligned".to_string(),
            Stage::Encode => "Video encoded".to_string(),
            Stage::Publish => "Output written".to_string(),
        }
    }

    /// Stages still spinning when the job ended did not finish.
    fn abandon(self) {
        for (pb, _) in self.bars.into_values() {
            pb.abandon();
        }
    }
}

/// Draw progress until every sender is dropped.
pub fn spawn(mut rx: mpsc::UnboundedReceiver<PipelineEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut view = ProgressView::default();
        while let Some(event) = rx.recv().await {
            view.handle(event);
        }
        view.abandon();
    })
}

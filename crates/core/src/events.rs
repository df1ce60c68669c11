//! Progress events published by the pipeline while a job runs.

use std::time::SystemTime;

use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::Stage;

#[derive(Debug, Clone, Serialize)]
pub struct EventHeader {
    pub event_id: Uuid,
    pub job_id: Uuid,
    pub timestamp: SystemTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Progress {
    StageStarted { stage: Stage },
    StageFinished { stage: Stage },
    SlideRendered { index: usize, total: usize, cached: bool },
    NarrationReady { duration_seconds: f64, cached: bool },
    Retrying { stage: Stage, attempt: u32, reason: String },
    Warning { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineEvent {
    pub header: EventHeader,
    pub progress: Progress,
}

impl PipelineEvent {
    pub fn event_type(&self) -> &'static str {
        match self.progress {
            Progress::StageStarted { .. } => "slidecast.stage_started",
            Progress::StageFinished { .. } => "slidecast.stage_finished",
            Progress::SlideRendered { .. } => "slidecast.slide_rendered",
            Progress::NarrationReady { .. } => "slidecast.narration_ready",
            Progress::Retrying { .. } => "slidecast.retrying",
            Progress::Warning { .. } => "slidecast.warning",
        }
    }
}

/// Publishing end handed to every stage. Without a receiver, events are dropped.
#[derive(Debug, Clone)]
pub struct EventSink {
    job_id: Uuid,
    tx: Option<mpsc::UnboundedSender<PipelineEvent>>,
}

impl EventSink {
    pub fn new(job_id: Uuid, tx: Option<mpsc::UnboundedSender<PipelineEvent>>) -> Self {
        Self { job_id, tx }
    }

    pub fn disabled() -> Self {
        Self {
            job_id: Uuid::nil(),
            tx: None,
        }
    }

    pub fn emit(&self, progress: Progress) {
        let Some(tx) = &self.tx else {
            return;
        };
        let event = PipelineEvent {
            header: EventHeader {
                event_id: Uuid::new_v4(),
                job_id: self.job_id,
                timestamp: SystemTime::now(),
            },
            progress,
        };
        // A closed receiver only means nobody is watching anymore.
        let _ = tx.send(event);
    }
}

// src/logging.rs
//
// Telemetry sinks for training runs.
// - EventSink: trait used by the trainer
// - NoopSink:  discards all events
// - JsonlSink: writes one JSON line per step and per episode summary

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::engine::StepResult;
use crate::rl::trainer::EpisodeSummary;

/// Abstract sink for per-step and per-episode telemetry.
pub trait EventSink {
    fn log_step(&mut self, episode: u64, step: &StepResult);
    fn log_episode(&mut self, summary: &EpisodeSummary);
    /// Flush buffered output. Called once at the end of a run.
    fn flush(&mut self) {}
}

// Lets a Box<dyn EventSink> chosen at runtime flow into the trainer's
// generic sink slot.
impl<T: EventSink + ?Sized> EventSink for Box<T> {
    fn log_step(&mut self, episode: u64, step: &StepResult) {
        (**self).log_step(episode, step);
    }

    fn log_episode(&mut self, summary: &EpisodeSummary) {
        (**self).log_episode(summary);
    }

    fn flush(&mut self) {
        (**self).flush();
    }
}

/// Sink that discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn log_step(&mut self, _episode: u64, _step: &StepResult) {
        // intentionally no-op
    }

    fn log_episode(&mut self, _summary: &EpisodeSummary) {
        // intentionally no-op
    }
}

// Minimal step record; focuses on core risk metrics + counts. The full
// action sequence lives in the run record, not the step stream.
#[derive(Serialize)]
struct StepLine {
    kind: &'static str,
    episode: u64,
    period: u64,
    reward: f64,
    period_cash_flow: f64,
    dscr: f64,
    cash_balance: f64,
    done: bool,
    num_applied: usize,
    num_downgraded: usize,
}

#[derive(Serialize)]
struct EpisodeLine<'a> {
    kind: &'static str,
    #[serde(flatten)]
    summary: &'a EpisodeSummary,
}

/// JSONL file sink.
///
/// Each record is a single JSON object on its own line, tagged with a
/// `kind` field so step and episode records can share one stream.
pub struct JsonlSink {
    writer: BufWriter<File>,
}

impl JsonlSink {
    /// Create a new sink writing to `path`.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    fn write_line<T: Serialize>(&mut self, record: &T) {
        // If telemetry fails we don't want to crash the run,
        // so we deliberately ignore serialization and I/O errors.
        if let Ok(line) = serde_json::to_string(record) {
            let _ = self.writer.write_all(line.as_bytes());
            let _ = self.writer.write_all(b"\n");
        }
    }
}

impl EventSink for JsonlSink {
    fn log_step(&mut self, episode: u64, step: &StepResult) {
        let num_applied = step.info.applied.len();
        let num_downgraded = step
            .info
            .applied
            .iter()
            .filter(|a| !a.outcome.is_accepted())
            .count();
        let line = StepLine {
            kind: "step",
            episode,
            period: step.info.period as u64,
            reward: step.reward,
            period_cash_flow: step.info.period_cash_flow,
            dscr: step.observation.dscr,
            cash_balance: step.observation.cash_balance,
            done: step.done,
            num_applied,
            num_downgraded,
        };
        self.write_line(&line);
    }

    fn log_episode(&mut self, summary: &EpisodeSummary) {
        let line = EpisodeLine {
            kind: "episode",
            summary,
        };
        self.write_line(&line);
    }

    fn flush(&mut self) {
        let _ = self.writer.flush();
    }
}

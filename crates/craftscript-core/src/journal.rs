//! Per-run event channel and result log.
//!
//! A [`RunJournal`] is created for every script run. It tracks:
//!
//! - a run id and optional caller-supplied correlation id
//! - a ring buffer of the most recent step results (up to 1000)
//! - a lossless event stream of [`RunEvent`]s for every subscriber
//! - an optional JSON Lines log file with every step and the final report
//!
//! # Example
//!
//! ```no_run
//! use craftscript_core::journal::{RunEvent, RunJournal};
//!
//! #[tokio::main]
//! async fn main() {
//!     let journal = RunJournal::new("bot-1", None);
//!     let mut rx = journal.subscribe();
//!
//!     tokio::spawn(async move {
//!         while let Some(event) = rx.recv().await {
//!             if let RunEvent::Step(result) = event {
//!                 println!("{}", result);
//!             }
//!         }
//!     });
//! }
//! ```

use std::collections::VecDeque;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::warn;
use uuid::Uuid;

use crate::result::{CraftscriptResult, RunReport, RunState, TraceEvent};
use crate::store::sanitize_actor;

/// Maximum number of results to retain in the ring buffer.
const MAX_RESULT_LOG_SIZE: usize = 1000;

/// Events delivered to subscribers while a run progresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    Started {
        run_id: Uuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        correlation_id: Option<String>,
        actor: String,
    },
    Step(CraftscriptResult),
    Trace(TraceEvent),
    Finished(RunReport),
}

impl RunEvent {
    pub fn is_finished(&self) -> bool {
        matches!(self, RunEvent::Finished(_))
    }
}

pub struct RunJournal {
    pub run_id: Uuid,
    pub correlation_id: Option<String>,
    pub actor: String,
    pub created_at: DateTime<Utc>,
    results: RwLock<VecDeque<CraftscriptResult>>,
    subscribers: StdMutex<Vec<mpsc::UnboundedSender<RunEvent>>>,
    log_writer: Mutex<Option<BufWriter<std::fs::File>>>,
}

impl RunJournal {
    /// Creates a journal that only streams and buffers.
    pub fn new(actor: &str, correlation_id: Option<String>) -> Arc<Self> {
        Self::build(actor, correlation_id, None)
    }

    /// Creates a journal that also persists to
    /// `{log_dir}/{actor}_{timestamp}_{run}.jsonl`. The actor is reduced to a
    /// file-name-safe alphabet first.
    ///
    /// If the file cannot be created the journal still works without persistence.
    pub fn with_log_dir(actor: &str, correlation_id: Option<String>, log_dir: &Path) -> Arc<Self> {
        Self::build(actor, correlation_id, Some(log_dir))
    }

    fn build(actor: &str, correlation_id: Option<String>, log_dir: Option<&Path>) -> Arc<Self> {
        let created_at = Utc::now();
        let run_id = Uuid::new_v4();

        let log_writer = log_dir.and_then(|dir| {
            std::fs::create_dir_all(dir).ok();
            let timestamp = created_at.format("%Y%m%d_%H%M%S");
            let short_id = &run_id.simple().to_string()[..8];
            let path = dir.join(format!("{}_{}_{}.jsonl", sanitize_actor(actor), timestamp, short_id));
            match std::fs::File::create(&path) {
                Ok(file) => Some(BufWriter::new(file)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "could not create run log");
                    None
                }
            }
        });

        Arc::new(Self {
            run_id,
            correlation_id,
            actor: actor.to_string(),
            created_at,
            results: RwLock::new(VecDeque::with_capacity(64)),
            subscribers: StdMutex::new(Vec::new()),
            log_writer: Mutex::new(log_writer),
        })
    }

    /// Receives every event emitted after this call. Nothing is dropped for
    /// slow consumers.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<RunEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(tx);
        rx
    }

    fn publish(&self, event: RunEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    async fn persist(&self, event: &RunEvent) {
        let mut writer_guard = self.log_writer.lock().await;
        if let Some(ref mut writer) = *writer_guard {
            if let Ok(json) = serde_json::to_string(event) {
                let _ = writeln!(writer, "{}", json);
                let _ = writer.flush();
            }
        }
    }

    pub async fn start(&self) {
        let event = RunEvent::Started {
            run_id: self.run_id,
            correlation_id: self.correlation_id.clone(),
            actor: self.actor.clone(),
        };
        self.persist(&event).await;
        self.publish(event);
    }

    /// Records a step result, persists it and streams it.
    pub async fn record(&self, result: CraftscriptResult) {
        {
            let mut log = self.results.write().await;
            if log.len() >= MAX_RESULT_LOG_SIZE {
                log.pop_front();
            }
            log.push_back(result.clone());
        }

        let event = RunEvent::Step(result);
        self.persist(&event).await;
        self.publish(event);
    }

    /// Streams a trace event. Traces are not persisted.
    pub fn trace(&self, event: TraceEvent) {
        self.publish(RunEvent::Trace(event));
    }

    pub async fn finish(&self, report: &RunReport) {
        let state: RunState = report.state();
        tracing::info!(run_id = %self.run_id, ?state, ops = report.ops, "run finished");
        let event = RunEvent::Finished(report.clone());
        self.persist(&event).await;
        self.publish(event);
    }

    /// Snapshot of the buffered results, oldest first.
    pub async fn results(&self) -> Vec<CraftscriptResult> {
        self.results.read().await.iter().cloned().collect()
    }

    pub async fn recent(&self, n: usize) -> Vec<CraftscriptResult> {
        let log = self.results.read().await;
        let skip = log.len().saturating_sub(n);
        log.iter().skip(skip).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::RunOutcome;

    fn report(journal: &RunJournal, results: Vec<CraftscriptResult>) -> RunReport {
        RunReport {
            run_id: journal.run_id,
            correlation_id: journal.correlation_id.clone(),
            ops: results.len() as u64,
            results,
            outcome: RunOutcome::Completed,
        }
    }

    #[tokio::test]
    async fn streams_steps_in_order() {
        let journal = RunJournal::new("bot", Some("corr-1".into()));
        let mut rx = journal.subscribe();

        journal.start().await;
        journal.record(CraftscriptResult::success(0, "dig", 1)).await;
        journal.record(CraftscriptResult::success(1, "place", 2)).await;

        match rx.recv().await.unwrap() {
            RunEvent::Started { correlation_id, .. } => {
                assert_eq!(correlation_id.as_deref(), Some("corr-1"))
            }
            other => panic!("Expected Started, got {:?}", other),
        }
        for expected in 0..2 {
            match rx.recv().await.unwrap() {
                RunEvent::Step(r) => assert_eq!(r.op_index(), expected),
                other => panic!("Expected Step, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn slow_subscriber_sees_every_step() {
        let journal = RunJournal::new("bot", None);
        let mut rx = journal.subscribe();
        for i in 0..2000 {
            journal.record(CraftscriptResult::success(i, "mark", 0)).await;
        }

        let mut seen = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                RunEvent::Step(r) => assert_eq!(r.op_index(), seen),
                other => panic!("Expected Step, got {:?}", other),
            }
            seen += 1;
        }
        assert_eq!(seen, 2000);
    }

    #[tokio::test]
    async fn dropped_subscriber_is_forgotten() {
        let journal = RunJournal::new("bot", None);
        let rx = journal.subscribe();
        let mut kept = journal.subscribe();
        drop(rx);
        journal.record(CraftscriptResult::success(0, "mark", 0)).await;
        assert!(matches!(kept.try_recv(), Ok(RunEvent::Step(_))));
        assert_eq!(journal.subscribers.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ring_buffer_is_bounded() {
        let journal = RunJournal::new("bot", None);
        for i in 0..(MAX_RESULT_LOG_SIZE as u64 + 5) {
            journal.record(CraftscriptResult::success(i, "wait", 0)).await;
        }
        let results = journal.results().await;
        assert_eq!(results.len(), MAX_RESULT_LOG_SIZE);
        assert_eq!(results[0].op_index(), 5);
        assert_eq!(journal.recent(2).await[1].op_index(), MAX_RESULT_LOG_SIZE as u64 + 4);
    }

    #[tokio::test]
    async fn persists_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let journal = RunJournal::with_log_dir("bot", None, dir.path());
        journal.start().await;
        journal.record(CraftscriptResult::success(0, "dig", 3)).await;
        let r = report(&journal, journal.results().await);
        journal.finish(&r).await;

        let entry = std::fs::read_dir(dir.path()).unwrap().next().unwrap().unwrap();
        let text = std::fs::read_to_string(entry.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        let step: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(step["event"], "step");
        assert_eq!(step["op"], "dig");
        let done: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(done["event"], "finished");
    }

    #[tokio::test]
    async fn log_file_stays_inside_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        let journal = RunJournal::with_log_dir("../escaped", None, &logs);
        journal.start().await;

        let outside: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(outside, vec!["logs".to_string()]);

        let inside: Vec<_> = std::fs::read_dir(&logs)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(inside.len(), 1);
        assert!(inside[0].starts_with("___escaped_"));
    }
}

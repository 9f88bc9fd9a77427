//! Run registry — single-flight guard plus a short history of classification runs.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::orchestrator::RunSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunTrigger {
    Startup,
    Schedule,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    /// The run's task ended without reporting a summary (panicked or was cancelled).
    Aborted,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub trigger: RunTrigger,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub summary: Option<RunSummary>,
}

#[derive(Default)]
struct RunBook {
    active: Option<Uuid>,
    records: VecDeque<RunRecord>,
}

/// Tracks at most one active run and the last `retain` run records.
#[derive(Clone)]
pub struct RunRegistry {
    inner: Arc<Mutex<RunBook>>,
    retain: usize,
}

impl RunRegistry {
    pub fn new(retain: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RunBook::default())),
            retain: retain.max(1),
        }
    }

    /// Claims the single run slot. Returns the id of the run already holding it on conflict.
    pub fn begin(&self, trigger: RunTrigger) -> Result<ActiveRun, Uuid> {
        let mut book = self.lock();
        if let Some(active) = book.active {
            return Err(active);
        }

        let id = Uuid::new_v4();
        book.active = Some(id);
        book.records.push_back(RunRecord {
            id,
            trigger,
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            summary: None,
        });
        while book.records.len() > self.retain {
            book.records.pop_front();
        }

        Ok(ActiveRun {
            registry: self.clone(),
            id,
            finished: false,
        })
    }

    pub fn get(&self, id: Uuid) -> Option<RunRecord> {
        self.lock().records.iter().find(|r| r.id == id).cloned()
    }

    /// Retained records, newest first.
    pub fn recent(&self) -> Vec<RunRecord> {
        self.lock().records.iter().rev().cloned().collect()
    }

    pub fn active(&self) -> Option<Uuid> {
        self.lock().active
    }

    fn finish(&self, id: Uuid, status: RunStatus, summary: Option<RunSummary>) {
        let mut book = self.lock();
        if book.active == Some(id) {
            book.active = None;
        }
        if let Some(record) = book.records.iter_mut().find(|r| r.id == id) {
            record.status = status;
            record.finished_at = Some(Utc::now());
            record.summary = summary;
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunBook> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Holds the run slot until completed or dropped. Dropping without
/// `complete` marks the run aborted and frees the slot.
pub struct ActiveRun {
    registry: RunRegistry,
    id: Uuid,
    finished: bool,
}

impl ActiveRun {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn complete(mut self, summary: RunSummary) {
        self.registry
            .finish(self.id, RunStatus::Completed, Some(summary));
        self.finished = true;
    }
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        if !self.finished {
            self.registry.finish(self.id, RunStatus::Aborted, None);
        }
    }
}

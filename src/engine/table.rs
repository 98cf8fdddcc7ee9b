// src/engine/table.rs

//! The worker state table: one [`WorkerRecord`] per spawned worker, keyed by
//! id. Only the orchestrator core mutates it.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::types::{Priority, SpeedFactor, WorkKind, WorkerId};
use crate::worker::WorkerState;

/// Orchestrator-side view of one worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerRecord {
    pub id: WorkerId,
    pub work_kind: WorkKind,
    pub speed: SpeedFactor,
    pub priority: Priority,
    pub state: WorkerState,
    /// Percent of units done, as last reported. Never decreases.
    pub progress: u8,
    pub started_at: DateTime<Local>,
    pub ended_at: Option<DateTime<Local>>,
    /// Run time reported by the worker; set on `Completed` only.
    pub duration: Option<Duration>,
    pub termination_requested: bool,
    pub last_error: Option<String>,
}

impl WorkerRecord {
    pub fn new(id: WorkerId, work_kind: WorkKind, speed: SpeedFactor, priority: Priority) -> Self {
        Self {
            id,
            work_kind,
            speed,
            priority,
            state: WorkerState::Created,
            progress: 0,
            started_at: Local::now(),
            ended_at: None,
            duration: None,
            termination_requested: false,
            last_error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

#[derive(Debug, Default)]
pub struct StateTable {
    records: BTreeMap<WorkerId, WorkerRecord>,
}

impl StateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: WorkerRecord) {
        self.records.insert(record.id, record);
    }

    pub fn get(&self, id: WorkerId) -> Option<&WorkerRecord> {
        self.records.get(&id)
    }

    pub fn get_mut(&mut self, id: WorkerId) -> Option<&mut WorkerRecord> {
        self.records.get_mut(&id)
    }

    pub fn remove(&mut self, id: WorkerId) -> Option<WorkerRecord> {
        self.records.remove(&id)
    }

    pub fn contains(&self, id: WorkerId) -> bool {
        self.records.contains_key(&id)
    }

    /// Every record, live or finished.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in id order.
    pub fn iter(&self) -> impl Iterator<Item = &WorkerRecord> {
        self.records.values()
    }

    pub fn live_ids(&self) -> Vec<WorkerId> {
        self.records
            .values()
            .filter(|r| !r.is_terminal())
            .map(|r| r.id)
            .collect()
    }

    pub fn live_count(&self) -> usize {
        self.records.values().filter(|r| !r.is_terminal()).count()
    }

    /// Remove and return every terminal record.
    pub fn remove_terminal(&mut self) -> Vec<WorkerRecord> {
        let ids: Vec<WorkerId> = self
            .records
            .values()
            .filter(|r| r.is_terminal())
            .map(|r| r.id)
            .collect();
        ids.into_iter()
            .filter_map(|id| self.records.remove(&id))
            .collect()
    }
}

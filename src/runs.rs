// src/runs.rs
//
// Run-orchestration layer: lifecycle and persistence of optimization runs.
//
// Run state lives in an explicit store keyed by run id behind the RunStore
// trait, so a service embedding the trainer can swap the in-memory store
// for a durable one without touching the training code. The store is
// invoked once training terminates, never during it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{MansardError, Result};
use crate::types::{AssetAction, Period};

pub type RunId = u64;

/// Lifecycle of one optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

/// One entry of the produced action schedule.
///
/// Hold decisions are implicit; only capital actions (refinance, sell,
/// capex) are recorded. Confidence is the probability the trained policy
/// assigned to the chosen action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedAction {
    pub period: Period,
    pub asset_id: String,
    pub action: AssetAction,
    pub confidence: f64,
}

/// Persistent record of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub status: RunStatus,
    pub seed: u64,
    pub episodes: u64,
    /// Terminal return of the all-hold rollout on the evaluation seed.
    pub baseline_return: Option<f64>,
    /// Terminal return of the trained greedy policy on the same seed.
    pub optimized_return: Option<f64>,
    pub actions: Vec<RecommendedAction>,
    pub error: Option<String>,
}

/// Storage interface for run records.
pub trait RunStore {
    /// Register a new pending run and return its id.
    fn create(&mut self, seed: u64, episodes: u64) -> RunId;

    fn update_status(&mut self, run_id: RunId, status: RunStatus) -> Result<()>;

    /// Mark a run completed with its evaluation results.
    fn complete(
        &mut self,
        run_id: RunId,
        baseline_return: f64,
        optimized_return: f64,
        actions: Vec<RecommendedAction>,
    ) -> Result<()>;

    /// Mark a run failed with a human-readable reason.
    fn fail(&mut self, run_id: RunId, error: String) -> Result<()>;

    fn get(&self, run_id: RunId) -> Option<&RunRecord>;

    fn list(&self) -> Vec<&RunRecord>;
}

/// BTreeMap-backed store; ids ascend from 1 in creation order.
#[derive(Debug, Default)]
pub struct InMemoryRunStore {
    next_id: RunId,
    runs: BTreeMap<RunId, RunRecord>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_mut(&mut self, run_id: RunId) -> Result<&mut RunRecord> {
        self.runs
            .get_mut(&run_id)
            .ok_or(MansardError::UnknownRun(run_id))
    }
}

impl RunStore for InMemoryRunStore {
    fn create(&mut self, seed: u64, episodes: u64) -> RunId {
        self.next_id += 1;
        let run_id = self.next_id;
        self.runs.insert(
            run_id,
            RunRecord {
                run_id,
                status: RunStatus::Pending,
                seed,
                episodes,
                baseline_return: None,
                optimized_return: None,
                actions: Vec::new(),
                error: None,
            },
        );
        run_id
    }

    fn update_status(&mut self, run_id: RunId, status: RunStatus) -> Result<()> {
        self.get_mut(run_id)?.status = status;
        Ok(())
    }

    fn complete(
        &mut self,
        run_id: RunId,
        baseline_return: f64,
        optimized_return: f64,
        actions: Vec<RecommendedAction>,
    ) -> Result<()> {
        let record = self.get_mut(run_id)?;
        record.status = RunStatus::Completed;
        record.baseline_return = Some(baseline_return);
        record.optimized_return = Some(optimized_return);
        record.actions = actions;
        Ok(())
    }

    fn fail(&mut self, run_id: RunId, error: String) -> Result<()> {
        let record = self.get_mut(run_id)?;
        record.status = RunStatus::Failed;
        record.error = Some(error);
        Ok(())
    }

    fn get(&self, run_id: RunId) -> Option<&RunRecord> {
        self.runs.get(&run_id)
    }

    fn list(&self) -> Vec<&RunRecord> {
        self.runs.values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_lifecycle() {
        let mut store = InMemoryRunStore::new();
        let id = store.create(42, 300);
        assert_eq!(store.get(id).map(|r| r.status), Some(RunStatus::Pending));

        store.update_status(id, RunStatus::Running).unwrap();
        assert_eq!(store.get(id).map(|r| r.status), Some(RunStatus::Running));

        let actions = vec![RecommendedAction {
            period: 12,
            asset_id: "maple-court".to_string(),
            action: AssetAction::Refinance,
            confidence: 0.61,
        }];
        store.complete(id, 0.042, 0.097, actions).unwrap();

        let record = store.get(id).unwrap();
        assert_eq!(record.status, RunStatus::Completed);
        assert_eq!(record.baseline_return, Some(0.042));
        assert_eq!(record.optimized_return, Some(0.097));
        assert_eq!(record.actions.len(), 1);
        assert!(record.error.is_none());
    }

    #[test]
    fn test_failed_run_keeps_reason() {
        let mut store = InMemoryRunStore::new();
        let id = store.create(7, 10);
        store.fail(id, "asset list is empty".to_string()).unwrap();

        let record = store.get(id).unwrap();
        assert_eq!(record.status, RunStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("asset list is empty"));
        assert!(record.baseline_return.is_none());
    }

    #[test]
    fn test_unknown_run_id_is_an_error() {
        let mut store = InMemoryRunStore::new();
        assert!(matches!(
            store.update_status(99, RunStatus::Running),
            Err(MansardError::UnknownRun(99))
        ));
    }

    #[test]
    fn test_ids_ascend_in_creation_order() {
        let mut store = InMemoryRunStore::new();
        let a = store.create(1, 5);
        let b = store.create(2, 5);
        assert!(b > a);
        let listed: Vec<RunId> = store.list().iter().map(|r| r.run_id).collect();
        assert_eq!(listed, vec![a, b]);
    }
}

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use serde::Serialize;
use tracing::{error, info};

use crate::error::AgentError;
use crate::models::ApplicationResult;
use crate::pipeline::Pipeline;

/// Builds a fresh pipeline for each run.
pub type PipelineFactory = Box<dyn Fn() -> Result<Pipeline, AgentError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Serializable projection of one submitted application for status callers.
#[derive(Debug, Clone, Serialize)]
pub struct ResultView {
    pub job_title: String,
    pub company: String,
    pub status: String,
    pub submitted_at: String,
    pub notes: Option<String>,
}

/// Terminal record of the most recent run, retained until superseded.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub status: RunState,
    pub total_applications: usize,
    pub notes: Option<String>,
    pub results: Vec<ResultView>,
}

impl RunRecord {
    fn running() -> Self {
        Self {
            status: RunState::Running,
            total_applications: 0,
            notes: None,
            results: Vec::new(),
        }
    }

    fn completed(results: &[ApplicationResult]) -> Self {
        Self {
            status: RunState::Completed,
            total_applications: results.len(),
            notes: None,
            results: results
                .iter()
                .map(|result| ResultView {
                    job_title: result.job.title.clone(),
                    company: result.job.company.clone(),
                    status: result.status.to_string(),
                    submitted_at: result.submitted_at.to_rfc3339(),
                    notes: result.notes.clone(),
                })
                .collect(),
        }
    }

    fn failed(notes: String) -> Self {
        Self {
            status: RunState::Failed,
            total_applications: 0,
            notes: Some(notes),
            results: Vec::new(),
        }
    }
}

/// Non-blocking view returned by [`RunSupervisor::status`].
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub running: bool,
    pub latest: Option<RunRecord>,
}

struct SupervisorState {
    active: bool,
    latest: Option<RunRecord>,
    handle: Option<JoinHandle<()>>,
}

/// Owns the single pipeline slot: at most one run is in flight process-wide.
/// `start` launches a run on its own thread and returns immediately;
/// concurrent `start` calls are rejected, never queued. The worker clears
/// the active flag on every exit path, including panics, so a crashed run
/// can never wedge the slot.
pub struct RunSupervisor {
    state: Arc<Mutex<SupervisorState>>,
    factory: PipelineFactory,
}

impl RunSupervisor {
    pub fn new(factory: PipelineFactory) -> Self {
        Self {
            state: Arc::new(Mutex::new(SupervisorState {
                active: false,
                latest: None,
                handle: None,
            })),
            factory,
        }
    }

    pub fn start(&self, max_jobs: Option<usize>) -> Result<(), AgentError> {
        let mut state = lock(&self.state);
        if state.active {
            return Err(AgentError::Busy);
        }

        let pipeline = match (self.factory)() {
            Ok(pipeline) => pipeline,
            Err(e) => {
                state.latest = Some(RunRecord::failed(e.to_string()));
                return Err(e);
            }
        };

        state.active = true;
        state.latest = Some(RunRecord::running());

        let shared = Arc::clone(&self.state);
        let handle = std::thread::spawn(move || execute(shared, pipeline, max_jobs));
        state.handle = Some(handle);

        info!(max_jobs, "run launched");
        Ok(())
    }

    /// Consistent snapshot of the active flag and the latest terminal
    /// record. Safe to call at any time, including while a run is active.
    pub fn status(&self) -> StatusSnapshot {
        let state = lock(&self.state);
        StatusSnapshot {
            running: state.active,
            latest: state.latest.clone(),
        }
    }

    /// Block until the in-flight run (if any) has finished. Used by callers
    /// that launched a run and want its terminal record deterministically.
    pub fn wait(&self) {
        let handle = lock(&self.state).handle.take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

fn execute(
    state: Arc<Mutex<SupervisorState>>,
    pipeline: Pipeline,
    max_jobs: Option<usize>,
) {
    let outcome = catch_unwind(AssertUnwindSafe(|| pipeline.run(max_jobs)));

    let record = match outcome {
        Ok(Ok(results)) => RunRecord::completed(&results),
        Ok(Err(e)) => {
            error!(error = %e, "run failed");
            RunRecord::failed(e.to_string())
        }
        Err(_) => {
            error!("run panicked");
            RunRecord::failed(AgentError::Unexpected("run aborted".to_string()).to_string())
        }
    };

    // Cleanup must happen on every path or future starts would deadlock.
    let mut guard = lock(&state);
    guard.latest = Some(record);
    guard.active = false;
}

fn lock(state: &Arc<Mutex<SupervisorState>>) -> MutexGuard<'_, SupervisorState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

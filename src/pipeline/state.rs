//! Run state shared by training pipelines

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use crate::error::{PipelineError, Result};

/// Lifecycle of a training run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RunStatus {
    Idle = 0,
    Running = 1,
    Succeeded = 2,
    Failed = 3,
}

impl RunStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => RunStatus::Running,
            2 => RunStatus::Succeeded,
            3 => RunStatus::Failed,
            _ => RunStatus::Idle,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Atomic run state. At most one run holds it at a time.
#[derive(Debug)]
pub struct RunState {
    status: AtomicU8,
}

static GLOBAL_RUN_STATE: OnceLock<Arc<RunState>> = OnceLock::new();

impl RunState {
    pub const fn new() -> Self {
        Self {
            status: AtomicU8::new(RunStatus::Idle as u8),
        }
    }

    /// Process-wide state shared by pipelines that were not given their own
    pub fn global() -> Arc<RunState> {
        GLOBAL_RUN_STATE
            .get_or_init(|| Arc::new(RunState::new()))
            .clone()
    }

    pub fn status(&self) -> RunStatus {
        RunStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    pub fn is_running(&self) -> bool {
        self.status() == RunStatus::Running
    }

    /// Enter `Running` from any terminal or idle state.
    ///
    /// The returned guard leaves the state `Failed` when dropped, unless
    /// [`RunGuard::succeed`] was called first.
    pub fn try_begin(&self) -> Result<RunGuard<'_>> {
        let mut current = self.status.load(Ordering::SeqCst);
        loop {
            if current == RunStatus::Running as u8 {
                return Err(PipelineError::AlreadyRunning);
            }
            match self.status.compare_exchange(
                current,
                RunStatus::Running as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    return Ok(RunGuard {
                        state: self,
                        outcome: RunStatus::Failed,
                    })
                }
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds `Running` for the duration of one run
#[derive(Debug)]
pub struct RunGuard<'a> {
    state: &'a RunState,
    outcome: RunStatus,
}

impl RunGuard<'_> {
    pub fn succeed(mut self) {
        self.outcome = RunStatus::Succeeded;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.state.status.store(self.outcome as u8, Ordering::SeqCst);
    }
}

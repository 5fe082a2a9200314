//! Runs the native and the interpreted task once, side by side.

use crate::synchronization::{BarrierError, Participant, RendezvousBarrier};
use crate::task_thread::TaskThread;
use crate::{Computation, RunConfig, TaskError, TaskLabel, TaskReport};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// The run could not even start both tasks.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Barrier(#[from] BarrierError),
    #[error("failed to spawn the {label} task: {source}")]
    Spawn { label: TaskLabel, source: io::Error },
}

/// Per-task results of one run. They are reported side by side and never
/// combined.
#[derive(Debug)]
pub struct RunOutcome {
    pub native: Result<TaskReport, TaskError>,
    pub interpreted: Result<TaskReport, TaskError>,
}

impl RunOutcome {
    #[must_use]
    pub const fn results(&self) -> [&Result<TaskReport, TaskError>; 2] {
        [&self.native, &self.interpreted]
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.native.is_ok() && self.interpreted.is_ok()
    }
}

#[derive(Debug, Default)]
pub struct TaskRunner {
    config: RunConfig,
}

impl TaskRunner {
    #[must_use]
    pub const fn new(config: RunConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Spawns both tasks on their own thread, lets them meet at a fresh
    /// barrier and joins both.
    ///
    /// A failing task does not keep the other one from reporting.
    pub fn run<N, I>(&self, native: N, interpreted: I) -> Result<RunOutcome, RunError>
    where
        N: Computation + 'static,
        I: Computation + 'static,
    {
        let RunConfig {
            input,
            participants,
            barrier_timeout,
        } = self.config;

        let barrier = Arc::new(RendezvousBarrier::new(participants)?);
        let native_seat = RendezvousBarrier::enlist(&barrier)?;
        let interpreted_seat = RendezvousBarrier::enlist(&barrier)?;
        tracing::debug!(participants, input, ?barrier_timeout, "starting tasks");

        let native = spawn_task(native_seat, native, input, barrier_timeout)?;
        let interpreted = spawn_task(interpreted_seat, interpreted, input, barrier_timeout)?;

        // Join both, no timeout. Dropping `native` on an early return above
        // unblocks its thread.
        Ok(RunOutcome {
            native: native.join(),
            interpreted: interpreted.join(),
        })
    }
}

fn spawn_task<C: Computation + 'static>(
    seat: Participant,
    computation: C,
    input: i64,
    barrier_timeout: Option<Duration>,
) -> Result<TaskThread, RunError> {
    let label = computation.label();
    TaskThread::spawn(seat, computation, input, barrier_timeout)
        .map_err(|source| RunError::Spawn { label, source })
}

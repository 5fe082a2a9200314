#![deny(
    clippy::all,
    clippy::cargo,
    clippy::nursery,
    clippy::must_use_candidate,
    clippy::perf
    // clippy::restriction,
    // clippy::pedantic
)]
// now allow a few rules which are denied by the above statement
// --> they are ridiculous and not necessary
#![allow(
    clippy::suboptimal_flops,
    clippy::redundant_pub_crate,
    clippy::fallible_impl_from
)]
#![deny(missing_debug_implementations)]

pub mod file_io;
pub mod native;
pub mod optimizer;
pub mod runner;
pub mod synchronization;
pub mod task_thread;

use crate::native::{NativeError, NativeRoutine};
use crate::synchronization::BarrierError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Which side of the demo produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskLabel {
    Native,
    Interpreted,
}

impl fmt::Display for TaskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => f.write_str("native"),
            Self::Interpreted => f.write_str("interpreted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComputeError {
    #[error(transparent)]
    Native(#[from] NativeError),
    #[error("10 × {input} does not fit into 64 bits")]
    Overflow { input: i64 },
}

/// A computation run by one task after the rendezvous.
pub trait Computation: Send + Sync {
    fn label(&self) -> TaskLabel;

    fn compute(&self, input: i64) -> Result<i64, ComputeError>;
}

/// Task A: hands its input to an opaque [`NativeRoutine`].
#[derive(Debug, Default)]
pub struct NativeTask<R> {
    routine: R,
}

impl<R: NativeRoutine> NativeTask<R> {
    pub const fn new(routine: R) -> Self {
        Self { routine }
    }
}

impl<R: NativeRoutine> Computation for NativeTask<R> {
    fn label(&self) -> TaskLabel {
        TaskLabel::Native
    }

    fn compute(&self, input: i64) -> Result<i64, ComputeError> {
        tracing::debug!(routine = self.routine.name(), input, "calling native routine");
        Ok(self.routine.call(input)?)
    }
}

/// Task B: multiplies its input by ten.
#[derive(Debug, Default, Clone, Copy)]
pub struct InterpretedTask;

impl Computation for InterpretedTask {
    fn label(&self) -> TaskLabel {
        TaskLabel::Interpreted
    }

    fn compute(&self, input: i64) -> Result<i64, ComputeError> {
        input
            .checked_mul(10)
            .ok_or(ComputeError::Overflow { input })
    }
}

/// What a task reports after a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub label: TaskLabel,
    pub input: i64,
    pub result: i64,
    /// Barrier generation the task was released in.
    pub generation: u64,
}

impl fmt::Display for TaskReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] result: {}", self.label, self.result)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error(transparent)]
    Barrier(#[from] BarrierError),
    #[error("{label} task failed: {source}")]
    Compute {
        label: TaskLabel,
        source: ComputeError,
    },
    #[error("{label} task panicked: {message}")]
    Panicked { label: TaskLabel, message: String },
}

/// Hardcoded parameters of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Input handed to both tasks.
    pub input: i64,
    pub participants: usize,
    /// `None` waits at the rendezvous forever.
    pub barrier_timeout: Option<Duration>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input: 7,
            participants: 2,
            barrier_timeout: Some(Duration::from_secs(10)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;

    /// Stands in for the compiled routine.
    #[derive(Debug)]
    pub(crate) struct MockRoutine(pub(crate) i64);

    impl NativeRoutine for MockRoutine {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn call(&self, _input: i64) -> Result<i64, NativeError> {
            Ok(self.0)
        }
    }

    #[test]
    fn interpreted_task_multiplies_by_ten() {
        check!(InterpretedTask.compute(7) == Ok(70));
        for n in [-1_000_000, -1, 0, 1, 12, i64::MAX / 10] {
            check!(InterpretedTask.compute(n) == Ok(10 * n));
        }
        check!(InterpretedTask.compute(i64::MAX) == Err(ComputeError::Overflow { input: i64::MAX }));
    }

    #[test]
    fn native_task_returns_what_the_routine_returns() {
        let task = NativeTask::new(MockRoutine(123));
        check!(task.label() == TaskLabel::Native);
        check!(task.compute(7) == Ok(123));
    }

    #[test]
    fn native_task_with_heavy_compute() {
        let task = NativeTask::<native::HeavyCompute>::default();
        check!(task.compute(7) == Ok(91));
        check!(matches!(task.compute(i64::MIN), Err(ComputeError::Native(_))));
    }

    #[test]
    fn report_line() {
        let report = TaskReport {
            label: TaskLabel::Interpreted,
            input: 7,
            result: 70,
            generation: 0,
        };
        check!(report.to_string() == "[interpreted] result: 70");
    }

    #[test]
    fn default_run_config() {
        let config = RunConfig::default();
        check!(config.input == 7);
        check!(config.participants == 2);
    }
}

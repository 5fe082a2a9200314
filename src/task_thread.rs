//! Module for task control. See [`TaskThread`].

use crate::synchronization::{Participant, RendezvousBarrier};
use crate::{Computation, TaskError, TaskLabel, TaskReport};
use std::any::Any;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Handle to a thread that meets its siblings at a [`RendezvousBarrier`] and
/// then runs one [`Computation`].
///
/// The result is handed back through [`TaskThread::join`]; a panic inside the
/// computation ends only this thread and shows up as
/// [`TaskError::Panicked`].
#[derive(Debug)]
pub struct TaskThread {
    label: TaskLabel,
    handle: Option<JoinHandle<Result<TaskReport, TaskError>>>,
    barrier: Arc<RendezvousBarrier>,
}

impl TaskThread {
    fn thread_fn<C: Computation>(
        computation: C,
        participant: Participant,
        input: i64,
        barrier_timeout: Option<Duration>,
    ) -> impl FnOnce() -> Result<TaskReport, TaskError> {
        move || {
            let label = computation.label();

            // Wait for the sibling tasks.
            let released = match barrier_timeout {
                Some(timeout) => participant.wait_timeout(timeout),
                None => participant.wait(),
            }?;
            drop(participant);
            tracing::debug!(
                %label,
                generation = released.generation(),
                leader = released.is_leader(),
                "released from rendezvous"
            );

            let result = computation
                .compute(input)
                .map_err(|source| TaskError::Compute { label, source })?;
            tracing::info!(%label, input, result, "task finished");

            Ok(TaskReport {
                label,
                input,
                result,
                generation: released.generation(),
            })
        }
    }

    /// Spawns a new thread.
    ///
    /// The thread blocks on `participant` until all participants of its
    /// barrier have arrived, giving up after `barrier_timeout` if set.
    pub fn spawn<C: Computation + 'static>(
        participant: Participant,
        computation: C,
        input: i64,
        barrier_timeout: Option<Duration>,
    ) -> io::Result<Self> {
        let label = computation.label();
        let barrier = participant.barrier().clone();
        let handle = thread::Builder::new()
            .name(format!("{label}-task"))
            .spawn(Self::thread_fn(
                computation,
                participant,
                input,
                barrier_timeout,
            ))?;

        Ok(Self {
            label,
            handle: Some(handle),
            barrier,
        })
    }

    #[must_use]
    pub const fn label(&self) -> TaskLabel {
        self.label
    }

    /// Blocks until the thread is done and returns what it reported.
    pub fn join(mut self) -> Result<TaskReport, TaskError> {
        let handle = self.handle.take().expect("should still have thread handle");
        handle.join().unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            tracing::error!(label = %self.label, %message, "task panicked");
            Err(TaskError::Panicked {
                label: self.label,
                message,
            })
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl Drop for TaskThread {
    fn drop(&mut self) {
        // Already joined.
        let Some(handle) = self.handle.take() else {
            return;
        };

        // unblock thread from waiting for its siblings
        if self.barrier.break_barrier() {
            tracing::warn!(label = %self.label, "task dropped before join, barrier broken");
        }
        let _ = handle.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synchronization::BarrierError;
    use crate::{ComputeError, InterpretedTask};
    use assert2::{check, let_assert};

    struct Exploding;

    impl Computation for Exploding {
        fn label(&self) -> TaskLabel {
            TaskLabel::Native
        }

        fn compute(&self, _input: i64) -> Result<i64, ComputeError> {
            panic!("native routine exploded");
        }
    }

    fn seats(n: usize) -> (Arc<RendezvousBarrier>, Vec<Participant>) {
        let barrier = Arc::new(RendezvousBarrier::new(n).unwrap());
        let seats = (0..n)
            .map(|_| RendezvousBarrier::enlist(&barrier).unwrap())
            .collect();
        (barrier, seats)
    }

    #[test]
    fn test_thread_lifecycle() {
        let (barrier, mut seats) = seats(2);
        let a = TaskThread::spawn(seats.pop().unwrap(), InterpretedTask, 7, None).unwrap();
        let b = TaskThread::spawn(seats.pop().unwrap(), InterpretedTask, 3, None).unwrap();

        let a = a.join().unwrap();
        let b = b.join().unwrap();
        check!(a.result == 70);
        check!(b.result == 30);
        check!(a.generation == b.generation);
        check!(!barrier.is_broken());
    }

    #[test]
    fn panic_is_reported_by_join_only() {
        let (_barrier, mut seats) = seats(2);
        let native = TaskThread::spawn(seats.pop().unwrap(), Exploding, 7, None).unwrap();
        let interpreted =
            TaskThread::spawn(seats.pop().unwrap(), InterpretedTask, 7, None).unwrap();

        check!(native.label() == TaskLabel::Native);
        let_assert!(Err(TaskError::Panicked { label, message }) = native.join());
        check!(label == TaskLabel::Native);
        check!(message == "native routine exploded");
        check!(interpreted.join().unwrap().result == 70);
    }

    #[test]
    fn lonely_task_times_out() {
        let (barrier, mut seats) = seats(2);
        let timeout = Duration::from_millis(20);
        let task = TaskThread::spawn(seats.pop().unwrap(), InterpretedTask, 7, Some(timeout))
            .unwrap();

        check!(task.join() == Err(TaskError::Barrier(BarrierError::TimedOut { timeout })));
        check!(barrier.is_broken());
    }

    #[test]
    fn drop_unblocks_waiting_thread() {
        let (barrier, mut seats) = seats(2);
        let task = TaskThread::spawn(seats.pop().unwrap(), InterpretedTask, 7, None).unwrap();

        // Test succeeds if this does not get stuck.
        drop(task);
        check!(barrier.is_broken());
    }
}

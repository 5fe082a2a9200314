//! Reusable rendezvous barrier for a fixed number of threads.
//!
//! Unlike [`std::sync::Barrier`], a [`RendezvousBarrier`] can time out and
//! can be broken. A broken barrier never trips again: every current and
//! future waiter observes [`BarrierError::Broken`].

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BarrierError {
    #[error("a barrier needs at least one participant")]
    ZeroParticipants,
    #[error("participant overflow: the barrier admits only {participants} participants")]
    ParticipantOverflow { participants: usize },
    #[error("barrier wait timed out after {timeout:?}")]
    TimedOut { timeout: Duration },
    #[error("broken barrier")]
    Broken,
    #[error("barrier state poisoned by a panicking thread")]
    Poisoned,
}

#[derive(Debug)]
struct BarrierState {
    // arrival count for the current generation
    arrived: usize,
    // increments every time all participants meet
    generation: u64,
    broken: bool,
    // live `Participant` seats
    enlisted: usize,
}

/// Returned to every thread released from a [`RendezvousBarrier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierWaitResult {
    generation: u64,
    is_leader: bool,
}

impl BarrierWaitResult {
    /// The generation this wait belonged to (0 for the first round).
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// `true` for exactly one thread per generation: the last to arrive.
    #[must_use]
    pub const fn is_leader(&self) -> bool {
        self.is_leader
    }
}

/// A barrier for `participants` threads.
///
/// The first `participants - 1` threads calling [`Self::wait`] are suspended.
/// The last one releases all of them and resets the arrival count, so the
/// barrier can be used for the next round right away.
#[derive(Debug)]
pub struct RendezvousBarrier {
    participants: usize,
    state: Mutex<BarrierState>,
    cvar: Condvar,
}

impl RendezvousBarrier {
    pub fn new(participants: usize) -> Result<Self, BarrierError> {
        if participants == 0 {
            return Err(BarrierError::ZeroParticipants);
        }
        Ok(Self {
            participants,
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
                broken: false,
                enlisted: 0,
            }),
            cvar: Condvar::new(),
        })
    }

    #[must_use]
    pub const fn participants(&self) -> usize {
        self.participants
    }

    /// Number of completed rounds.
    pub fn generation(&self) -> Result<u64, BarrierError> {
        Ok(self.lock()?.generation)
    }

    /// A poisoned barrier counts as broken.
    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.lock().map_or(true, |state| state.broken)
    }

    /// Arrive and block until all participants have arrived.
    pub fn wait(&self) -> Result<BarrierWaitResult, BarrierError> {
        self.wait_inner(None)
    }

    /// Like [`Self::wait`], but gives up after `timeout`.
    ///
    /// Timing out breaks the barrier: the caller gets
    /// [`BarrierError::TimedOut`], everybody else [`BarrierError::Broken`].
    pub fn wait_timeout(&self, timeout: Duration) -> Result<BarrierWaitResult, BarrierError> {
        self.wait_inner(Some(timeout))
    }

    /// Force the barrier into the broken state and wake every waiter.
    ///
    /// Returns `false` if the barrier was already broken.
    pub fn break_barrier(&self) -> bool {
        let Ok(mut state) = self.lock() else {
            // poisoned barriers are broken already
            return false;
        };
        if state.broken {
            return false;
        }
        Self::mark_broken(&mut state);
        drop(state);
        self.cvar.notify_all();
        tracing::debug!(participants = self.participants, "barrier broken on request");
        true
    }

    /// Takes one of the `participants` seats of the barrier.
    ///
    /// Fails with [`BarrierError::ParticipantOverflow`] when all seats are
    /// taken. The seat is given back when the [`Participant`] is dropped.
    pub fn enlist(this: &Arc<Self>) -> Result<Participant, BarrierError> {
        let mut state = this.lock()?;
        if state.enlisted >= this.participants {
            return Err(BarrierError::ParticipantOverflow {
                participants: this.participants,
            });
        }
        state.enlisted += 1;
        drop(state);

        Ok(Participant {
            barrier: Arc::clone(this),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, BarrierState>, BarrierError> {
        self.state.lock().map_err(|_| BarrierError::Poisoned)
    }

    fn mark_broken(state: &mut BarrierState) {
        state.broken = true;
        state.arrived = 0;
    }

    fn wait_inner(&self, timeout: Option<Duration>) -> Result<BarrierWaitResult, BarrierError> {
        // a deadline past what `Instant` can represent means no deadline
        let deadline = timeout.and_then(|timeout| {
            Instant::now()
                .checked_add(timeout)
                .map(|deadline| (timeout, deadline))
        });

        let mut state = self.lock()?;
        if state.broken {
            return Err(BarrierError::Broken);
        }

        let my_generation = state.generation;
        state.arrived += 1;

        if state.arrived == self.participants {
            // reset counter and advance generation -> releases everybody else
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            drop(state);
            self.cvar.notify_all();
            tracing::debug!(
                generation = my_generation,
                participants = self.participants,
                "barrier tripped"
            );
            return Ok(BarrierWaitResult {
                generation: my_generation,
                is_leader: true,
            });
        }

        // Loop to guard against spurious wakeups.
        loop {
            if state.generation != my_generation {
                return Ok(BarrierWaitResult {
                    generation: my_generation,
                    is_leader: false,
                });
            }
            if state.broken {
                return Err(BarrierError::Broken);
            }

            state = match deadline {
                None => self.cvar.wait(state).map_err(|_| BarrierError::Poisoned)?,
                Some((timeout, deadline)) => {
                    let now = Instant::now();
                    if now >= deadline {
                        Self::mark_broken(&mut state);
                        drop(state);
                        self.cvar.notify_all();
                        tracing::warn!(
                            ?timeout,
                            generation = my_generation,
                            "barrier wait timed out, barrier is now broken"
                        );
                        return Err(BarrierError::TimedOut { timeout });
                    }
                    self.cvar
                        .wait_timeout(state, deadline - now)
                        .map_err(|_| BarrierError::Poisoned)?
                        .0
                }
            };
        }
    }
}

/// One enlisted seat of a [`RendezvousBarrier`].
#[derive(Debug)]
pub struct Participant {
    barrier: Arc<RendezvousBarrier>,
}

impl Participant {
    pub fn wait(&self) -> Result<BarrierWaitResult, BarrierError> {
        self.barrier.wait()
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Result<BarrierWaitResult, BarrierError> {
        self.barrier.wait_timeout(timeout)
    }

    #[must_use]
    pub const fn barrier(&self) -> &Arc<RendezvousBarrier> {
        &self.barrier
    }
}

impl Drop for Participant {
    fn drop(&mut self) {
        if let Ok(mut state) = self.barrier.lock() {
            state.enlisted -= 1;
        }
    }
}

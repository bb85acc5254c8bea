//! Fixed-window permit pool.
//!
//! All state lives behind one mutex: the permit counter, the FIFO queue of
//! parked callers, the window counter and the closed flag. Acquiring and the
//! timer-driven reset both run their check-and-mutate step under that lock.
//!
//! Capacity only comes back through the replenish tick, which resets the
//! counter to the ceiling once per period. Finishing a submission (successfully
//! or not) never returns a permit.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigError, GateConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("Admission wait cancelled")]
    Cancelled,
    #[error("Admission wait timed out")]
    TimedOut,
    #[error("Permit pool shut down")]
    ShutDown,
}

/// A granted permit.
///
/// Holding or dropping it has no effect on the pool; the permit is spent for
/// the window it was granted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "an admission means a submission may start now"]
pub struct Admission {
    window: u64,
}

impl Admission {
    /// Window the permit was granted in. Window 0 is the one opened at
    /// construction, each replenish tick opens the next.
    pub fn window(&self) -> u64 {
        self.window
    }
}

/// Point-in-time view of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub available: usize,
    pub limit: usize,
    pub waiting: usize,
    pub window: u64,
    pub shut_down: bool,
}

struct Waiter {
    ticket: u64,
    grant: oneshot::Sender<u64>,
}

struct PoolState {
    available: usize,
    waiters: VecDeque<Waiter>,
    next_ticket: u64,
    window: u64,
    closed: bool,
}

impl PoolState {
    /// Hand free permits to parked callers, oldest first.
    fn grant_waiters(&mut self) -> usize {
        let mut granted = 0;
        while self.available > 0 {
            let Some(waiter) = self.waiters.pop_front() else {
                break;
            };
            if waiter.grant.send(self.window).is_ok() {
                self.available -= 1;
                granted += 1;
            } else {
                tracing::debug!(ticket = waiter.ticket, "Skipping abandoned waiter");
            }
        }
        granted
    }
}

struct Shared {
    state: Mutex<PoolState>,
    limit: usize,
    period: Duration,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("Permit pool mutex poisoned - recovering state");
                poisoned.into_inner()
            }
        }
    }

    /// Reset to the ceiling and open a new window.
    fn replenish(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        let restored = self.limit - state.available;
        state.available = self.limit;
        state.window += 1;
        let granted = state.grant_waiters();
        tracing::debug!(
            window = state.window,
            restored,
            granted,
            waiting = state.waiters.len(),
            "Permit pool replenished"
        );
    }
}

/// Admission gate: at most `limit` acquisitions per `period`, granted in
/// arrival order.
pub struct PermitPool {
    shared: Arc<Shared>,
    shutdown: CancellationToken,
}

impl PermitPool {
    /// Create a full pool and start its replenish task.
    ///
    /// Fails with [`ConfigError::NoRuntime`] outside a tokio runtime. The pool
    /// starts with all `limit` permits, which stands in for the tick at t=0;
    /// the first reset happens one period later.
    pub fn new(config: &GateConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;

        let shared = Arc::new(Shared {
            state: Mutex::new(PoolState {
                available: config.limit,
                waiters: VecDeque::new(),
                next_ticket: 0,
                window: 0,
                closed: false,
            }),
            limit: config.limit,
            period: config.period,
        });
        let shutdown = CancellationToken::new();
        runtime.spawn(run_replenisher(Arc::clone(&shared), shutdown.clone()));

        tracing::debug!(
            limit = config.limit,
            period_ms = config.period.as_millis() as u64,
            "Permit pool started"
        );

        Ok(Self { shared, shutdown })
    }

    pub fn limit(&self) -> usize {
        self.shared.limit
    }

    pub fn period(&self) -> Duration {
        self.shared.period
    }

    pub fn available(&self) -> usize {
        self.shared.lock().available
    }

    /// Number of callers parked in `acquire`.
    pub fn waiting(&self) -> usize {
        self.shared.lock().waiters.len()
    }

    pub fn window(&self) -> u64 {
        self.shared.lock().window
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.lock().closed
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let state = self.shared.lock();
        PoolSnapshot {
            available: state.available,
            limit: self.shared.limit,
            waiting: state.waiters.len(),
            window: state.window,
            shut_down: state.closed,
        }
    }

    /// Take a permit if one is free and nobody is queued ahead.
    pub fn try_acquire(&self) -> Option<Admission> {
        let mut state = self.shared.lock();
        if state.available > 0 && state.waiters.is_empty() {
            state.available -= 1;
            Some(Admission {
                window: state.window,
            })
        } else {
            None
        }
    }

    /// Wait for a permit.
    ///
    /// Cancel-safe: dropping the future before it resolves leaves the pool as
    /// if this call never happened.
    pub async fn acquire(&self) -> Result<Admission, GateError> {
        let (ticket, rx) = {
            let mut state = self.shared.lock();
            if state.available > 0 && state.waiters.is_empty() {
                state.available -= 1;
                return Ok(Admission {
                    window: state.window,
                });
            }
            if state.closed {
                return Err(GateError::ShutDown);
            }

            let (tx, rx) = oneshot::channel();
            let ticket = state.next_ticket;
            state.next_ticket += 1;
            state.waiters.push_back(Waiter { ticket, grant: tx });
            tracing::trace!(ticket, waiting = state.waiters.len(), "Waiting for permit");
            (ticket, rx)
        };

        let mut wait = PendingWait {
            shared: &self.shared,
            ticket,
            rx,
            finished: false,
        };
        loop {
            let result = (&mut wait.rx).await;

            let rx = {
                let mut state = self.shared.lock();
                let window = match result {
                    Ok(window) => window,
                    Err(_) => {
                        wait.finished = true;
                        return Err(GateError::ShutDown);
                    }
                };
                if window == state.window {
                    wait.finished = true;
                    return Ok(Admission { window });
                }

                // The grant expired with its window before this caller saw it.
                // It was first in line, so it takes a current permit if one is
                // free, or goes back to the head of the queue.
                if state.closed {
                    wait.finished = true;
                    return Err(GateError::ShutDown);
                }
                if state.available > 0 {
                    state.available -= 1;
                    wait.finished = true;
                    return Ok(Admission {
                        window: state.window,
                    });
                }

                let (tx, rx) = oneshot::channel();
                state.waiters.push_front(Waiter {
                    ticket: wait.ticket,
                    grant: tx,
                });
                tracing::debug!(
                    ticket = wait.ticket,
                    expired = window,
                    window = state.window,
                    "Stale grant, waiting again"
                );
                rx
            };
            wait.rx = rx;
        }
    }

    /// [`acquire`](Self::acquire), abandoned when `token` fires.
    ///
    /// An already-cancelled token never takes a permit.
    pub async fn acquire_with_cancel(
        &self,
        token: &CancellationToken,
    ) -> Result<Admission, GateError> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(GateError::Cancelled),
            result = self.acquire() => result,
        }
    }

    /// [`acquire`](Self::acquire), abandoned after `timeout`.
    pub async fn acquire_timeout(&self, timeout: Duration) -> Result<Admission, GateError> {
        match tokio::time::timeout(timeout, self.acquire()).await {
            Ok(result) => result,
            Err(_) => Err(GateError::TimedOut),
        }
    }

    /// Stop replenishing and release every parked caller with
    /// [`GateError::ShutDown`].
    ///
    /// Permits left in the current window can still be taken; once they are
    /// gone, `acquire` fails instead of waiting. Calling this again is a no-op.
    pub fn shutdown(&self) {
        let released = {
            let mut state = self.shared.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            std::mem::take(&mut state.waiters)
        };
        self.shutdown.cancel();

        // Dropping the senders wakes each waiter with a closed channel.
        let released_count = released.len();
        drop(released);

        tracing::info!(released = released_count, "Permit pool shut down");
    }
}

impl Drop for PermitPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A caller parked in the queue. Dropping it unfinished removes the caller.
struct PendingWait<'a> {
    shared: &'a Shared,
    ticket: u64,
    rx: oneshot::Receiver<u64>,
    finished: bool,
}

impl Drop for PendingWait<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let mut state = self.shared.lock();
        if let Some(pos) = state.waiters.iter().position(|w| w.ticket == self.ticket) {
            state.waiters.remove(pos);
            tracing::debug!(ticket = self.ticket, "Permit wait abandoned");
            return;
        }

        // Granted, but the caller left before seeing it. A grant from the
        // current window goes to the next caller in line; an older one has
        // already expired with its window.
        if let Ok(window) = self.rx.try_recv()
            && window == state.window
            && !state.closed
        {
            state.available += 1;
            state.grant_waiters();
            tracing::debug!(
                ticket = self.ticket,
                window,
                "Unclaimed permit handed back"
            );
        }
    }
}

async fn run_replenisher(shared: Arc<Shared>, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + shared.period, shared.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => shared.replenish(),
        }
    }

    tracing::debug!("Permit replenisher stopped");
}

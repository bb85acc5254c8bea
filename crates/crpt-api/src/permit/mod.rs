//! Admission gate for outgoing submissions.
//!
//! A [`PermitPool`] hands out at most `limit` permits per fixed window of
//! `period`. Callers that find the pool empty park in arrival order and are
//! served, oldest first, when the next window opens.
//!
//! - Permits are never returned early: a window's capacity is reset by the
//!   timer only.
//! - Abandoning a wait (dropped future, cancellation token, timeout) removes
//!   the caller from the queue without touching the counter.
//! - `shutdown` stops the timer and fails every parked caller.

mod pool;

pub use pool::{Admission, GateError, PermitPool, PoolSnapshot};

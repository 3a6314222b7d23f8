//! Retry/poll protocol for asynchronous controller operations.
//!
//! Deploy, revert, delete and commit-check are queued by the controller and
//! complete later. Every one of them goes through [`run`]:
//!
//! 1. The initial (state-changing) request is sent. `202` means the task was
//!    queued, `409` means another task holds the blueprint and the request is
//!    retried after [`PollPolicy::initial_delay`], any other `2xx` finishes the
//!    operation on the spot, anything else is a terminal failure.
//! 2. Once accepted, a read-only poll request is sent up to
//!    [`PollPolicy::poll_attempts`] times. What counts as "done" depends on the
//!    operation's [`Completion`] signal.
//!
//! The initial request is sent again only while the controller answers `409`,
//! i.e. before anything was accepted, so a queued task is never submitted twice.

use crate::error::{Error, Result};
use crate::transport::Response;
use std::thread;
use std::time::Duration;

/// Budgets and delays for [`run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Attempts for the initial request while it conflicts.
    pub initial_attempts: u32,
    /// Delay between conflicting initial attempts.
    pub initial_delay: Duration,
    /// Poll requests after acceptance.
    pub poll_attempts: u32,
    /// Delay before each poll request.
    pub poll_delay: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_attempts: 3,
            initial_delay: Duration::from_secs(5),
            poll_attempts: 10,
            poll_delay: Duration::from_secs(3),
        }
    }
}

impl PollPolicy {
    /// Default budgets without any waiting, for tests.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            poll_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// How a status code is read by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// `202`: queued, or still/now complete while polling.
    Accepted,
    /// `409`: another operation is in progress.
    Conflict,
    /// Any other `2xx`.
    Success,
    /// `404`: the resource is gone.
    Gone,
    /// Anything else.
    Failure,
}

impl StatusClass {
    /// Classify an HTTP status code.
    #[must_use]
    pub fn of(status: u16) -> Self {
        match status {
            202 => Self::Accepted,
            409 => Self::Conflict,
            404 => Self::Gone,
            200..=299 => Self::Success,
            _ => Self::Failure,
        }
    }
}

/// How an accepted operation reports completion while polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// A `202` or other `2xx` poll answer means done.
    Accepted,
    /// The resource disappearing (`404`) means done.
    Gone,
}

/// How an operation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The initial request finished the operation.
    Immediate,
    /// The operation completed after this many polls.
    Completed {
        /// Poll requests sent.
        polls: u32,
    },
}

/// Callback for protocol progress notifications.
pub trait PollCallback {
    /// Called when the initial request conflicted and will be retried.
    fn on_conflict(&self, operation: &str, attempt: u32, max_attempts: u32, delay: Duration);

    /// Called when a poll did not yet report completion.
    fn on_pending(&self, operation: &str, poll: u32, max_polls: u32, status: u16);
}

/// No-op callback.
pub struct NoCallback;

impl PollCallback for NoCallback {
    fn on_conflict(&self, _: &str, _: u32, _: u32, _: Duration) {}
    fn on_pending(&self, _: &str, _: u32, _: u32, _: u16) {}
}

/// Callback that reports progress through the `log` facade.
pub struct LogCallback;

impl PollCallback for LogCallback {
    fn on_conflict(&self, operation: &str, attempt: u32, max_attempts: u32, delay: Duration) {
        log::info!(
            "{operation}: conflicting task in progress (attempt {attempt}/{max_attempts}), retrying in {}s",
            delay.as_secs()
        );
    }

    fn on_pending(&self, operation: &str, poll: u32, max_polls: u32, status: u16) {
        log::debug!("{operation}: not complete yet (poll {poll}/{max_polls}, HTTP {status})");
    }
}

fn terminal(operation: &str, response: &Response) -> Error {
    Error::Terminal {
        operation: operation.to_string(),
        status: response.status,
        body: response.body.to_string(),
    }
}

/// Run an asynchronous controller operation to completion.
///
/// `initial` sends the state-changing request, `poll` the read-only status
/// request. Returns an error on a terminal status or when a budget runs out;
/// an exhausted poll budget is never reported as success.
pub fn run<I, P>(
    policy: &PollPolicy,
    callback: Option<&dyn PollCallback>,
    operation: &str,
    completion: Completion,
    mut initial: I,
    mut poll: P,
) -> Result<PollOutcome>
where
    I: FnMut() -> Result<Response>,
    P: FnMut() -> Result<Response>,
{
    let max_attempts = policy.initial_attempts.max(1);

    for attempt in 1..=max_attempts {
        let response = initial()?;
        match StatusClass::of(response.status) {
            StatusClass::Accepted => {
                log::debug!("{operation}: accepted");
                return poll_until_done(policy, callback, operation, completion, &mut poll);
            }
            StatusClass::Success => return Ok(PollOutcome::Immediate),
            StatusClass::Gone if completion == Completion::Gone => {
                log::debug!("{operation}: resource already gone");
                return Ok(PollOutcome::Immediate);
            }
            StatusClass::Conflict => {
                if attempt == max_attempts {
                    break;
                }
                if let Some(cb) = callback {
                    cb.on_conflict(operation, attempt, max_attempts, policy.initial_delay);
                }
                thread::sleep(policy.initial_delay);
            }
            StatusClass::Gone | StatusClass::Failure => return Err(terminal(operation, &response)),
        }
    }

    Err(Error::RetryExhausted {
        operation: operation.to_string(),
        attempts: max_attempts,
    })
}

fn poll_until_done<P>(
    policy: &PollPolicy,
    callback: Option<&dyn PollCallback>,
    operation: &str,
    completion: Completion,
    poll: &mut P,
) -> Result<PollOutcome>
where
    P: FnMut() -> Result<Response>,
{
    for attempt in 1..=policy.poll_attempts {
        thread::sleep(policy.poll_delay);
        let response = poll()?;

        let done = match (completion, StatusClass::of(response.status)) {
            (Completion::Accepted, StatusClass::Accepted | StatusClass::Success)
            | (Completion::Gone, StatusClass::Gone) => true,
            (_, StatusClass::Conflict)
            | (Completion::Gone, StatusClass::Accepted | StatusClass::Success) => false,
            _ => return Err(terminal(operation, &response)),
        };

        if done {
            log::debug!("{operation}: completed after {attempt} poll(s)");
            return Ok(PollOutcome::Completed { polls: attempt });
        }

        if let Some(cb) = callback {
            cb.on_pending(operation, attempt, policy.poll_attempts, response.status);
        }
    }

    Err(Error::PollExhausted {
        operation: operation.to_string(),
        attempts: policy.poll_attempts,
    })
}

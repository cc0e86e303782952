//! Single-flight token refresh coordination
//!
//! At most one refresh call is ever in flight. Requests that hit an expired
//! token while a cycle is active park on the waiter queue and are all served
//! from that cycle's outcome, so a burst of 401s never becomes a refresh
//! storm.

use std::sync::Mutex;

use tokio::sync::oneshot;

/// Outcome of a refresh cycle, delivered to every queued waiter
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// Refresh succeeded; carries the new token when the response had one
    Refreshed(Option<String>),
    /// Refresh failed; every waiter fails identically with this message
    Failed(String),
}

/// Where a request stands after asking for a refresh
pub enum RefreshTicket {
    /// Caller claimed the cycle and must perform the refresh call itself
    Leader,
    /// A refresh is already in flight; await the shared outcome
    Follower(oneshot::Receiver<RefreshOutcome>),
}

enum State {
    Idle,
    Refreshing {
        waiters: Vec<oneshot::Sender<RefreshOutcome>>,
    },
}

/// Explicit refresh state: idle, or refreshing with an owned waiter queue.
///
/// The queue is non-empty only while refreshing and is drained exactly once
/// per cycle, in arrival order.
pub struct RefreshCoordinator {
    state: Mutex<State>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::Idle),
        }
    }

    /// Claim the refresh cycle, or join the one in flight.
    ///
    /// The check and the Idle -> Refreshing transition happen inside a single
    /// critical section, so two racing callers can never both lead.
    pub fn begin(&self) -> RefreshTicket {
        let mut state = self.state.lock().unwrap();
        match &mut *state {
            State::Idle => {
                *state = State::Refreshing { waiters: Vec::new() };
                RefreshTicket::Leader
            }
            State::Refreshing { waiters } => {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                RefreshTicket::Follower(rx)
            }
        }
    }

    /// End the active cycle, draining every waiter with the outcome and
    /// returning to idle.
    pub fn finish(&self, outcome: RefreshOutcome) {
        let waiters = {
            let mut state = self.state.lock().unwrap();
            match std::mem::replace(&mut *state, State::Idle) {
                State::Refreshing { waiters } => waiters,
                State::Idle => Vec::new(),
            }
        };

        for waiter in waiters {
            // A waiter may have been dropped if its request was cancelled
            let _ = waiter.send(outcome.clone());
        }
    }

    /// True while a refresh cycle is active
    pub fn is_refreshing(&self) -> bool {
        matches!(&*self.state.lock().unwrap(), State::Refreshing { .. })
    }
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

//! Viewer-side connection state machine.
//!
//! ```text
//! Disconnected --Connect--> Connecting --Opened--> Connected
//!                              |                       |
//!                          OpenFailed               Closed
//!                              v                       v
//!                         Reconnecting <---------------+
//!                              |
//!                         RetryElapsed --> Connecting
//! ```
//!
//! `Disconnect` leads back to `Disconnected` from any state. The machine is
//! pure: it only says which [`Action`] the driver must perform, so it can be
//! exercised without sockets or timers.

use std::time::Duration;

use crate::backoff::{Backoff, ReconnectPolicy};

/// Where the connection currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting {
        /// Consecutive attempts since the last successful open, starting at 1.
        attempt: u32,
    },
    Connected,
    Reconnecting {
        /// Attempt the pending retry will make.
        attempt: u32,
        delay: Duration,
    },
}

/// Something that happened to the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// The user wants to be connected.
    Connect,
    /// The socket opened.
    Opened,
    /// Opening the socket failed.
    OpenFailed,
    /// An open connection ended without being asked to.
    Closed,
    /// The scheduled reconnect delay ran out.
    RetryElapsed,
    /// The user wants to be disconnected.
    Disconnect,
}

/// Side effect the driver must perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    OpenSocket,
    ScheduleReconnect(Duration),
    CancelReconnect,
    CloseSocket,
}

/// Reconnect state plus its backoff sequence.
#[derive(Debug, Clone)]
pub struct ReconnectMachine {
    state: ConnectionState,
    backoff: Backoff,
}

impl ReconnectMachine {
    pub const fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            backoff: Backoff::new(policy),
        }
    }

    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Apply `input` and return the action it requires, if any.
    ///
    /// Inputs that make no sense in the current state are ignored, which is
    /// what keeps at most one reconnect pending at a time.
    pub fn step(&mut self, input: Input) -> Option<Action> {
        use ConnectionState::{Connected, Connecting, Disconnected, Reconnecting};

        let (next, action) = match (self.state, input) {
            (Disconnected, Input::Connect) => {
                self.backoff.reset();
                (Connecting { attempt: 1 }, Some(Action::OpenSocket))
            }
            // A socket that finished opening after the user gave up.
            (Disconnected, Input::Opened) => (Disconnected, Some(Action::CloseSocket)),

            (Connecting { .. }, Input::Opened) => {
                self.backoff.reset();
                (Connected, None)
            }
            (Connecting { attempt }, Input::OpenFailed) => self.schedule(attempt.saturating_add(1)),
            (Connected, Input::Closed) => self.schedule(1),
            (Reconnecting { attempt, .. }, Input::RetryElapsed) => {
                (Connecting { attempt }, Some(Action::OpenSocket))
            }

            (Connecting { .. } | Connected, Input::Disconnect) => {
                (Disconnected, Some(Action::CloseSocket))
            }
            (Reconnecting { .. }, Input::Disconnect) => {
                (Disconnected, Some(Action::CancelReconnect))
            }

            (state, _) => (state, None),
        };

        self.state = next;
        action
    }

    fn schedule(&mut self, attempt: u32) -> (ConnectionState, Option<Action>) {
        let delay = self.backoff.next_delay();
        (
            ConnectionState::Reconnecting { attempt, delay },
            Some(Action::ScheduleReconnect(delay)),
        )
    }
}

impl Default for ReconnectMachine {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}

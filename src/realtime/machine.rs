use std::time::Duration;

/// Fixed-delay reconnect budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub delay: Duration,
    /// Consecutive reconnects allowed without an intervening successful open.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(3),
            max_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The owner called `disconnect` or dropped the client.
    Requested,
    /// The reconnect budget ran out. Terminal.
    RetriesExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    ReconnectWait { attempt: u32 },
    Closed(CloseReason),
}

impl ConnectionState {
    pub fn is_open(self) -> bool {
        self == Self::Open
    }

    pub fn is_closed(self) -> bool {
        matches!(self, Self::Closed(_))
    }
}

/// What the driver must do after the socket went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Reconnect { attempt: u32, after: Duration },
    GiveUp,
    Stop,
}

/// Connection lifecycle without any I/O.
///
/// `Idle → Connecting → Open → ReconnectWait → Connecting → …` until either the
/// owner disconnects or `max_attempts` consecutive closes happen without an
/// open in between. Both end in `Closed`, which absorbs every later event.
#[derive(Debug, Clone)]
pub struct Machine {
    policy: ReconnectPolicy,
    state: ConnectionState,
    attempts: u32,
}

impl Machine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Idle,
            attempts: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Reconnects scheduled since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn on_connecting(&mut self) {
        if !self.state.is_closed() {
            self.state = ConnectionState::Connecting;
        }
    }

    /// A successful open forgives every earlier failure.
    pub fn on_open(&mut self) {
        if !self.state.is_closed() {
            self.state = ConnectionState::Open;
            self.attempts = 0;
        }
    }

    /// The socket closed or could not be opened.
    pub fn on_close(&mut self) -> Action {
        if self.state.is_closed() {
            return Action::Stop;
        }
        if self.attempts < self.policy.max_attempts {
            self.attempts += 1;
            self.state = ConnectionState::ReconnectWait { attempt: self.attempts };
            Action::Reconnect {
                attempt: self.attempts,
                after: self.policy.delay,
            }
        } else {
            self.state = ConnectionState::Closed(CloseReason::RetriesExhausted);
            Action::GiveUp
        }
    }

    /// Intentional close. Only a lost connection is ever retried.
    pub fn disconnect(&mut self) {
        if !self.state.is_closed() {
            self.state = ConnectionState::Closed(CloseReason::Requested);
        }
    }
}

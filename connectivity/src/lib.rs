//! Channel-state tracking for the delivery path.
//!
//! A single connected/disconnected boolean cannot express the window during
//! which a connect or publish is in flight, and conflates "never tried"
//! with "tried and failed". The policy below makes those states explicit
//! and owns the bounded retry counter that drives health signaling.

use std::fmt;

/// Default cap on the consecutive-failure counter.
pub const DEFAULT_RETRY_CAP: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectivityState::Disconnected => write!(f, "disconnected"),
            ConnectivityState::Connecting => write!(f, "connecting"),
            ConnectivityState::Connected => write!(f, "connected"),
        }
    }
}

/// State machine governing delivery attempts.
///
/// Transitions are driven by delivery outcomes, not by polling. The retry
/// counter saturates at the cap; attempts are still permitted past it, the
/// cap only raises the degraded-health signal.
#[derive(Debug, Clone)]
pub struct ConnectivityPolicy {
    state: ConnectivityState,
    retries: u32,
    retry_cap: u32,
}

impl ConnectivityPolicy {
    pub fn new(retry_cap: u32) -> Self {
        Self {
            state: ConnectivityState::Disconnected,
            retries: 0,
            retry_cap,
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// A delivery attempt is starting while the channel is down.
    pub fn begin_attempt(&mut self) {
        if self.state == ConnectivityState::Disconnected {
            self.state = ConnectivityState::Connecting;
        }
    }

    /// The attempt ended with a confirmed delivery.
    pub fn on_success(&mut self) {
        self.state = ConnectivityState::Connected;
        self.retries = 0;
    }

    /// The attempt failed (connect or publish). Also demotes a stale
    /// `Connected` so a transient publish error never leaves the policy
    /// falsely connected.
    pub fn on_failure(&mut self) {
        self.state = ConnectivityState::Disconnected;
        self.retries = (self.retries + 1).min(self.retry_cap);
    }

    /// Asynchronous disconnect notification from the transport, applied at
    /// a cycle boundary. Updates state only; the counter tracks delivery
    /// outcomes exclusively.
    pub fn link_down(&mut self) {
        self.state = ConnectivityState::Disconnected;
    }

    /// True once the consecutive-failure counter has reached the cap.
    pub fn is_degraded(&self) -> bool {
        self.retries >= self.retry_cap
    }
}

impl Default for ConnectivityPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_CAP)
    }
}

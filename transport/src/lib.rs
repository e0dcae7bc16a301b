//! Transport port for record delivery.
//!
//! The pipeline talks to the broker through the [`Transport`] trait so the
//! delivery logic can be driven with a mock in tests. The real adapter
//! wraps a rumqttc client; session/TLS details stay inside it.

use std::fmt;

use futures::future::BoxFuture;

mod mqtt;
pub mod mock;

pub use mqtt::MqttTransport;

#[derive(Debug)]
pub enum TransportError {
    /// Establishing the channel failed.
    Connect(String),
    /// The channel was up but the publish didn't complete.
    Publish(String),
    /// The attempt exceeded its bounded wait.
    Timeout,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Connect(e) => write!(f, "connect failed: {e}"),
            TransportError::Publish(e) => write!(f, "publish failed: {e}"),
            TransportError::Timeout => write!(f, "transport attempt timed out"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Asynchronous connection-state notification. Queued by the adapter while
/// it drives its event loop and drained by the pipeline at cycle
/// boundaries, never applied mid-delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Up,
    Down,
}

/// Channel to the remote endpoint.
pub trait Transport: Send {
    /// (Re)establishes the channel, bounded by the adapter's own timeout.
    fn connect(&mut self) -> BoxFuture<'_, Result<(), TransportError>>;

    /// Publishes one payload with at-least-once semantics.
    fn publish<'a>(
        &'a mut self,
        topic: &'a str,
        payload: &'a [u8],
    ) -> BoxFuture<'a, Result<(), TransportError>>;

    /// Pops the next queued connection-state notification, if any.
    fn poll_link_event(&mut self) -> Option<LinkEvent>;
}

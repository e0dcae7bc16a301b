//! Scriptable transport double for pipeline tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;

use crate::{LinkEvent, Transport, TransportError};

#[derive(Default)]
struct Inner {
    connect_script: VecDeque<Result<(), TransportError>>,
    publish_script: VecDeque<Result<(), TransportError>>,
    link_events: VecDeque<LinkEvent>,
    published: Vec<(String, Vec<u8>)>,
    connect_calls: usize,
    publish_calls: usize,
}

/// Transport whose connect/publish outcomes are scripted ahead of time.
/// Unscripted calls succeed.
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

/// Shared view into a [`MockTransport`] kept by the test after the pipeline
/// takes ownership of the transport itself.
#[derive(Clone)]
pub struct MockHandle {
    inner: Arc<Mutex<Inner>>,
}

impl MockTransport {
    pub fn new() -> (Self, MockHandle) {
        let inner = Arc::new(Mutex::new(Inner::default()));
        (
            Self {
                inner: inner.clone(),
            },
            MockHandle { inner },
        )
    }
}

impl Transport for MockTransport {
    fn connect(&mut self) -> BoxFuture<'_, Result<(), TransportError>> {
        let mut inner = self.inner.lock().unwrap();
        inner.connect_calls += 1;
        let result = inner.connect_script.pop_front().unwrap_or(Ok(()));
        Box::pin(async move { result })
    }

    fn publish<'a>(
        &'a mut self,
        topic: &'a str,
        payload: &'a [u8],
    ) -> BoxFuture<'a, Result<(), TransportError>> {
        let mut inner = self.inner.lock().unwrap();
        inner.publish_calls += 1;
        let result = inner.publish_script.pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            inner.published.push((topic.to_string(), payload.to_vec()));
        }
        Box::pin(async move { result })
    }

    fn poll_link_event(&mut self) -> Option<LinkEvent> {
        self.inner.lock().unwrap().link_events.pop_front()
    }
}

impl MockHandle {
    /// Scripts the next connect attempts to fail.
    pub fn fail_next_connects(&self, count: usize) {
        let mut inner = self.inner.lock().unwrap();
        for _ in 0..count {
            inner
                .connect_script
                .push_back(Err(TransportError::Connect("link down".to_string())));
        }
    }

    /// Scripts the next publishes to succeed (useful ahead of scripted
    /// failures).
    pub fn pass_next_publishes(&self, count: usize) {
        let mut inner = self.inner.lock().unwrap();
        for _ in 0..count {
            inner.publish_script.push_back(Ok(()));
        }
    }

    /// Scripts the next publishes to fail.
    pub fn fail_next_publishes(&self, count: usize) {
        let mut inner = self.inner.lock().unwrap();
        for _ in 0..count {
            inner
                .publish_script
                .push_back(Err(TransportError::Publish("publish refused".to_string())));
        }
    }

    /// Queues an asynchronous link notification.
    pub fn push_link_event(&self, event: LinkEvent) {
        self.inner.lock().unwrap().link_events.push_back(event);
    }

    /// Successfully published (topic, payload) pairs, in order.
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.inner.lock().unwrap().published.clone()
    }

    pub fn connect_calls(&self) -> usize {
        self.inner.lock().unwrap().connect_calls
    }

    pub fn publish_calls(&self) -> usize {
        self.inner.lock().unwrap().publish_calls
    }
}

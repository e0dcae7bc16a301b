use std::sync::Arc;

use tokio::{sync::Notify, time::Instant};

/// Schedules the node's sampling cycles.
///
/// At most one fire instant is pending at a time. The pipeline loop
/// schedules the next cycle only after the current one completes, which is
/// what bounds the node to a single in-flight cycle.
pub struct CycleScheduler {
    pending: Option<Instant>,
    notify: Arc<Notify>,
}

impl CycleScheduler {
    pub fn new() -> Self {
        Self {
            pending: None,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Schedules the next cycle, replacing any pending instant. Instants in
    /// the past fire immediately.
    pub fn schedule(&mut self, at: Instant) {
        self.pending = Some(at);
        self.notify.notify_one(); // wake any waiter
    }

    /// Waits until the pending instant and consumes it. If nothing is
    /// scheduled, suspends until `schedule` is called.
    ///
    /// Cancel-safe: the pending instant is only consumed after the sleep
    /// completes, so a dropped future leaves it scheduled for the next call.
    pub async fn next(&mut self) {
        loop {
            // Create the notified future before checking `pending` so a
            // schedule() racing with this call is never missed.
            let notified = self.notify.notified();

            if let Some(at) = self.pending {
                tokio::time::sleep_until(at).await;
                self.pending = None;
                return;
            }

            notified.await;
        }
    }
}

impl Default for CycleScheduler {
    fn default() -> Self {
        Self::new()
    }
}

//! Top-level sampling loop.

use std::future::Future;
use std::time::Duration;

use log::info;
use tokio::sync::mpsc;
use tokio::time::Instant;
use transport::Transport;

use crate::pipeline::Pipeline;
use crate::scheduler::CycleScheduler;

/// Runs sampling cycles until `shutdown` resolves: one per interval, plus
/// one immediate cycle per manual trigger. Every cycle rebases the periodic
/// cadence from its own completion, and triggers that arrive while a cycle
/// is running are dropped afterwards (the cycle that just ran covers them).
pub async fn run<T, F>(
    mut pipeline: Pipeline<T>,
    interval: Duration,
    mut triggers: mpsc::Receiver<()>,
    shutdown: F,
) where
    T: Transport,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let mut scheduler = CycleScheduler::new();
    scheduler.schedule(Instant::now() + interval);

    loop {
        tokio::select! {
            _ = scheduler.next() => {
                pipeline.run_cycle().await;
                scheduler.schedule(Instant::now() + interval);
                drain_triggers(&mut triggers);
            }
            Some(()) = triggers.recv() => {
                info!("manual sample trigger");
                pipeline.run_cycle().await;
                scheduler.schedule(Instant::now() + interval);
                drain_triggers(&mut triggers);
            }
            _ = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
        }
    }
}

/// Triggers that arrived while the cycle was running are stale; drop them.
fn drain_triggers(rx: &mut mpsc::Receiver<()>) {
    while rx.try_recv().is_ok() {}
}

//! One sampling cycle: sample, encode, route, deliver or cache.

use chrono::Utc;
use connectivity::{ConnectivityPolicy, ConnectivityState};
use identity::DeviceIdentity;
use ledger::{CacheLedger, LedgerError};
use log::{info, warn};
use record::{RecordEncoder, SerializedRecord, TelemetryRecord};
use sensors::Aggregator;
use transport::{LinkEvent, Transport};

use crate::provisioning::PlantMeta;

/// Drives the telemetry pipeline. Owned by the single worker task; nothing
/// here is shared, which keeps every cycle strictly sequential.
pub struct Pipeline<T: Transport> {
    identity: DeviceIdentity,
    meta: PlantMeta,
    aggregator: Aggregator,
    encoder: RecordEncoder,
    ledger: CacheLedger,
    policy: ConnectivityPolicy,
    transport: T,
    topic: String,
}

impl<T: Transport> Pipeline<T> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        identity: DeviceIdentity,
        meta: PlantMeta,
        aggregator: Aggregator,
        encoder: RecordEncoder,
        ledger: CacheLedger,
        policy: ConnectivityPolicy,
        transport: T,
        topic: String,
    ) -> Self {
        Self {
            identity,
            meta,
            aggregator,
            encoder,
            ledger,
            policy,
            transport,
            topic,
        }
    }

    pub fn policy(&self) -> &ConnectivityPolicy {
        &self.policy
    }

    pub fn ledger(&self) -> &CacheLedger {
        &self.ledger
    }

    /// Runs one complete cycle. Never fails: every error is local to this
    /// cycle and must not prevent the next scheduled one.
    pub async fn run_cycle(&mut self) {
        self.apply_link_events();

        let readings = self.aggregator.sample().await;
        let invalid = readings.invalid_channels();
        if !invalid.is_empty() {
            warn!("cycle has {} invalid channel(s): {invalid:?}", invalid.len());
        }

        let record = TelemetryRecord {
            plant_id: self.identity.to_string(),
            plant_name: self.meta.name.clone(),
            plant_variety: self.meta.variety.clone(),
            plant_location: self.meta.location.clone(),
            timestamp_ms: Utc::now().timestamp_millis(),
            readings,
        };

        let payload = match self.encoder.encode(&record) {
            Ok(payload) => payload,
            Err(e) => {
                // A record that cannot be represented is not worth caching
                // either; drop it and keep sampling.
                warn!("dropping record: {e}");
                return;
            }
        };

        if self.deliver(&payload).await {
            self.policy.on_success();
            info!("published record to {}", self.topic);
            self.replay_cached().await;
        } else {
            self.policy.on_failure();
            self.cache(payload.as_bytes());
            if self.policy.is_degraded() {
                warn!(
                    "delivery degraded: {} consecutive failures",
                    self.policy.retries()
                );
            }
        }
    }

    /// Attempts one delivery, (re)establishing the channel first when it is
    /// down. Returns whether the publish was confirmed.
    async fn deliver(&mut self, payload: &SerializedRecord) -> bool {
        if self.policy.state() != ConnectivityState::Connected {
            self.policy.begin_attempt();
            if let Err(e) = self.transport.connect().await {
                warn!("connect failed: {e}");
                return false;
            }
        }

        match self.transport.publish(&self.topic, payload.as_bytes()).await {
            Ok(()) => true,
            Err(e) => {
                warn!("publish failed: {e}");
                false
            }
        }
    }

    /// Replays cached records oldest-first after a successful delivery,
    /// compacting the ledger past the last confirmed entry. Stops at the
    /// first failure; the remainder stays cached for the next reconnect.
    async fn replay_cached(&mut self) {
        let entries = match self.ledger.drain() {
            Ok(entries) => entries,
            Err(e) => {
                warn!("cannot read cache for replay: {e}");
                return;
            }
        };

        let mut delivered = None;
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("cache entry unreadable, stopping replay: {e}");
                    break;
                }
            };

            match self.transport.publish(&self.topic, &entry.payload).await {
                Ok(()) => delivered = Some(entry.position),
                Err(e) => {
                    warn!("replay stopped at position {}: {e}", entry.position);
                    self.policy.on_failure();
                    break;
                }
            }
        }

        if let Some(position) = delivered {
            match self.ledger.remove_up_to(position) {
                Ok(()) => info!("replayed {} cached record(s)", position + 1),
                Err(e) => warn!("failed to compact cache after replay: {e}"),
            }
        }
    }

    fn cache(&mut self, payload: &[u8]) {
        match self.ledger.append(payload) {
            Ok(()) => info!("cached record locally"),
            Err(e @ LedgerError::CacheFull { .. }) => {
                // Local storage exhaustion must never halt sampling.
                warn!("dropping record: {e}");
            }
            Err(e) => warn!("cache append failed, record lost: {e}"),
        }
    }

    /// Applies queued link notifications. Called only at cycle boundaries so
    /// a notification never races an in-flight delivery.
    fn apply_link_events(&mut self) {
        while let Some(event) = self.transport.poll_link_event() {
            match event {
                LinkEvent::Down => {
                    info!("link down notification, demoting channel state");
                    self.policy.link_down();
                }
                // A live link is only trusted once a delivery succeeds.
                LinkEvent::Up => {}
            }
        }
    }
}

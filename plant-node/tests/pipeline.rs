//! End-to-end cycle scenarios driven with mock sensors and a scripted
//! transport.

use std::time::Duration;

use connectivity::{ConnectivityPolicy, ConnectivityState};
use identity::{IdentityStore, MemoryKvStore};
use ledger::CacheLedger;
use record::RecordEncoder;
use sensors::sim::{FailingChannel, FixedChannel, HangingChannel};
use sensors::{Aggregator, ChannelId, SensorBank};
use tokio::sync::{mpsc, oneshot};
use transport::mock::{MockHandle, MockTransport};
use transport::LinkEvent;

use plant_node::pipeline::Pipeline;
use plant_node::provisioning::PlantMeta;
use plant_node::runner;

const TOPIC_PREFIX: &str = "/devices/plants/";

fn healthy_bank() -> SensorBank {
    SensorBank {
        temperature: Box::new(FixedChannel::new(ChannelId::Temperature, 22.5)),
        humidity: Box::new(FixedChannel::new(ChannelId::Humidity, 51.0)),
        soil_moisture: Box::new(FixedChannel::new(ChannelId::SoilMoisture, 38.2)),
        light_level: Box::new(FixedChannel::new(ChannelId::LightLevel, 64.0)),
        battery_level: Box::new(FixedChannel::new(ChannelId::BatteryLevel, 88.0)),
    }
}

fn temp_cache_path() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("pipeline-test-{}.log", uuid::Uuid::new_v4()))
}

struct Setup {
    pipeline: Pipeline<MockTransport>,
    handle: MockHandle,
    topic: String,
}

fn setup(bank: SensorBank, max_payload: usize, cache_max_bytes: u64) -> Setup {
    let identity = IdentityStore::new(MemoryKvStore::new()).get_or_create();
    let topic = format!("{TOPIC_PREFIX}{identity}");
    let meta = PlantMeta {
        name: "basil".to_string(),
        variety: "genovese".to_string(),
        location: "kitchen window".to_string(),
    };
    let (transport, handle) = MockTransport::new();

    let pipeline = Pipeline::new(
        identity,
        meta,
        Aggregator::new(bank, Duration::from_millis(100)),
        RecordEncoder::new(max_payload),
        CacheLedger::open(temp_cache_path(), cache_max_bytes),
        ConnectivityPolicy::new(3),
        transport,
        topic.clone(),
    );

    Setup {
        pipeline,
        handle,
        topic,
    }
}

fn cleanup(setup: &Setup) {
    std::fs::remove_file(setup.pipeline.ledger().path()).ok();
}

#[tokio::test]
async fn healthy_sensors_connected_transport_delivers_once() {
    let mut s = setup(healthy_bank(), 512, 65536);

    s.pipeline.run_cycle().await;

    let published = s.handle.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, s.topic);

    let decoded = RecordEncoder::decode(&published[0].1).unwrap();
    assert!(decoded.invalid.is_empty());
    assert_eq!(decoded.plant_name, "basil");
    assert!((decoded.temperature - 22.5).abs() < 0.005);
    assert!((decoded.battery_level - 88.0).abs() < 0.005);

    assert!(s.pipeline.ledger().is_empty().unwrap());
    assert_eq!(s.pipeline.policy().state(), ConnectivityState::Connected);
    assert_eq!(s.pipeline.policy().retries(), 0);

    cleanup(&s);
}

#[tokio::test]
async fn disconnected_cycles_cache_records_and_cap_retry_counter() {
    let mut s = setup(healthy_bank(), 512, 65536);
    s.handle.fail_next_connects(4);

    for _ in 0..3 {
        s.pipeline.run_cycle().await;
    }

    assert_eq!(s.handle.published().len(), 0);
    assert_eq!(s.pipeline.ledger().len().unwrap(), 3);
    assert_eq!(s.pipeline.policy().retries(), 3);
    assert!(s.pipeline.policy().is_degraded());

    // A fourth failure stays at the cap and still caches the record.
    s.pipeline.run_cycle().await;
    assert_eq!(s.pipeline.policy().retries(), 3);
    assert_eq!(s.pipeline.ledger().len().unwrap(), 4);

    cleanup(&s);
}

#[tokio::test]
async fn failing_battery_sensor_still_delivers_flagged_record() {
    let mut bank = healthy_bank();
    bank.battery_level = Box::new(FailingChannel::new(ChannelId::BatteryLevel));
    let mut s = setup(bank, 512, 65536);

    s.pipeline.run_cycle().await;

    let published = s.handle.published();
    assert_eq!(published.len(), 1);

    let decoded = RecordEncoder::decode(&published[0].1).unwrap();
    assert_eq!(decoded.invalid, vec!["batteryLevel".to_string()]);
    assert_eq!(decoded.battery_level, 0.0);
    assert!((decoded.temperature - 22.5).abs() < 0.005);

    assert!(s.pipeline.ledger().is_empty().unwrap());

    cleanup(&s);
}

#[tokio::test]
async fn cached_records_replay_in_order_after_reconnect() {
    let mut s = setup(healthy_bank(), 512, 65536);

    // Two offline cycles fill the cache.
    s.handle.fail_next_connects(2);
    s.pipeline.run_cycle().await;
    s.pipeline.run_cycle().await;
    assert_eq!(s.pipeline.ledger().len().unwrap(), 2);

    let cached: Vec<Vec<u8>> = s
        .pipeline
        .ledger()
        .drain()
        .unwrap()
        .map(|e| e.unwrap().payload)
        .collect();

    // Connectivity returns: the live record goes out first, then the
    // cached ones oldest-first, and the ledger is compacted.
    s.pipeline.run_cycle().await;

    let published = s.handle.published();
    assert_eq!(published.len(), 3);
    assert_eq!(published[1].1, cached[0]);
    assert_eq!(published[2].1, cached[1]);

    assert!(s.pipeline.ledger().is_empty().unwrap());
    assert_eq!(s.pipeline.policy().retries(), 0);
    assert_eq!(s.pipeline.policy().state(), ConnectivityState::Connected);

    cleanup(&s);
}

#[tokio::test]
async fn replay_failure_keeps_remaining_entries_cached() {
    let mut s = setup(healthy_bank(), 512, 65536);

    s.handle.fail_next_connects(2);
    s.pipeline.run_cycle().await;
    s.pipeline.run_cycle().await;

    // Publish order in the next cycle: live record, then the two cached
    // entries. Let the first two through and fail the last.
    s.handle.pass_next_publishes(2);
    s.handle.fail_next_publishes(1);

    s.pipeline.run_cycle().await;

    // Live + first cached entry made it out; the second stays cached.
    assert_eq!(s.handle.published().len(), 2);
    assert_eq!(s.pipeline.ledger().len().unwrap(), 1);

    cleanup(&s);
}

#[tokio::test]
async fn link_down_notification_forces_reconnect_next_cycle() {
    let mut s = setup(healthy_bank(), 512, 65536);

    s.pipeline.run_cycle().await;
    assert_eq!(s.pipeline.policy().state(), ConnectivityState::Connected);
    assert_eq!(s.handle.connect_calls(), 1);

    // Broker drops the session while the node idles between cycles.
    s.handle.push_link_event(LinkEvent::Down);

    s.pipeline.run_cycle().await;
    assert_eq!(s.handle.connect_calls(), 2);
    assert_eq!(s.pipeline.policy().state(), ConnectivityState::Connected);

    cleanup(&s);
}

#[tokio::test]
async fn full_cache_drops_record_without_halting() {
    // Capacity fits roughly one encoded record.
    let mut s = setup(healthy_bank(), 512, 300);
    s.handle.fail_next_connects(3);

    s.pipeline.run_cycle().await;
    assert_eq!(s.pipeline.ledger().len().unwrap(), 1);

    // Second offline cycle overflows the cache; the record is dropped but
    // the cycle still completes and the counter still advances.
    s.pipeline.run_cycle().await;
    assert_eq!(s.pipeline.ledger().len().unwrap(), 1);
    assert_eq!(s.pipeline.policy().retries(), 2);

    cleanup(&s);
}

#[tokio::test(start_paused = true)]
async fn mid_cycle_triggers_coalesce_and_rebase_the_cadence() {
    let mut bank = healthy_bank();
    // Sampling stalls on this channel until the 100ms read timeout, giving
    // each cycle a measurable duration under the paused clock.
    bank.temperature = Box::new(HangingChannel::new(ChannelId::Temperature));
    let s = setup(bank, 512, 65536);
    let cache_path = s.pipeline.ledger().path().to_path_buf();
    let handle = s.handle.clone();

    let (trigger_tx, trigger_rx) = mpsc::channel::<()>(1);
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let worker = tokio::spawn(runner::run(
        s.pipeline,
        Duration::from_millis(300),
        trigger_rx,
        async {
            let _ = stop_rx.await;
        },
    ));

    // t=40ms: manual trigger while the loop idles starts an immediate cycle.
    tokio::time::sleep(Duration::from_millis(40)).await;
    trigger_tx.try_send(()).unwrap();

    // t=50ms: a second trigger lands mid-cycle; the running cycle covers it.
    tokio::time::sleep(Duration::from_millis(10)).await;
    trigger_tx.try_send(()).unwrap();

    // The trigger cycle finishes around t=140ms and rebases the next
    // periodic fire to ~t=440ms. By t=430ms exactly one cycle has run: the
    // coalesced trigger caused no extra one, and the original t=300ms fire
    // was replaced.
    tokio::time::sleep(Duration::from_millis(380)).await;
    assert_eq!(handle.publish_calls(), 1);

    // t=600ms: the rebased periodic cycle has run exactly once more.
    tokio::time::sleep(Duration::from_millis(170)).await;
    assert_eq!(handle.publish_calls(), 2);

    let _ = stop_tx.send(());
    worker.await.unwrap();

    std::fs::remove_file(cache_path).ok();
}

#[tokio::test]
async fn oversized_record_is_dropped_before_delivery() {
    let mut s = setup(healthy_bank(), 10, 65536);

    s.pipeline.run_cycle().await;

    assert_eq!(s.handle.publish_calls(), 0);
    assert_eq!(s.handle.connect_calls(), 0);
    assert!(s.pipeline.ledger().is_empty().unwrap());

    cleanup(&s);
}

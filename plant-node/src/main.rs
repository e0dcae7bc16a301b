use std::path::Path;
use std::time::Duration;

use connectivity::ConnectivityPolicy;
use identity::{FileKvStore, IdentityStore, STORAGE_NAMESPACE};
use ledger::CacheLedger;
use log::{info, warn};
use record::RecordEncoder;
use sensors::{Aggregator, SensorBank};
use tokio::sync::mpsc;
use transport::MqttTransport;

use plant_node::config::Config;
use plant_node::pipeline::Pipeline;
use plant_node::provisioning;
use plant_node::runner;

#[tokio::main]
async fn main() {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::load().expect("failed to load configuration");
    info!("starting plant monitor node");

    let store = FileKvStore::open(Path::new(&config.node.storage_dir).join(STORAGE_NAMESPACE))
        .expect("failed to open settings storage");
    let mut identity_store = IdentityStore::new(store);
    let identity = identity_store.get_or_create();
    info!("device identity: {identity}");

    let provisioned = provisioning::load(identity_store.store(), &config);
    info!(
        "plant '{}' ({}) at '{}', sampling every {:?}",
        provisioned.meta.name,
        provisioned.meta.variety,
        provisioned.meta.location,
        provisioned.interval
    );

    let transport = MqttTransport::new(
        &config.broker.host,
        config.broker.port,
        Duration::from_secs(config.broker.keep_alive),
        Duration::from_secs(config.broker.attempt_timeout),
    );

    let aggregator = Aggregator::new(
        SensorBank::simulated(),
        Duration::from_millis(config.sampling.read_timeout_ms),
    );

    let topic = config.topic(&identity.to_string());
    let pipeline = Pipeline::new(
        identity,
        provisioned.meta.clone(),
        aggregator,
        RecordEncoder::new(config.delivery.max_payload),
        CacheLedger::open(&config.cache.path, config.cache.max_bytes),
        ConnectivityPolicy::new(config.delivery.retry_cap),
        transport,
        topic,
    );

    // Manual sample trigger (button surrogate). Capacity 1 so triggers
    // arriving while a cycle runs coalesce into a single extra cycle.
    let (trigger_tx, trigger_rx) = mpsc::channel::<()>(1);
    spawn_trigger_listener(trigger_tx);

    runner::run(pipeline, provisioned.interval, trigger_rx, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await;
}

#[cfg(unix)]
fn spawn_trigger_listener(tx: mpsc::Sender<()>) {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::user_defined1()) {
        Ok(mut usr1) => {
            tokio::spawn(async move {
                while usr1.recv().await.is_some() {
                    let _ = tx.try_send(());
                }
            });
        }
        Err(e) => warn!("manual trigger unavailable: {e}"),
    }
}

#[cfg(not(unix))]
fn spawn_trigger_listener(_tx: mpsc::Sender<()>) {}

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NodeConfig {
    /// Directory the persistent key-value namespace lives under.
    pub storage_dir: String,
    /// Defaults for metadata the provisioning channel may override.
    pub plant_name: String,
    pub plant_variety: String,
    pub plant_location: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    /// MQTT keep-alive, seconds.
    pub keep_alive: u64,
    /// Per-attempt bound for connect and publish-ack waits, seconds.
    pub attempt_timeout: u64,
    pub topic_prefix: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SamplingConfig {
    pub interval_secs: u64,
    pub read_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    pub path: String,
    pub max_bytes: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DeliveryConfig {
    pub max_payload: usize,
    pub retry_cap: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub node: NodeConfig,
    pub broker: BrokerConfig,
    pub sampling: SamplingConfig,
    pub cache: CacheConfig,
    pub delivery: DeliveryConfig,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();

        let settings = config::Config::builder()
            .set_default("node.storage_dir", "storage")?
            .set_default("node.plant_name", "unnamed plant")?
            .set_default("node.plant_variety", "unknown")?
            .set_default("node.plant_location", "unknown")?
            .set_default("broker.host", "localhost")?
            .set_default("broker.port", 1883)?
            .set_default("broker.keep_alive", 5)?
            .set_default("broker.attempt_timeout", 10)?
            .set_default("broker.topic_prefix", "/devices/plants/")?
            .set_default("sampling.interval_secs", 60)?
            .set_default("sampling.read_timeout_ms", 1000)?
            .set_default("cache.path", "storage/telemetry_cache.log")?
            .set_default("cache.max_bytes", 65536)?
            .set_default("delivery.max_payload", 512)?
            .set_default("delivery.retry_cap", 3)?
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("PLANT")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Publish topic for this node.
    pub fn topic(&self, plant_id: &str) -> String {
        format!("{}{}", self.broker.topic_prefix, plant_id)
    }
}

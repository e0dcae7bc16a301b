//! Reads provisioned metadata out of the persistent key-value store.
//!
//! The provisioning channel (out of scope here) writes these keys before
//! the first delivery attempt; the pipeline only ever reads them and falls
//! back to configured defaults when a key is absent or unreadable.

use std::time::Duration;

use identity::KvStore;
use log::warn;

use crate::config::Config;

pub const KEY_PLANT_NAME: &str = "plant_name";
pub const KEY_PLANT_VARIETY: &str = "plant_variety";
pub const KEY_PLANT_LOCATION: &str = "plant_location";
/// Sampling interval override, seconds, stored as a decimal string.
pub const KEY_POLLING_INTERVAL: &str = "polling_interval";

/// Metadata published with every record.
#[derive(Debug, Clone)]
pub struct PlantMeta {
    pub name: String,
    pub variety: String,
    pub location: String,
}

#[derive(Debug, Clone)]
pub struct Provisioned {
    pub meta: PlantMeta,
    pub interval: Duration,
}

pub fn load(store: &impl KvStore, config: &Config) -> Provisioned {
    let meta = PlantMeta {
        name: read_string(store, KEY_PLANT_NAME, &config.node.plant_name),
        variety: read_string(store, KEY_PLANT_VARIETY, &config.node.plant_variety),
        location: read_string(store, KEY_PLANT_LOCATION, &config.node.plant_location),
    };

    let default_secs = config.sampling.interval_secs;
    let secs = match store.get(KEY_POLLING_INTERVAL) {
        Ok(Some(bytes)) => match String::from_utf8(bytes)
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
        {
            Some(secs) if secs > 0 => secs,
            _ => {
                warn!("provisioned {KEY_POLLING_INTERVAL} is not a positive integer, using default");
                default_secs
            }
        },
        Ok(None) => default_secs,
        Err(e) => {
            warn!("failed to read provisioned {KEY_POLLING_INTERVAL}: {e}");
            default_secs
        }
    };

    Provisioned {
        meta,
        interval: Duration::from_secs(secs),
    }
}

fn read_string(store: &impl KvStore, key: &str, fallback: &str) -> String {
    match store.get(key) {
        Ok(Some(bytes)) => match String::from_utf8(bytes) {
            Ok(s) => s.trim().to_string(),
            Err(_) => {
                warn!("provisioned {key} is not UTF-8, using default");
                fallback.to_string()
            }
        },
        Ok(None) => fallback.to_string(),
        Err(e) => {
            warn!("failed to read provisioned {key}: {e}");
            fallback.to_string()
        }
    }
}

//! Persistent device identity.
//!
//! Every node carries a single RFC-4122 v4 UUID that is generated on first
//! boot and reloaded from the key-value store on every boot after that.

use std::fmt;

use log::{error, info};
use uuid::Uuid;

mod store;

pub use store::{FileKvStore, KvStore, MemoryKvStore};

/// Namespace directory the node's settings live under.
pub const STORAGE_NAMESPACE: &str = "plant_monitor";

/// Storage key the device UUID is persisted under.
pub const KEY_UUID: &str = "uuid";

/// The node's unique identifier, rendered as the canonical 36-character
/// hyphenated string when displayed or published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity(Uuid);

impl DeviceIdentity {
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Owns the bootstrap of the device UUID.
///
/// The identity is created exactly once: the first call on a store with no
/// persisted value generates and persists it, every later call (including
/// after reboot, i.e. a fresh `IdentityStore` over the same backing store)
/// returns the persisted value unchanged.
pub struct IdentityStore<S: KvStore> {
    store: S,
    cached: Option<DeviceIdentity>,
}

impl<S: KvStore> IdentityStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            cached: None,
        }
    }

    /// Loads the persisted identity, generating and persisting a new one if
    /// none exists yet.
    ///
    /// A failed persist is logged and the in-memory value is still returned
    /// for the current session; the identity is simply regenerated on the
    /// next boot if persistence never succeeded.
    pub fn get_or_create(&mut self) -> DeviceIdentity {
        if let Some(identity) = &self.cached {
            return identity.clone();
        }

        let identity = match self.load_persisted() {
            Some(identity) => identity,
            None => {
                let identity = DeviceIdentity(Uuid::new_v4());
                let rendered = identity.to_string();
                match self.store.set(KEY_UUID, rendered.as_bytes()) {
                    Ok(()) => info!("generated and stored device UUID: {rendered}"),
                    Err(e) => error!("failed to persist device UUID: {e}"),
                }
                identity
            }
        };

        self.cached = Some(identity.clone());
        identity
    }

    /// Read access to the backing store, for provisioned keys.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn load_persisted(&self) -> Option<DeviceIdentity> {
        let bytes = match self.store.get(KEY_UUID) {
            Ok(bytes) => bytes?,
            Err(e) => {
                error!("failed to read persisted UUID: {e}");
                return None;
            }
        };

        let text = String::from_utf8(bytes).ok()?;
        match Uuid::parse_str(text.trim()) {
            Ok(uuid) => Some(DeviceIdentity(uuid)),
            Err(e) => {
                // A corrupt value is replaced rather than trusted.
                error!("persisted UUID is malformed ({e}), regenerating");
                None
            }
        }
    }
}

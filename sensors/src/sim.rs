//! Host-side channel implementations.
//!
//! `SimulatedChannel` stands in for the real bus drivers when the node runs
//! off-target; the other channels are deterministic doubles for tests.

use futures::future::BoxFuture;
use rand::Rng;

use crate::channel::{ChannelId, SensorChannel, SensorError};

/// Yields a random value inside a plausible range for its channel.
pub struct SimulatedChannel {
    id: ChannelId,
    min: f32,
    max: f32,
}

impl SimulatedChannel {
    pub fn new(id: ChannelId, min: f32, max: f32) -> Self {
        Self { id, min, max }
    }

    /// Typical indoor-plant ranges per channel.
    pub fn for_channel(id: ChannelId) -> Self {
        let (min, max) = match id {
            ChannelId::Temperature => (15.0, 35.0),
            ChannelId::Humidity => (30.0, 90.0),
            ChannelId::SoilMoisture => (10.0, 80.0),
            ChannelId::LightLevel => (0.0, 100.0),
            ChannelId::BatteryLevel => (20.0, 100.0),
        };
        Self::new(id, min, max)
    }
}

impl SensorChannel for SimulatedChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn read(&mut self) -> BoxFuture<'_, Result<f32, SensorError>> {
        let value = rand::thread_rng().gen_range(self.min..=self.max);
        Box::pin(async move { Ok(value) })
    }
}

/// Always returns the same value.
pub struct FixedChannel {
    id: ChannelId,
    value: f32,
}

impl FixedChannel {
    pub fn new(id: ChannelId, value: f32) -> Self {
        Self { id, value }
    }
}

impl SensorChannel for FixedChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn read(&mut self) -> BoxFuture<'_, Result<f32, SensorError>> {
        let value = self.value;
        Box::pin(async move { Ok(value) })
    }
}

/// Always fails the bus transaction.
pub struct FailingChannel {
    id: ChannelId,
}

impl FailingChannel {
    pub fn new(id: ChannelId) -> Self {
        Self { id }
    }
}

impl SensorChannel for FailingChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn read(&mut self) -> BoxFuture<'_, Result<f32, SensorError>> {
        Box::pin(async move { Err(SensorError::ReadFailed) })
    }
}

/// Never completes; exercises the aggregator's timeout path.
pub struct HangingChannel {
    id: ChannelId,
}

impl HangingChannel {
    pub fn new(id: ChannelId) -> Self {
        Self { id }
    }
}

impl SensorChannel for HangingChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn read(&mut self) -> BoxFuture<'_, Result<f32, SensorError>> {
        Box::pin(futures::future::pending())
    }
}

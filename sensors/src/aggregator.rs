use std::time::Duration;

use log::warn;
use tokio::time::timeout;

use crate::channel::{ChannelId, SensorChannel};
use crate::reading::{ReadingSet, SensorReading};

/// One boxed channel per measurement slot.
pub struct SensorBank {
    pub temperature: Box<dyn SensorChannel>,
    pub humidity: Box<dyn SensorChannel>,
    pub soil_moisture: Box<dyn SensorChannel>,
    pub light_level: Box<dyn SensorChannel>,
    pub battery_level: Box<dyn SensorChannel>,
}

/// Reads every channel once per cycle, tolerating individual failures.
///
/// A failed or timed-out read is replaced by the zero sentinel and flagged
/// invalid; it never aborts the cycle. There are no retries here, the next
/// scheduled cycle is the retry.
pub struct Aggregator {
    bank: SensorBank,
    read_timeout: Duration,
}

impl Aggregator {
    pub fn new(bank: SensorBank, read_timeout: Duration) -> Self {
        Self { bank, read_timeout }
    }

    /// Samples all channels sequentially. Always returns the full arity.
    pub async fn sample(&mut self) -> ReadingSet {
        ReadingSet {
            temperature: Self::read_one(&mut self.bank.temperature, self.read_timeout).await,
            humidity: Self::read_one(&mut self.bank.humidity, self.read_timeout).await,
            soil_moisture: Self::read_one(&mut self.bank.soil_moisture, self.read_timeout).await,
            light_level: Self::read_one(&mut self.bank.light_level, self.read_timeout).await,
            battery_level: Self::read_one(&mut self.bank.battery_level, self.read_timeout).await,
        }
    }

    async fn read_one(channel: &mut Box<dyn SensorChannel>, limit: Duration) -> SensorReading {
        let id = channel.id();

        match timeout(limit, channel.read()).await {
            Ok(Ok(value)) => SensorReading::valid(value),
            Ok(Err(e)) => {
                warn!("{id} read failed: {e}");
                SensorReading::invalid()
            }
            Err(_) => {
                warn!("{id} read timed out after {limit:?}");
                SensorReading::invalid()
            }
        }
    }
}

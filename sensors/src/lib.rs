//! Sensor channels and the per-cycle aggregator.
//!
//! The aggregator reads a fixed set of five channels (temperature, humidity,
//! soil moisture, light level, battery level) sequentially over a shared
//! interconnect, replacing individual failures with a flagged sentinel so a
//! broken sensor never costs a cycle.

mod aggregator;
mod channel;
mod reading;
pub mod sim;

pub use aggregator::{Aggregator, SensorBank};
pub use channel::{ChannelId, SensorChannel, SensorError};
pub use reading::{ReadingSet, SensorReading};

impl SensorBank {
    /// A bank of simulated channels for running off-target.
    pub fn simulated() -> Self {
        use sim::SimulatedChannel;

        Self {
            temperature: Box::new(SimulatedChannel::for_channel(ChannelId::Temperature)),
            humidity: Box::new(SimulatedChannel::for_channel(ChannelId::Humidity)),
            soil_moisture: Box::new(SimulatedChannel::for_channel(ChannelId::SoilMoisture)),
            light_level: Box::new(SimulatedChannel::for_channel(ChannelId::LightLevel)),
            battery_level: Box::new(SimulatedChannel::for_channel(ChannelId::BatteryLevel)),
        }
    }
}

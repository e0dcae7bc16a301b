use std::fmt;

use futures::future::BoxFuture;

/// The fixed set of measurement slots a node samples each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelId {
    Temperature,
    Humidity,
    SoilMoisture,
    LightLevel,
    BatteryLevel,
}

impl ChannelId {
    /// Sampling order within a cycle. Reads are sequential because the
    /// channels share one sensor interconnect.
    pub const ALL: [ChannelId; 5] = [
        ChannelId::Temperature,
        ChannelId::Humidity,
        ChannelId::SoilMoisture,
        ChannelId::LightLevel,
        ChannelId::BatteryLevel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelId::Temperature => "temperature",
            ChannelId::Humidity => "humidity",
            ChannelId::SoilMoisture => "soilMoisture",
            ChannelId::LightLevel => "lightLevel",
            ChannelId::BatteryLevel => "batteryLevel",
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error from a single channel read.
#[derive(Debug)]
pub enum SensorError {
    /// The bus transaction failed.
    ReadFailed,
    /// The sensor answered with bytes that don't decode to a value.
    InvalidData,
    /// The sensor hasn't been initialized yet.
    NotReady,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::ReadFailed => write!(f, "sensor read failed"),
            SensorError::InvalidData => write!(f, "sensor returned invalid data"),
            SensorError::NotReady => write!(f, "sensor not initialized"),
        }
    }
}

impl std::error::Error for SensorError {}

/// Port for one sensor channel.
///
/// Register-level drivers live behind this trait; the aggregator only sees
/// a bounded-latency read that either yields a unit-specific value or fails.
pub trait SensorChannel: Send {
    fn id(&self) -> ChannelId;

    /// Reads one value. The aggregator bounds the wait with its own timeout,
    /// so implementations may block on the bus for as long as they need.
    fn read(&mut self) -> BoxFuture<'_, Result<f32, SensorError>>;
}

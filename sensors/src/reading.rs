use crate::channel::ChannelId;

/// One measurement slot: a value plus its validity flag.
///
/// An invalid reading always carries the zero sentinel, never a
/// partially-formed value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub value: f32,
    pub valid: bool,
}

impl SensorReading {
    pub const SENTINEL: f32 = 0.0;

    pub fn valid(value: f32) -> Self {
        Self { value, valid: true }
    }

    pub fn invalid() -> Self {
        Self {
            value: Self::SENTINEL,
            valid: false,
        }
    }
}

/// The fixed-arity result of one sampling cycle: one reading per channel,
/// failed channels flagged invalid rather than omitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadingSet {
    pub temperature: SensorReading,
    pub humidity: SensorReading,
    pub soil_moisture: SensorReading,
    pub light_level: SensorReading,
    pub battery_level: SensorReading,
}

impl ReadingSet {
    pub fn get(&self, id: ChannelId) -> &SensorReading {
        match id {
            ChannelId::Temperature => &self.temperature,
            ChannelId::Humidity => &self.humidity,
            ChannelId::SoilMoisture => &self.soil_moisture,
            ChannelId::LightLevel => &self.light_level,
            ChannelId::BatteryLevel => &self.battery_level,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChannelId, &SensorReading)> {
        ChannelId::ALL.iter().map(|id| (*id, self.get(*id)))
    }

    pub fn valid_count(&self) -> usize {
        self.iter().filter(|(_, r)| r.valid).count()
    }

    /// Channels whose readings carry the sentinel, in sampling order.
    pub fn invalid_channels(&self) -> Vec<ChannelId> {
        self.iter()
            .filter(|(_, r)| !r.valid)
            .map(|(id, _)| id)
            .collect()
    }
}

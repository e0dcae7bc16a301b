//! Telemetry records and their wire encoding.
//!
//! A record is built once per sampling cycle and encoded to compact JSON
//! with the field names the backend expects. All rounding lives here so the
//! encoding is deterministic: the same record always produces byte-identical
//! output.

use std::fmt;

use sensors::ReadingSet;
use serde::{Deserialize, Serialize};

/// Default upper bound for an encoded record, sized to the fixed transport
/// and cache buffers downstream.
pub const DEFAULT_MAX_PAYLOAD: usize = 512;

/// The unit of delivery: identity, provisioned metadata, timestamp and the
/// fixed reading set. Built fresh each cycle, never mutated afterwards.
#[derive(Debug, Clone)]
pub struct TelemetryRecord {
    pub plant_id: String,
    pub plant_name: String,
    pub plant_variety: String,
    pub plant_location: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    pub readings: ReadingSet,
}

/// An encoded record, immutable once produced and independent of transport
/// framing. Compact JSON, so it never contains a newline and can be stored
/// line-delimited by the delivery ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedRecord(Vec<u8>);

impl SerializedRecord {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug)]
pub enum EncodeError {
    /// The encoded record would exceed the configured payload bound.
    Overflow { len: usize, max: usize },
    Serialize(serde_json::Error),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::Overflow { len, max } => {
                write!(f, "encoded record is {len} bytes, limit is {max}")
            }
            EncodeError::Serialize(e) => write!(f, "failed to serialize record: {e}"),
        }
    }
}

impl std::error::Error for EncodeError {}

impl From<serde_json::Error> for EncodeError {
    fn from(e: serde_json::Error) -> Self {
        EncodeError::Serialize(e)
    }
}

/// Wire shape of a record. Field order is fixed by declaration order, which
/// together with the central rounding makes encoding deterministic.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Payload<'a> {
    plant_id: &'a str,
    timestamp: i64,
    plant_name: &'a str,
    plant_variety: &'a str,
    plant_location: &'a str,
    temperature: f64,
    humidity: f64,
    soil_moisture: f64,
    light_level: f64,
    battery_level: f64,
    /// Channels whose readings carry the sentinel this cycle.
    invalid: Vec<&'static str>,
}

/// Decoded form of a serialized record, for consumers and round-trip tests.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedRecord {
    pub plant_id: String,
    pub timestamp: i64,
    pub plant_name: String,
    pub plant_variety: String,
    pub plant_location: String,
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
    pub light_level: f64,
    pub battery_level: f64,
    pub invalid: Vec<String>,
}

/// Encodes telemetry records with a fixed two-decimal precision and a hard
/// payload size bound.
pub struct RecordEncoder {
    max_payload: usize,
}

impl RecordEncoder {
    pub fn new(max_payload: usize) -> Self {
        Self { max_payload }
    }

    pub fn encode(&self, record: &TelemetryRecord) -> Result<SerializedRecord, EncodeError> {
        let readings = &record.readings;
        let payload = Payload {
            plant_id: &record.plant_id,
            timestamp: record.timestamp_ms,
            plant_name: &record.plant_name,
            plant_variety: &record.plant_variety,
            plant_location: &record.plant_location,
            temperature: round2(readings.temperature.value),
            humidity: round2(readings.humidity.value),
            soil_moisture: round2(readings.soil_moisture.value),
            light_level: round2(readings.light_level.value),
            battery_level: round2(readings.battery_level.value),
            invalid: readings.invalid_channels().iter().map(|c| c.as_str()).collect(),
        };

        let bytes = serde_json::to_vec(&payload)?;
        if bytes.len() > self.max_payload {
            return Err(EncodeError::Overflow {
                len: bytes.len(),
                max: self.max_payload,
            });
        }

        Ok(SerializedRecord(bytes))
    }

    pub fn decode(bytes: &[u8]) -> Result<DecodedRecord, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

impl Default for RecordEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD)
    }
}

/// Two decimal digits, the precision every sensor value is published with.
fn round2(value: f32) -> f64 {
    (f64::from(value) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use sensors::{ChannelId, SensorReading};

    use super::*;

    fn sample_readings() -> ReadingSet {
        ReadingSet {
            temperature: SensorReading::valid(21.567),
            humidity: SensorReading::valid(54.321),
            soil_moisture: SensorReading::valid(40.0),
            light_level: SensorReading::valid(79.995),
            battery_level: SensorReading::valid(96.5),
        }
    }

    fn sample_record() -> TelemetryRecord {
        TelemetryRecord {
            plant_id: "2b7e1516-28ae-4d2a-abf7-158809cf4f3c".to_string(),
            plant_name: "basil".to_string(),
            plant_variety: "genovese".to_string(),
            plant_location: "kitchen window".to_string(),
            timestamp_ms: 1_700_000_000_123,
            readings: sample_readings(),
        }
    }

    #[test]
    fn encoding_is_deterministic() {
        let encoder = RecordEncoder::default();
        let record = sample_record();

        let a = encoder.encode(&record).unwrap();
        let b = encoder.encode(&record).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn round_trip_recovers_values_to_declared_precision() {
        let encoder = RecordEncoder::default();
        let record = sample_record();

        let encoded = encoder.encode(&record).unwrap();
        let decoded = RecordEncoder::decode(encoded.as_bytes()).unwrap();

        assert_eq!(decoded.plant_id, record.plant_id);
        assert_eq!(decoded.timestamp, record.timestamp_ms);
        assert!((decoded.temperature - 21.567f32 as f64).abs() < 0.005);
        assert!((decoded.humidity - 54.321f32 as f64).abs() < 0.005);
        assert!((decoded.light_level - 79.995f32 as f64).abs() <= 0.005);
        assert!(decoded.invalid.is_empty());
    }

    #[test]
    fn values_are_rounded_to_two_decimals() {
        let encoder = RecordEncoder::default();
        let record = sample_record();

        let encoded = encoder.encode(&record).unwrap();
        let text = String::from_utf8(encoded.into_bytes()).unwrap();

        assert!(text.contains("\"temperature\":21.57"), "payload: {text}");
        assert!(text.contains("\"soilMoisture\":40.0"), "payload: {text}");
    }

    #[test]
    fn invalid_channels_are_flagged_with_sentinel() {
        let encoder = RecordEncoder::default();
        let mut record = sample_record();
        record.readings.battery_level = SensorReading::invalid();

        let encoded = encoder.encode(&record).unwrap();
        let decoded = RecordEncoder::decode(encoded.as_bytes()).unwrap();

        assert_eq!(decoded.battery_level, 0.0);
        assert_eq!(decoded.invalid, vec!["batteryLevel".to_string()]);
    }

    #[test]
    fn invalid_channel_order_is_sampling_order() {
        let encoder = RecordEncoder::default();
        let mut record = sample_record();
        record.readings.battery_level = SensorReading::invalid();
        record.readings.humidity = SensorReading::invalid();

        let encoded = encoder.encode(&record).unwrap();
        let decoded = RecordEncoder::decode(encoded.as_bytes()).unwrap();

        assert_eq!(
            decoded.invalid,
            vec![
                ChannelId::Humidity.as_str().to_string(),
                ChannelId::BatteryLevel.as_str().to_string()
            ]
        );
    }

    #[test]
    fn oversized_record_is_rejected() {
        let encoder = RecordEncoder::new(128);
        let mut record = sample_record();
        record.plant_location = "x".repeat(200);

        match encoder.encode(&record) {
            Err(EncodeError::Overflow { len, max }) => {
                assert!(len > max);
                assert_eq!(max, 128);
            }
            other => panic!("expected overflow, got {other:?}"),
        }
    }

    #[test]
    fn payload_never_contains_newline() {
        let encoder = RecordEncoder::default();
        let mut record = sample_record();
        record.plant_name = "multi word name".to_string();

        let encoded = encoder.encode(&record).unwrap();
        assert!(!encoded.as_bytes().contains(&b'\n'));
    }
}

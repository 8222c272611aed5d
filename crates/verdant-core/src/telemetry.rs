//! Telemetry sample types.
//!
//! A [`TelemetrySample`] is one normalized sensor reading. Samples are
//! deduplicated into fixed-width time buckets: the tuple
//! (site, device, sensor key, sensor type, topic, bucket start) is unique,
//! and a later sample with the same identity overwrites the prior one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

/// Unique identifier for a telemetry sample.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleId(pub Uuid);

impl SampleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for SampleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SampleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of sensor that produced a reading.
///
/// The vocabulary is open: unrecognized names round-trip through
/// [`SensorType::Other`] instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SensorType {
    Temperature,
    Humidity,
    Co2,
    Light,
    SoilMoisture,
    /// Default for readings that do not declare a type.
    Custom,
    /// Any other declared sensor type, kept verbatim.
    Other(String),
}

impl SensorType {
    /// Get the sensor type as a lowercase string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Co2 => "co2",
            Self::Light => "light",
            Self::SoilMoisture => "soil_moisture",
            Self::Custom => "custom",
            Self::Other(s) => s,
        }
    }

    /// Parse a sensor type from a string (case-insensitive).
    pub fn from_string(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "temperature" => Self::Temperature,
            "humidity" => Self::Humidity,
            "co2" => Self::Co2,
            "light" => Self::Light,
            "soil_moisture" | "soil-moisture" => Self::SoilMoisture,
            "custom" | "" => Self::Custom,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Default for SensorType {
    fn default() -> Self {
        Self::Custom
    }
}

impl std::fmt::Display for SensorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for SensorType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SensorType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_string(&s))
    }
}

/// A raw reading as delivered by the ingestion transport, before
/// normalization. All fields are optional except the value itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReading {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_type: Option<String>,
    /// Raw value; must parse to a finite number or the reading is rejected.
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
}

/// Identity key for telemetry deduplication.
///
/// Two samples with the same identity describe the same reading slot;
/// the later write wins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleIdentity {
    pub site_id: String,
    pub device_id: Option<String>,
    pub sensor_key: Option<String>,
    pub sensor_type: SensorType,
    pub topic: Option<String>,
    pub bucket_start: DateTime<Utc>,
}

/// One normalized sensor reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySample {
    pub id: SampleId,
    pub site_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_key: Option<String>,
    pub sensor_type: SensorType,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    /// When the reading happened.
    pub timestamp: DateTime<Utc>,
    /// Floor of the timestamp to the configured bucket interval.
    pub bucket_start: DateTime<Utc>,
}

impl TelemetrySample {
    /// The deduplication identity of this sample.
    pub fn identity(&self) -> SampleIdentity {
        SampleIdentity {
            site_id: self.site_id.clone(),
            device_id: self.device_id.clone(),
            sensor_key: self.sensor_key.clone(),
            sensor_type: self.sensor_type.clone(),
            topic: self.topic.clone(),
            bucket_start: self.bucket_start,
        }
    }

    /// Event type used for event-condition matching. Samples that do not
    /// declare one are plain telemetry.
    pub fn event_type_or_default(&self) -> &str {
        self.event_type.as_deref().unwrap_or("telemetry")
    }

    /// Look up a sample field by name, as used by logic-expression
    /// variable resolution. Accepts both camelCase and snake_case keys.
    pub fn field(&self, key: &str) -> Option<Value> {
        match key {
            "value" => serde_json::Number::from_f64(self.value).map(Value::Number),
            "unit" => self.unit.clone().map(Value::String),
            "sensorType" | "sensor_type" => {
                Some(Value::String(self.sensor_type.as_str().to_string()))
            }
            "siteId" | "site_id" => Some(Value::String(self.site_id.clone())),
            "deviceId" | "device_id" => self.device_id.clone().map(Value::String),
            "sensorKey" | "sensor_key" => self.sensor_key.clone().map(Value::String),
            "topic" => self.topic.clone().map(Value::String),
            "eventType" | "event_type" => self.event_type.clone().map(Value::String),
            "timestamp" => Some(Value::String(self.timestamp.to_rfc3339())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TelemetrySample {
        TelemetrySample {
            id: SampleId::new(),
            site_id: "z1".to_string(),
            device_id: Some("dev-7".to_string()),
            sensor_key: None,
            sensor_type: SensorType::Temperature,
            value: 27.5,
            unit: Some("C".to_string()),
            topic: Some("greenhouse/telemetry/z1".to_string()),
            event_type: None,
            timestamp: Utc::now(),
            bucket_start: Utc::now(),
        }
    }

    #[test]
    fn test_sensor_type_round_trip() {
        assert_eq!(SensorType::from_string("TEMPERATURE"), SensorType::Temperature);
        assert_eq!(SensorType::from_string(""), SensorType::Custom);
        let other = SensorType::from_string("ph");
        assert_eq!(other.as_str(), "ph");

        let json = serde_json::to_string(&SensorType::SoilMoisture).unwrap();
        assert_eq!(json, "\"soil_moisture\"");
        let back: SensorType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SensorType::SoilMoisture);
    }

    #[test]
    fn test_identity_ignores_value() {
        let a = sample();
        let mut b = a.clone();
        b.id = SampleId::new();
        b.value = 99.0;
        assert_eq!(a.identity(), b.identity());
    }

    #[test]
    fn test_field_lookup() {
        let s = sample();
        assert_eq!(s.field("value"), Some(serde_json::json!(27.5)));
        assert_eq!(s.field("sensorType"), Some(serde_json::json!("temperature")));
        assert_eq!(s.field("sensor_type"), Some(serde_json::json!("temperature")));
        assert_eq!(s.field("siteId"), Some(serde_json::json!("z1")));
        assert_eq!(s.field("sensorKey"), None);
        assert_eq!(s.field("nope"), None);
    }

    #[test]
    fn test_event_type_default() {
        let mut s = sample();
        assert_eq!(s.event_type_or_default(), "telemetry");
        s.event_type = Some("door_open".to_string());
        assert_eq!(s.event_type_or_default(), "door_open");
    }
}

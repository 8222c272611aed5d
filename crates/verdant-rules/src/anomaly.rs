//! Anomaly heuristics ("suspected problems").
//!
//! Hard-coded safety checks that run on every sample, independent of
//! user-defined rules. The three checks are independent and
//! non-exclusive; a single sample can raise up to three alerts.

use chrono::Utc;
use uuid::Uuid;

use verdant_core::action::{AlertId, AlertSeverity, AnomalyAlert, ImportantAction};
use verdant_core::channel::{SharedChannel, topics};
use verdant_core::event::EngineEvent;
use verdant_core::eventbus::SharedEventBus;
use verdant_core::storage::SharedStorage;
use verdant_core::telemetry::TelemetrySample;

/// Temperature above this is a high-severity anomaly (degrees C).
pub const TEMPERATURE_HIGH: f64 = 36.0;
/// Relative humidity below this is a medium-severity anomaly (percent).
pub const HUMIDITY_LOW: f64 = 20.0;
/// CO2 above this is a critical anomaly (ppm).
pub const CO2_HIGH: f64 = 2000.0;

struct Detection {
    severity: AlertSeverity,
    message: String,
}

fn detect(sample: &TelemetrySample) -> Vec<Detection> {
    let mut detections = Vec::new();
    let sensor = sample.sensor_type.as_str();

    if sensor.eq_ignore_ascii_case("temperature") && sample.value > TEMPERATURE_HIGH {
        detections.push(Detection {
            severity: AlertSeverity::High,
            message: format!("Temperature {} exceeds safe limit {}", sample.value, TEMPERATURE_HIGH),
        });
    }
    if sensor.eq_ignore_ascii_case("humidity") && sample.value < HUMIDITY_LOW {
        detections.push(Detection {
            severity: AlertSeverity::Medium,
            message: format!("Humidity {} below safe limit {}", sample.value, HUMIDITY_LOW),
        });
    }
    if sensor.eq_ignore_ascii_case("co2") && sample.value > CO2_HIGH {
        detections.push(Detection {
            severity: AlertSeverity::Critical,
            message: format!("CO2 {} exceeds safe limit {}", sample.value, CO2_HIGH),
        });
    }

    detections
}

/// Runs the safety heuristics and records what they find.
pub struct AnomalyDetector {
    storage: SharedStorage,
    channel: Option<SharedChannel>,
    event_bus: Option<SharedEventBus>,
    namespace: String,
}

impl AnomalyDetector {
    pub fn new(storage: SharedStorage, namespace: impl Into<String>) -> Self {
        Self {
            storage,
            channel: None,
            event_bus: None,
            namespace: namespace.into(),
        }
    }

    pub fn with_channel(mut self, channel: SharedChannel) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_event_bus(mut self, event_bus: SharedEventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Check one sample. For every anomaly: create an unresolved
    /// [`AnomalyAlert`], an [`ImportantAction`] cross-referencing it,
    /// and publish a `suspected_problem` payload on the issue topic.
    /// Returns the number of anomalies detected (0–3). Failures are
    /// logged and never abort rule processing.
    pub async fn check(&self, sample: &TelemetrySample) -> usize {
        let detections = detect(sample);
        let mut recorded = 0;

        for detection in detections {
            let alert = AnomalyAlert {
                id: AlertId::new(),
                site_id: sample.site_id.clone(),
                sensor_type: sample.sensor_type.clone(),
                value: sample.value,
                severity: detection.severity,
                message: detection.message.clone(),
                resolved: false,
                created_at: Utc::now(),
            };
            let important = ImportantAction {
                id: Uuid::new_v4(),
                site_id: sample.site_id.clone(),
                title: detection.message.clone(),
                severity: detection.severity,
                alert_id: alert.id.clone(),
                acknowledged: false,
                created_at: Utc::now(),
            };

            if let Err(e) = self.storage.insert_alert(alert.clone()).await {
                tracing::error!(error = %e, "Failed to store anomaly alert");
                continue;
            }
            if let Err(e) = self.storage.insert_important_action(important.clone()).await {
                tracing::error!(error = %e, alert = %alert.id, "Failed to store important action");
            }

            tracing::warn!(
                site = %alert.site_id,
                sensor = %alert.sensor_type,
                value = alert.value,
                severity = %alert.severity,
                "Suspected problem detected"
            );

            if let Some(channel) = &self.channel {
                let topic = topics::issues(&self.namespace, &sample.site_id);
                let payload = serde_json::json!({
                    "event": "suspected_problem",
                    "alertId": alert.id.to_string(),
                    "importantActionId": important.id.to_string(),
                    "siteId": alert.site_id,
                    "sensorType": alert.sensor_type.as_str(),
                    "severity": alert.severity.as_str(),
                    "value": alert.value,
                    "message": alert.message,
                });
                if let Err(e) = channel
                    .publish(&topic, payload.to_string().as_bytes())
                    .await
                {
                    tracing::warn!(error = %e, topic = %topic, "Suspected-problem publish failed");
                }
            }

            if let Some(bus) = &self.event_bus {
                bus.publish(EngineEvent::SuspectedProblem {
                    alert_id: alert.id.to_string(),
                    site_id: alert.site_id.clone(),
                    sensor_type: alert.sensor_type.as_str().to_string(),
                    severity: alert.severity.as_str().to_string(),
                    value: alert.value,
                    timestamp: Utc::now().timestamp(),
                });
            }

            recorded += 1;
        }

        recorded
    }
}

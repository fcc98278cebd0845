//! Classification of inbound hub messages.
//!
//! Routing is pure: [`MessageRouter::route`] decodes a message into a list of
//! [`Dispatch`] items and leaves publishing and state updates to the caller.

use serde_json::Value;

use crate::error::DecodeError;
use crate::firmware::FirmwareVersion;
use crate::topic::{parse_topic, telemetry_topic, DeviceIdentity};

pub const SOLAR_INPUT_POWER: &str = "solarInputPower";
pub const MASTER_FIRMWARE_VERSION: &str = "masterFirmwareVersion";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Forward one reported property into the normalized topic space.
    Republish { topic: String, payload: String },
    SolarInput(i64),
    Firmware(FirmwareVersion),
    /// A normalized metric nobody tracks. Worth a warning.
    Unrecognized(String),
}

#[derive(Clone, Debug)]
pub struct MessageRouter {
    identity: DeviceIdentity,
    metric_prefix: String,
}

impl MessageRouter {
    pub fn new(identity: DeviceIdentity) -> Self {
        let metric_prefix = identity.metric_prefix();
        Self {
            identity,
            metric_prefix,
        }
    }

    pub fn route(&self, topic: &str, payload: &[u8]) -> Result<Vec<Dispatch>, DecodeError> {
        let mut dispatches = Vec::new();

        if topic.contains(self.identity.product_id()) {
            dispatches.extend(republish(topic, payload)?);
        }

        if topic.starts_with(&self.metric_prefix) && !payload.is_empty() {
            dispatches.extend(decode_metric(topic, payload)?);
        }

        Ok(dispatches)
    }
}

fn republish(topic: &str, payload: &[u8]) -> Result<Vec<Dispatch>, DecodeError> {
    let Some(device_id) = parse_topic(topic).device_id() else {
        return Ok(Vec::new());
    };
    let report: Value = serde_json::from_slice(payload)?;
    let Some(Value::Object(properties)) = report.get("properties") else {
        return Ok(Vec::new());
    };

    Ok(properties
        .iter()
        .map(|(property, value)| Dispatch::Republish {
            topic: telemetry_topic(device_id, property),
            payload: bare_scalar(value),
        })
        .collect())
}

/// Renders a JSON value the way it is published on a per-property topic:
/// strings without quotes, null as an empty payload.
fn bare_scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn decode_metric(topic: &str, payload: &[u8]) -> Result<Option<Dispatch>, DecodeError> {
    let Some(metric) = parse_topic(topic).metric() else {
        return Ok(None);
    };

    let dispatch = match metric {
        SOLAR_INPUT_POWER => Dispatch::SolarInput(parse_integer(metric, payload)?),
        MASTER_FIRMWARE_VERSION => {
            Dispatch::Firmware(FirmwareVersion::try_from(parse_integer(metric, payload)?)?)
        }
        _ if topic.contains("control") => return Ok(None),
        other => Dispatch::Unrecognized(other.to_string()),
    };
    Ok(Some(dispatch))
}

fn parse_integer(metric: &str, payload: &[u8]) -> Result<i64, DecodeError> {
    let value = std::str::from_utf8(payload)?;
    value
        .trim()
        .parse()
        .map_err(|_| DecodeError::NotAnInteger {
            metric: metric.to_string(),
            value: value.to_string(),
        })
}

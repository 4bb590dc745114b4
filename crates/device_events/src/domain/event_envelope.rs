use chrono::{DateTime, NaiveDateTime, Utc};
use common::domain::{DomainError, DomainResult};
use serde::Deserialize;
use serde_json::{Map, Value};

pub const DEVICE_CONNECTED_EVENT: &str = "device_connected";
pub const INCOMING_DATA_EVENT: &str = "incoming_data";

/// A validated inbound event for one device
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceEventEnvelope {
    pub device_identifier: String,
    pub event: DeviceEvent,
    /// Broker-side reception time; recorded but never used for ordering
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    DeviceConnected { device_ip_address: Option<String> },
    IncomingData(IncomingData),
    /// Any event type this pipeline has no handler for
    Unhandled { event_type: String },
}

impl DeviceEvent {
    pub fn event_type(&self) -> &str {
        match self {
            DeviceEvent::DeviceConnected { .. } => DEVICE_CONNECTED_EVENT,
            DeviceEvent::IncomingData(_) => INCOMING_DATA_EVENT,
            DeviceEvent::Unhandled { event_type } => event_type,
        }
    }
}

/// A telemetry data point published by a device on an interface path
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingData {
    pub interface: String,
    pub path: String,
    pub value: Value,
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    device_identifier: Option<String>,
    #[serde(default)]
    device_id: Option<String>,
    #[serde(default)]
    event: Option<Map<String, Value>>,
    #[serde(default)]
    timestamp: Option<String>,
}

/// Parse and validate a webhook body into a [`DeviceEventEnvelope`]
///
/// Unknown event types are accepted as [`DeviceEvent::Unhandled`] whatever
/// else their body carries. Anything structurally wrong is
/// `DomainError::InvalidPayload`.
pub fn parse_event_envelope(payload: &[u8]) -> DomainResult<DeviceEventEnvelope> {
    let raw: RawEnvelope = serde_json::from_slice(payload)
        .map_err(|e| DomainError::InvalidPayload(format!("malformed event body: {}", e)))?;

    let device_identifier = one_spelling("device_identifier", raw.device_identifier, raw.device_id)
        .map_err(DomainError::InvalidPayload)?
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DomainError::InvalidPayload("missing device_identifier".to_string()))?;

    let timestamp = raw
        .timestamp
        .ok_or_else(|| DomainError::InvalidPayload("missing timestamp".to_string()))
        .and_then(|ts| parse_timestamp(&ts))?;

    let raw_event = raw
        .event
        .ok_or_else(|| DomainError::InvalidPayload("missing event".to_string()))?;

    let event = parse_event(raw_event)?;

    Ok(DeviceEventEnvelope {
        device_identifier,
        event,
        timestamp,
    })
}

/// Merge a field that devices and brokers spell two ways
///
/// Either spelling may be absent; when both are present they must agree.
pub(crate) fn one_spelling(
    name: &str,
    primary: Option<String>,
    alternate: Option<String>,
) -> Result<Option<String>, String> {
    match (primary, alternate) {
        (Some(a), Some(b)) if a != b => Err(format!("conflicting values for {}", name)),
        (Some(a), _) => Ok(Some(a)),
        (None, b) => Ok(b),
    }
}

/// Only the fields of the detected event type are read
fn parse_event(raw: Map<String, Value>) -> DomainResult<DeviceEvent> {
    let event_type = raw
        .get("type")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| DomainError::InvalidPayload("missing event.type".to_string()))?;

    match event_type {
        DEVICE_CONNECTED_EVENT => Ok(DeviceEvent::DeviceConnected {
            device_ip_address: string_field(&raw, "device_ip_address")?,
        }),
        INCOMING_DATA_EVENT => {
            let interface = string_field(&raw, "interface")?
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    DomainError::InvalidPayload("incoming_data event without interface".to_string())
                })?;
            let path = string_field(&raw, "path")?
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    DomainError::InvalidPayload("incoming_data event without path".to_string())
                })?;

            Ok(DeviceEvent::IncomingData(IncomingData {
                interface,
                path,
                value: raw.get("value").cloned().unwrap_or(Value::Null),
            }))
        }
        other => Ok(DeviceEvent::Unhandled {
            event_type: other.to_string(),
        }),
    }
}

/// An optional string member of the event body; null counts as absent
fn string_field(raw: &Map<String, Value>, name: &str) -> DomainResult<Option<String>> {
    match raw.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(DomainError::InvalidPayload(format!(
            "event.{} must be a string",
            name
        ))),
    }
}

/// RFC 3339, or an ISO-8601 timestamp without offset taken as UTC
fn parse_timestamp(value: &str) -> DomainResult<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| DomainError::InvalidPayload(format!("unparseable timestamp: {}", value)))
}

use crate::domain::{IncomingData, OtaStatusReport};
use serde_json::Value;

pub const SYSTEM_INFO_INTERFACE: &str = "io.edgehog.devicemanager.SystemInfo";
pub const OTA_RESPONSE_INTERFACE: &str = "io.edgehog.devicemanager.OTAResponse";

/// Typed result of decoding a routed telemetry value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryUpdate {
    SerialNumber(String),
    PartNumber(String),
    OtaStatus(OtaStatusReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Matched(TelemetryUpdate),
    /// The route matched but the value could not be decoded
    Rejected { reason: String },
    Unrouted,
}

type TelemetryDecoder = fn(&Value) -> Result<TelemetryUpdate, String>;

struct TelemetryRoute {
    interface: &'static str,
    path: &'static str,
    decode: TelemetryDecoder,
}

static TELEMETRY_ROUTES: &[TelemetryRoute] = &[
    TelemetryRoute {
        interface: SYSTEM_INFO_INTERFACE,
        path: "/serialNumber",
        decode: decode_serial_number,
    },
    TelemetryRoute {
        interface: SYSTEM_INFO_INTERFACE,
        path: "/partNumber",
        decode: decode_part_number,
    },
    TelemetryRoute {
        interface: OTA_RESPONSE_INTERFACE,
        path: "/response",
        decode: decode_ota_response,
    },
];

/// Find the route for a data point and decode its value
pub fn route_incoming_data(data: &IncomingData) -> RouteOutcome {
    let Some(route) = TELEMETRY_ROUTES
        .iter()
        .find(|route| route.interface == data.interface && route.path == data.path)
    else {
        return RouteOutcome::Unrouted;
    };

    match (route.decode)(&data.value) {
        Ok(update) => RouteOutcome::Matched(update),
        Err(reason) => RouteOutcome::Rejected { reason },
    }
}

fn decode_string(value: &Value, field: &str) -> Result<String, String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| format!("{} must be a string, got {}", field, value))
}

fn decode_serial_number(value: &Value) -> Result<TelemetryUpdate, String> {
    decode_string(value, "serial number").map(TelemetryUpdate::SerialNumber)
}

fn decode_part_number(value: &Value) -> Result<TelemetryUpdate, String> {
    decode_string(value, "part number").map(TelemetryUpdate::PartNumber)
}

fn decode_ota_response(value: &Value) -> Result<TelemetryUpdate, String> {
    OtaStatusReport::from_telemetry_value(value).map(TelemetryUpdate::OtaStatus)
}

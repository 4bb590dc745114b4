use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use common::domain::DomainError;
use common::http::ApiError;
use tracing::{debug, instrument};

use crate::domain::{DeviceEventReceipt, DeviceEventService, HandleDeviceEventRequest};

/// Header the broker uses to name the realm a trigger fired in
pub const REALM_HEADER: &str = "astarte-realm";

/// HTTP handler for broker trigger deliveries
/// Handles request -> domain mapping; error conversion happens in `ApiError`
#[instrument(
    name = "HandleTrigger",
    skip(service, headers, body),
    fields(tenant_slug = %tenant_slug, body_len = body.len())
)]
pub async fn handle_trigger(
    State(service): State<Arc<DeviceEventService>>,
    Path(tenant_slug): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<DeviceEventReceipt>, ApiError> {
    let realm = headers
        .get(REALM_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            DomainError::UnknownTenantOrRealm(format!("missing {} header", REALM_HEADER))
        })?
        .to_string();

    let request = HandleDeviceEventRequest {
        tenant_slug,
        realm,
        payload: body.to_vec(),
    };

    let receipt = service.handle_event(request).await?;

    debug!(device_id = %receipt.device_id, outcome = ?receipt.outcome, "trigger handled");

    Ok(Json(receipt))
}

pub async fn health() -> &'static str {
    "OK"
}

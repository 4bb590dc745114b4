use super::event_envelope::one_spelling;
use common::domain::{
    Device, DomainError, DomainResult, OtaOperation, OtaOperationRepository, OtaOperationStatus,
    UpdateOtaOperationStatusRepoInput, UpsertDeviceRepoInput,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

/// A status report published on the OTA response interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtaStatusReport {
    /// Operation id exactly as the device reported it
    pub operation_id: String,
    pub status: OtaOperationStatus,
    pub status_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawOtaResponse {
    #[serde(default)]
    operation_id: Option<String>,
    #[serde(default)]
    uuid: Option<String>,
    status: String,
    #[serde(default)]
    status_code: Option<String>,
    #[serde(default, rename = "statusCode")]
    status_code_camel: Option<String>,
}

impl OtaStatusReport {
    /// Decode the telemetry value of an OTA response data point
    ///
    /// Both spellings of a field may be present as long as they agree.
    pub fn from_telemetry_value(value: &Value) -> Result<Self, String> {
        let raw = RawOtaResponse::deserialize(value)
            .map_err(|e| format!("malformed OTA response: {}", e))?;

        let operation_id = one_spelling("uuid", raw.uuid, raw.operation_id)?
            .ok_or_else(|| "OTA response without operation id".to_string())?;

        // Stored ids are matched as received; only the shape is checked
        Uuid::parse_str(&operation_id)
            .map_err(|_| format!("malformed OTA operation id: {}", operation_id))?;

        let status = parse_wire_status(&raw.status)?;
        let status_code = one_spelling("statusCode", raw.status_code_camel, raw.status_code)?;

        Ok(Self {
            operation_id,
            status,
            status_code: status_code.filter(|code| !code.is_empty()),
        })
    }
}

/// Map the status spelling devices publish to the stored status
pub fn parse_wire_status(value: &str) -> Result<OtaOperationStatus, String> {
    match value {
        "Pending" => Ok(OtaOperationStatus::Pending),
        "InProgress" => Ok(OtaOperationStatus::InProgress),
        "Error" => Ok(OtaOperationStatus::Error),
        "Done" => Ok(OtaOperationStatus::Done),
        other => Err(format!("unknown OTA status: {}", other)),
    }
}

/// Outcome of a status report
///
/// The reporting device is resolved even when the operation is unknown.
#[derive(Debug)]
pub struct AppliedOtaReport {
    pub device: Device,
    /// `DomainError::OperationNotFound` when the id matches no operation of the tenant
    pub operation: DomainResult<OtaOperation>,
}

/// Applies OTA status reports to in-flight operations
pub struct OtaOperationTracker {
    ota_operation_repository: Arc<dyn OtaOperationRepository>,
}

impl OtaOperationTracker {
    pub fn new(ota_operation_repository: Arc<dyn OtaOperationRepository>) -> Self {
        Self {
            ota_operation_repository,
        }
    }

    /// Overwrite status and status code of the reported operation
    ///
    /// Last write wins: a late report may move a terminal operation back.
    #[instrument(skip(self, device, report), fields(tenant_id = %device.tenant_id, operation_id = %report.operation_id, status = %report.status))]
    pub async fn apply_status_report(
        &self,
        device: UpsertDeviceRepoInput,
        report: OtaStatusReport,
    ) -> DomainResult<AppliedOtaReport> {
        let update = self
            .ota_operation_repository
            .update_status(UpdateOtaOperationStatusRepoInput {
                device,
                operation_id: report.operation_id.clone(),
                status: report.status,
                status_code: report.status_code,
            })
            .await?;

        let operation = match update.transition {
            Some(transition) => {
                if transition.previous_status.is_terminal()
                    && transition.previous_status != report.status
                {
                    debug!(previous = %transition.previous_status, "overwrote terminal OTA status");
                }

                debug!(
                    device_id = %transition.operation.device_id,
                    previous = %transition.previous_status,
                    "applied OTA status report"
                );

                Ok(transition.operation)
            }
            None => Err(DomainError::OperationNotFound(report.operation_id)),
        };

        Ok(AppliedOtaReport {
            device: update.device.device,
            operation,
        })
    }
}

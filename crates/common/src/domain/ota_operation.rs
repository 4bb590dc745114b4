use crate::domain::device::{DeviceUpsert, UpsertDeviceRepoInput};
use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// Status of an over-the-air update operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OtaOperationStatus {
    Pending,
    InProgress,
    Error,
    Done,
}

impl OtaOperationStatus {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            OtaOperationStatus::Pending => "pending",
            OtaOperationStatus::InProgress => "in_progress",
            OtaOperationStatus::Error => "error",
            OtaOperationStatus::Done => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OtaOperationStatus::Error | OtaOperationStatus::Done)
    }
}

impl fmt::Display for OtaOperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OtaOperationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OtaOperationStatus::Pending),
            "in_progress" => Ok(OtaOperationStatus::InProgress),
            "error" => Ok(OtaOperationStatus::Error),
            "done" => Ok(OtaOperationStatus::Done),
            other => Err(format!("unknown OTA operation status: {}", other)),
        }
    }
}

/// OTA operation tracked for a device
///
/// Created when an update is dispatched; the ingestion pipeline only moves
/// `status`/`status_code`.
#[derive(Debug, Clone, PartialEq)]
pub struct OtaOperation {
    pub operation_id: String,
    pub tenant_id: String,
    pub device_id: String,
    pub status: OtaOperationStatus,
    pub status_code: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Repository input for a status transition
///
/// The reporting device is resolved or created in the same transaction.
/// `status` and `status_code` are always written together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOtaOperationStatusRepoInput {
    pub device: UpsertDeviceRepoInput,
    pub operation_id: String,
    pub status: OtaOperationStatus,
    pub status_code: Option<String>,
}

/// An applied transition with the status it replaced
#[derive(Debug, Clone, PartialEq)]
pub struct OtaStatusTransition {
    pub previous_status: OtaOperationStatus,
    pub operation: OtaOperation,
}

/// Result of a status report against the store
#[derive(Debug, Clone, PartialEq)]
pub struct OtaStatusUpdate {
    pub device: DeviceUpsert,
    /// None when no operation of the tenant has the reported id
    pub transition: Option<OtaStatusTransition>,
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait OtaOperationRepository: Send + Sync {
    /// Resolve the device and overwrite status and status code of the
    /// operation, in one transaction
    async fn update_status(
        &self,
        input: UpdateOtaOperationStatusRepoInput,
    ) -> DomainResult<OtaStatusUpdate>;
}

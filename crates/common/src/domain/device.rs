use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Device record reconciled from broker events
///
/// Identity is `(tenant_id, device_identifier)`; `device_id` is the surrogate
/// key other tables reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub device_id: String,
    pub tenant_id: String,
    pub device_identifier: String,
    pub online: bool,
    pub serial_number: Option<String>,
    pub part_number: Option<String>,
    pub system_model_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Result of a fetch-or-insert on the device table
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceUpsert {
    pub device: Device,
    /// True when this call inserted the row
    pub created: bool,
}

/// Repository input for the atomic fetch-or-insert
///
/// `device_id` is only used when the row does not exist yet; an existing row
/// keeps its own id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertDeviceRepoInput {
    pub device_id: String,
    pub tenant_id: String,
    pub device_identifier: String,
}

/// Repository input for overwriting connectivity
///
/// The device is resolved or created in the same transaction as the write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateDeviceOnlineRepoInput {
    pub device: UpsertDeviceRepoInput,
    pub online: bool,
}

/// Repository input for overwriting the serial number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateDeviceSerialNumberRepoInput {
    pub device: UpsertDeviceRepoInput,
    pub serial_number: String,
}

/// Repository input for overwriting the part number
///
/// The system model is looked up inside the write; an unmatched part number
/// keeps whatever association the device already has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateDevicePartNumberRepoInput {
    pub device: UpsertDeviceRepoInput,
    pub part_number: String,
}

/// Repository trait for device storage operations
///
/// Every method is scoped by tenant and runs as one transaction: the device
/// row is fetched or inserted, then overwritten.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Fetch the device for `(tenant_id, device_identifier)` or insert a fresh
    /// offline record, atomically
    async fn upsert_device(&self, input: UpsertDeviceRepoInput) -> DomainResult<DeviceUpsert>;

    /// Resolve the device and overwrite the online flag
    async fn update_online(&self, input: UpdateDeviceOnlineRepoInput) -> DomainResult<DeviceUpsert>;

    /// Resolve the device and overwrite the serial number
    async fn update_serial_number(
        &self,
        input: UpdateDeviceSerialNumberRepoInput,
    ) -> DomainResult<DeviceUpsert>;

    /// Resolve the device and overwrite the part number, associating the
    /// matching system model of the tenant when there is one
    async fn update_part_number(
        &self,
        input: UpdateDevicePartNumberRepoInput,
    ) -> DomainResult<DeviceUpsert>;
}

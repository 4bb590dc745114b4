use common::domain::{
    Device, DeviceRepository, DomainResult, UpdateDeviceOnlineRepoInput,
    UpdateDevicePartNumberRepoInput, UpdateDeviceSerialNumberRepoInput, UpsertDeviceRepoInput,
};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Applies connection events and identity telemetry to device records
///
/// Every write is an overwrite, so replayed events converge on the same state.
/// Each write resolves the device in its own transaction, so a failed write
/// leaves no placeholder behind.
pub struct DeviceStateReconciler {
    device_repository: Arc<dyn DeviceRepository>,
}

impl DeviceStateReconciler {
    pub fn new(device_repository: Arc<dyn DeviceRepository>) -> Self {
        Self { device_repository }
    }

    #[instrument(skip(self, device), fields(tenant_id = %device.tenant_id, device_identifier = %device.device_identifier))]
    pub async fn mark_connected(&self, device: UpsertDeviceRepoInput) -> DomainResult<Device> {
        let upsert = self
            .device_repository
            .update_online(UpdateDeviceOnlineRepoInput {
                device,
                online: true,
            })
            .await?;

        debug!(
            device_id = %upsert.device.device_id,
            created = upsert.created,
            "marked device online"
        );

        Ok(upsert.device)
    }

    #[instrument(skip(self, device, serial_number), fields(tenant_id = %device.tenant_id, device_identifier = %device.device_identifier))]
    pub async fn update_serial_number(
        &self,
        device: UpsertDeviceRepoInput,
        serial_number: String,
    ) -> DomainResult<Device> {
        let upsert = self
            .device_repository
            .update_serial_number(UpdateDeviceSerialNumberRepoInput {
                device,
                serial_number,
            })
            .await?;

        Ok(upsert.device)
    }

    /// Store the part number and associate the matching system model, if any
    ///
    /// An unmatched part number is still stored; the existing association is
    /// left as it was.
    #[instrument(skip(self, device), fields(tenant_id = %device.tenant_id, device_identifier = %device.device_identifier, part_number = %part_number))]
    pub async fn update_part_number(
        &self,
        device: UpsertDeviceRepoInput,
        part_number: String,
    ) -> DomainResult<Device> {
        let upsert = self
            .device_repository
            .update_part_number(UpdateDevicePartNumberRepoInput {
                device,
                part_number,
            })
            .await?;

        match &upsert.device.system_model_id {
            Some(id) => debug!(system_model_id = %id, "device has system model"),
            None => debug!("part number has no system model"),
        }

        Ok(upsert.device)
    }
}

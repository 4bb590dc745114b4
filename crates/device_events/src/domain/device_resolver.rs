use common::domain::{Device, DeviceRepository, DomainResult, UpsertDeviceRepoInput};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Maps a broker device identifier to a local device record
pub struct DeviceResolver {
    device_repository: Arc<dyn DeviceRepository>,
}

impl DeviceResolver {
    pub fn new(device_repository: Arc<dyn DeviceRepository>) -> Self {
        Self { device_repository }
    }

    /// Identity of the device an event belongs to
    ///
    /// A fresh xid is offered every time; the repository keeps the existing
    /// row's id when the device is already known. Mutations carry this key so
    /// the device is resolved in the same transaction as the write.
    pub fn device_key(tenant_id: &str, device_identifier: &str) -> UpsertDeviceRepoInput {
        UpsertDeviceRepoInput {
            device_id: xid::new().to_string(),
            tenant_id: tenant_id.to_string(),
            device_identifier: device_identifier.to_string(),
        }
    }

    /// Return the device for `(tenant_id, device_identifier)`, creating an
    /// offline placeholder on first sight
    #[instrument(skip(self), fields(tenant_id = %tenant_id, device_identifier = %device_identifier))]
    pub async fn resolve_or_create(
        &self,
        tenant_id: &str,
        device_identifier: &str,
    ) -> DomainResult<Device> {
        let upsert = self
            .device_repository
            .upsert_device(Self::device_key(tenant_id, device_identifier))
            .await?;

        if upsert.created {
            debug!(device_id = %upsert.device.device_id, "registered previously unseen device");
        }

        Ok(upsert.device)
    }
}

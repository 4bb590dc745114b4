use crate::domain::{
    DeviceEvent, DeviceResolver, DeviceStateReconciler, IncomingData, OtaOperationTracker,
    RouteOutcome, TelemetryUpdate, parse_event_envelope, route_incoming_data,
};
use common::domain::{
    Device, DeviceRepository, DomainError, DomainResult, GetTenantBySlugRepoInput,
    OtaOperationRepository, Tenant, TenantRepository,
};
use garde::Validate;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Service request for one inbound broker event
#[derive(Debug, Clone, Validate)]
pub struct HandleDeviceEventRequest {
    #[garde(length(min = 1))]
    pub tenant_slug: String,
    #[garde(length(min = 1))]
    pub realm: String,
    #[garde(skip)] // parsed by the envelope parser
    pub payload: Vec<u8>,
}

/// What the pipeline did with an accepted event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EventOutcome {
    Applied,
    Unrouted,
    Rejected { reason: String },
    Dropped { reason: String },
    Ignored { event_type: String },
}

/// Response body for an accepted event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceEventReceipt {
    #[serde(flatten)]
    pub outcome: EventOutcome,
    pub device_id: String,
}

/// Domain service for the device event ingestion pipeline
/// Parser -> resolver -> router -> reconciler or OTA tracker
///
/// Each event touches the store in exactly one repository call, which is one
/// transaction.
pub struct DeviceEventService {
    tenant_repository: Arc<dyn TenantRepository>,
    device_resolver: DeviceResolver,
    device_state_reconciler: DeviceStateReconciler,
    ota_operation_tracker: OtaOperationTracker,
}

impl DeviceEventService {
    pub fn new(
        tenant_repository: Arc<dyn TenantRepository>,
        device_repository: Arc<dyn DeviceRepository>,
        ota_operation_repository: Arc<dyn OtaOperationRepository>,
    ) -> Self {
        Self {
            tenant_repository,
            device_resolver: DeviceResolver::new(device_repository.clone()),
            device_state_reconciler: DeviceStateReconciler::new(device_repository),
            ota_operation_tracker: OtaOperationTracker::new(ota_operation_repository),
        }
    }

    /// Apply one broker event to local state
    ///
    /// Returns an error only for malformed requests, unknown tenants and store
    /// failures. Everything known but not actionable is a successful outcome.
    #[instrument(skip(self, request), fields(tenant_slug = %request.tenant_slug, realm = %request.realm))]
    pub async fn handle_event(
        &self,
        request: HandleDeviceEventRequest,
    ) -> DomainResult<DeviceEventReceipt> {
        common::garde::validate_struct(&request)?;

        let tenant = self
            .resolve_tenant(&request.tenant_slug, &request.realm)
            .await?;

        let envelope = parse_event_envelope(&request.payload)?;

        debug!(
            device_identifier = %envelope.device_identifier,
            event_type = %envelope.event.event_type(),
            timestamp = %envelope.timestamp,
            "received device event"
        );

        let tenant_id = tenant.tenant_id.as_str();
        let device_identifier = envelope.device_identifier.as_str();

        let (device, outcome) = match envelope.event {
            DeviceEvent::DeviceConnected { device_ip_address } => {
                debug!(device_ip_address = ?device_ip_address, "device connected");
                let device = self
                    .device_state_reconciler
                    .mark_connected(DeviceResolver::device_key(tenant_id, device_identifier))
                    .await?;
                (device, EventOutcome::Applied)
            }
            DeviceEvent::IncomingData(data) => {
                self.handle_incoming_data(tenant_id, device_identifier, data)
                    .await?
            }
            DeviceEvent::Unhandled { event_type } => {
                debug!(event_type = %event_type, "ignoring unhandled event type");
                let device = self
                    .device_resolver
                    .resolve_or_create(tenant_id, device_identifier)
                    .await?;
                (device, EventOutcome::Ignored { event_type })
            }
        };

        Ok(DeviceEventReceipt {
            outcome,
            device_id: device.device_id,
        })
    }

    async fn resolve_tenant(&self, slug: &str, realm: &str) -> DomainResult<Tenant> {
        let tenant = self
            .tenant_repository
            .get_tenant_by_slug(GetTenantBySlugRepoInput {
                slug: slug.to_string(),
            })
            .await?
            .filter(|tenant| tenant.accepts_realm(realm))
            .ok_or_else(|| DomainError::UnknownTenantOrRealm(slug.to_string()))?;

        Ok(tenant)
    }

    async fn handle_incoming_data(
        &self,
        tenant_id: &str,
        device_identifier: &str,
        data: IncomingData,
    ) -> DomainResult<(Device, EventOutcome)> {
        let update = match route_incoming_data(&data) {
            RouteOutcome::Matched(update) => update,
            RouteOutcome::Rejected { reason } => {
                warn!(
                    interface = %data.interface,
                    path = %data.path,
                    reason = %reason,
                    "rejected telemetry value"
                );
                let device = self
                    .device_resolver
                    .resolve_or_create(tenant_id, device_identifier)
                    .await?;
                return Ok((device, EventOutcome::Rejected { reason }));
            }
            RouteOutcome::Unrouted => {
                debug!(interface = %data.interface, path = %data.path, "no route for telemetry");
                let device = self
                    .device_resolver
                    .resolve_or_create(tenant_id, device_identifier)
                    .await?;
                return Ok((device, EventOutcome::Unrouted));
            }
        };

        let key = DeviceResolver::device_key(tenant_id, device_identifier);

        let device = match update {
            TelemetryUpdate::SerialNumber(serial_number) => {
                self.device_state_reconciler
                    .update_serial_number(key, serial_number)
                    .await?
            }
            TelemetryUpdate::PartNumber(part_number) => {
                self.device_state_reconciler
                    .update_part_number(key, part_number)
                    .await?
            }
            TelemetryUpdate::OtaStatus(report) => {
                let applied = self
                    .ota_operation_tracker
                    .apply_status_report(key, report)
                    .await?;

                match applied.operation {
                    Ok(_) => applied.device,
                    Err(DomainError::OperationNotFound(operation_id)) => {
                        warn!(operation_id = %operation_id, "OTA report for unknown operation");
                        return Ok((
                            applied.device,
                            EventOutcome::Dropped {
                                reason: format!("unknown OTA operation {}", operation_id),
                            },
                        ));
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        Ok((device, EventOutcome::Applied))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{
        DeviceUpsert, MockDeviceRepository, MockOtaOperationRepository, MockTenantRepository,
        OtaOperation, OtaOperationStatus, OtaStatusTransition, OtaStatusUpdate,
        UpdateDeviceOnlineRepoInput, UpdateDevicePartNumberRepoInput,
        UpdateDeviceSerialNumberRepoInput, UpdateOtaOperationStatusRepoInput,
        UpsertDeviceRepoInput,
    };
    use serde_json::{Value, json};

    const OPERATION_ID: &str = "5fa4c9a2-8b3e-4c47-9d2b-1f0c6e7a3b11";

    struct Mocks {
        tenants: MockTenantRepository,
        devices: MockDeviceRepository,
        ota_operations: MockOtaOperationRepository,
    }

    impl Mocks {
        fn new() -> Self {
            let mut tenants = MockTenantRepository::new();
            tenants
                .expect_get_tenant_by_slug()
                .returning(|input| {
                    Ok((input.slug == "acme").then(|| Tenant {
                        tenant_id: "tenant-1".to_string(),
                        slug: "acme".to_string(),
                        realm_name: "acme_realm".to_string(),
                        created_at: None,
                        updated_at: None,
                    }))
                });

            Self {
                tenants,
                devices: MockDeviceRepository::new(),
                ota_operations: MockOtaOperationRepository::new(),
            }
        }

        /// Expect a bare resolve of DEVICE_A and nothing else on devices
        fn expect_resolve_only(&mut self, created: bool) {
            self.devices
                .expect_upsert_device()
                .withf(|input: &UpsertDeviceRepoInput| is_device_a(input))
                .times(1)
                .return_once(move |_| {
                    Ok(DeviceUpsert {
                        device: device(),
                        created,
                    })
                });
        }

        fn into_service(self) -> DeviceEventService {
            DeviceEventService::new(
                Arc::new(self.tenants),
                Arc::new(self.devices),
                Arc::new(self.ota_operations),
            )
        }
    }

    fn is_device_a(input: &UpsertDeviceRepoInput) -> bool {
        input.tenant_id == "tenant-1"
            && input.device_identifier == "DEVICE_A"
            && !input.device_id.is_empty()
    }

    fn device() -> Device {
        Device {
            device_id: "dev-1".to_string(),
            tenant_id: "tenant-1".to_string(),
            device_identifier: "DEVICE_A".to_string(),
            online: false,
            serial_number: None,
            part_number: None,
            system_model_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn upserted(device: Device, created: bool) -> DomainResult<DeviceUpsert> {
        Ok(DeviceUpsert { device, created })
    }

    fn request(event: Value) -> HandleDeviceEventRequest {
        HandleDeviceEventRequest {
            tenant_slug: "acme".to_string(),
            realm: "acme_realm".to_string(),
            payload: serde_json::to_vec(&json!({
                "device_id": "DEVICE_A",
                "event": event,
                "timestamp": "2024-01-01T00:00:00Z"
            }))
            .unwrap(),
        }
    }

    fn incoming(interface: &str, path: &str, value: Value) -> Value {
        json!({ "type": "incoming_data", "interface": interface, "path": path, "value": value })
    }

    #[tokio::test]
    async fn test_device_connected_creates_and_marks_online_in_one_call() {
        let mut mocks = Mocks::new();
        mocks.devices.expect_upsert_device().times(0);
        mocks
            .devices
            .expect_update_online()
            .withf(|input: &UpdateDeviceOnlineRepoInput| is_device_a(&input.device) && input.online)
            .times(1)
            .return_once(|_| {
                upserted(
                    Device {
                        online: true,
                        ..device()
                    },
                    true,
                )
            });

        let receipt = mocks
            .into_service()
            .handle_event(request(json!({ "type": "device_connected" })))
            .await
            .unwrap();

        assert_eq!(receipt.outcome, EventOutcome::Applied);
        assert_eq!(receipt.device_id, "dev-1");
    }

    #[tokio::test]
    async fn test_failed_connection_write_is_a_store_error() {
        let mut mocks = Mocks::new();
        mocks.devices.expect_upsert_device().times(0);
        mocks
            .devices
            .expect_update_online()
            .times(1)
            .return_once(|_| Err(DomainError::RepositoryError(anyhow::anyhow!("connection reset"))));

        let result = mocks
            .into_service()
            .handle_event(request(json!({ "type": "device_connected" })))
            .await;

        assert!(matches!(result, Err(DomainError::RepositoryError(_))));
    }

    #[tokio::test]
    async fn test_unhandled_event_creates_device_without_touching_online() {
        let mut mocks = Mocks::new();
        mocks.expect_resolve_only(true);
        mocks.devices.expect_update_online().times(0);

        let receipt = mocks
            .into_service()
            .handle_event(request(json!({ "type": "device_disconnected" })))
            .await
            .unwrap();

        assert_eq!(
            receipt.outcome,
            EventOutcome::Ignored {
                event_type: "device_disconnected".to_string()
            }
        );
        assert_eq!(receipt.device_id, "dev-1");
    }

    #[tokio::test]
    async fn test_unhandled_event_with_unexpected_body_still_resolves_device() {
        let mut mocks = Mocks::new();
        mocks.expect_resolve_only(true);

        let receipt = mocks
            .into_service()
            .handle_event(request(json!({
                "type": "interface_added",
                "interface": { "name": "io.edgehog.devicemanager.SystemInfo" }
            })))
            .await
            .unwrap();

        assert_eq!(
            receipt.outcome,
            EventOutcome::Ignored {
                event_type: "interface_added".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_serial_number_is_stored() {
        let mut mocks = Mocks::new();
        mocks.devices.expect_upsert_device().times(0);
        mocks
            .devices
            .expect_update_serial_number()
            .withf(|input: &UpdateDeviceSerialNumberRepoInput| {
                is_device_a(&input.device) && input.serial_number == "12345"
            })
            .times(1)
            .return_once(|input| {
                upserted(
                    Device {
                        serial_number: Some(input.serial_number),
                        ..device()
                    },
                    false,
                )
            });

        let receipt = mocks
            .into_service()
            .handle_event(request(incoming(
                "io.edgehog.devicemanager.SystemInfo",
                "/serialNumber",
                json!("12345"),
            )))
            .await
            .unwrap();

        assert_eq!(receipt.outcome, EventOutcome::Applied);
    }

    #[tokio::test]
    async fn test_unmatched_part_number_is_stored_without_system_model() {
        let mut mocks = Mocks::new();
        mocks.devices.expect_upsert_device().times(0);
        mocks
            .devices
            .expect_update_part_number()
            .withf(|input: &UpdateDevicePartNumberRepoInput| {
                is_device_a(&input.device) && input.part_number == "PN12345"
            })
            .times(1)
            .return_once(|input| {
                upserted(
                    Device {
                        part_number: Some(input.part_number),
                        ..device()
                    },
                    false,
                )
            });

        let receipt = mocks
            .into_service()
            .handle_event(request(incoming(
                "io.edgehog.devicemanager.SystemInfo",
                "/partNumber",
                json!("PN12345"),
            )))
            .await
            .unwrap();

        assert_eq!(receipt.outcome, EventOutcome::Applied);
    }

    #[tokio::test]
    async fn test_ota_report_moves_pending_to_in_progress() {
        let mut mocks = Mocks::new();
        mocks.devices.expect_upsert_device().times(0);

        let in_progress = OtaOperation {
            operation_id: OPERATION_ID.to_string(),
            tenant_id: "tenant-1".to_string(),
            device_id: "dev-1".to_string(),
            status: OtaOperationStatus::InProgress,
            status_code: None,
            created_at: None,
            updated_at: None,
        };

        mocks
            .ota_operations
            .expect_update_status()
            .withf(|input: &UpdateOtaOperationStatusRepoInput| {
                is_device_a(&input.device)
                    && input.operation_id == OPERATION_ID
                    && input.status == OtaOperationStatus::InProgress
                    && input.status_code.is_none()
            })
            .times(1)
            .return_once(move |_| {
                Ok(OtaStatusUpdate {
                    device: DeviceUpsert {
                        device: device(),
                        created: false,
                    },
                    transition: Some(OtaStatusTransition {
                        previous_status: OtaOperationStatus::Pending,
                        operation: in_progress,
                    }),
                })
            });

        let receipt = mocks
            .into_service()
            .handle_event(request(incoming(
                "io.edgehog.devicemanager.OTAResponse",
                "/response",
                json!({ "uuid": OPERATION_ID, "status": "InProgress" }),
            )))
            .await
            .unwrap();

        assert_eq!(receipt.outcome, EventOutcome::Applied);
        assert_eq!(receipt.device_id, "dev-1");
    }

    #[tokio::test]
    async fn test_ota_report_for_unknown_operation_is_dropped() {
        let mut mocks = Mocks::new();
        mocks
            .ota_operations
            .expect_update_status()
            .times(1)
            .return_once(|_| {
                Ok(OtaStatusUpdate {
                    device: DeviceUpsert {
                        device: device(),
                        created: true,
                    },
                    transition: None,
                })
            });

        let receipt = mocks
            .into_service()
            .handle_event(request(incoming(
                "io.edgehog.devicemanager.OTAResponse",
                "/response",
                json!({ "uuid": OPERATION_ID, "status": "Done" }),
            )))
            .await
            .unwrap();

        assert!(matches!(receipt.outcome, EventOutcome::Dropped { .. }));
        assert_eq!(receipt.device_id, "dev-1");
    }

    #[tokio::test]
    async fn test_unrouted_telemetry_still_resolves_device() {
        let mut mocks = Mocks::new();
        mocks.expect_resolve_only(true);

        let receipt = mocks
            .into_service()
            .handle_event(request(incoming(
                "com.example.Sensors",
                "/temperature",
                json!(21.5),
            )))
            .await
            .unwrap();

        assert_eq!(receipt.outcome, EventOutcome::Unrouted);
        assert_eq!(receipt.device_id, "dev-1");
    }

    #[tokio::test]
    async fn test_undecodable_value_is_rejected_without_mutation() {
        let mut mocks = Mocks::new();
        mocks.expect_resolve_only(false);
        mocks.devices.expect_update_serial_number().times(0);

        let receipt = mocks
            .into_service()
            .handle_event(request(incoming(
                "io.edgehog.devicemanager.SystemInfo",
                "/serialNumber",
                json!(12345),
            )))
            .await
            .unwrap();

        assert!(matches!(receipt.outcome, EventOutcome::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_invalid_payload_writes_nothing() {
        let mut mocks = Mocks::new();
        mocks.devices.expect_upsert_device().times(0);
        mocks.devices.expect_update_online().times(0);

        let result = mocks
            .into_service()
            .handle_event(HandleDeviceEventRequest {
                tenant_slug: "acme".to_string(),
                realm: "acme_realm".to_string(),
                payload: b"{\"event\": {\"type\": \"device_connected\"}}".to_vec(),
            })
            .await;

        assert!(matches!(result, Err(DomainError::InvalidPayload(_))));
    }

    #[tokio::test]
    async fn test_unknown_tenant_or_realm() {
        let mut mocks = Mocks::new();
        mocks.devices.expect_upsert_device().times(0);
        mocks.devices.expect_update_online().times(0);
        let service = mocks.into_service();

        let mut unknown_slug = request(json!({ "type": "device_connected" }));
        unknown_slug.tenant_slug = "globex".to_string();
        assert!(matches!(
            service.handle_event(unknown_slug).await,
            Err(DomainError::UnknownTenantOrRealm(_))
        ));

        let mut wrong_realm = request(json!({ "type": "device_connected" }));
        wrong_realm.realm = "globex_realm".to_string();
        assert!(matches!(
            service.handle_event(wrong_realm).await,
            Err(DomainError::UnknownTenantOrRealm(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_realm_fails_validation() {
        let mocks = Mocks::new();
        let mut req = request(json!({ "type": "device_connected" }));
        req.realm = String::new();

        let result = mocks.into_service().handle_event(req).await;
        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let mut mocks = Mocks::new();
        mocks
            .devices
            .expect_upsert_device()
            .return_once(|_| Err(DomainError::RepositoryError(anyhow::anyhow!("pool timed out"))));

        let result = mocks
            .into_service()
            .handle_event(request(json!({ "type": "device_disconnected" })))
            .await;

        assert!(matches!(result, Err(DomainError::RepositoryError(_))));
    }

    #[test]
    fn test_receipt_serialization() {
        let receipt = DeviceEventReceipt {
            outcome: EventOutcome::Ignored {
                event_type: "device_disconnected".to_string(),
            },
            device_id: "dev-1".to_string(),
        };

        assert_eq!(
            serde_json::to_value(&receipt).unwrap(),
            json!({
                "outcome": "ignored",
                "event_type": "device_disconnected",
                "device_id": "dev-1"
            })
        );
    }
}

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use common::http::{HttpServerConfig, run_http_server};
use tokio_util::sync::CancellationToken;

use crate::domain::DeviceEventService;
use crate::http::{handle_trigger, health};

/// Routes served by the ingestion webhook
pub fn build_router(service: Arc<DeviceEventService>) -> Router {
    Router::new()
        .route("/tenants/:tenant_slug/triggers", post(handle_trigger))
        .route("/health", get(health))
        .with_state(service)
}

/// Run the webhook server with graceful shutdown
pub async fn run_device_events_server(
    config: HttpServerConfig,
    service: Arc<DeviceEventService>,
    cancellation_token: CancellationToken,
) -> Result<(), anyhow::Error> {
    run_http_server(config, build_router(service), cancellation_token).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use crate::http::REALM_HEADER;
    use common::domain::{
        Device, DeviceUpsert, DomainError, MockDeviceRepository, MockOtaOperationRepository,
        MockTenantRepository, Tenant,
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn tenant_repo() -> MockTenantRepository {
        let mut mock = MockTenantRepository::new();
        mock.expect_get_tenant_by_slug().returning(|input| {
            Ok((input.slug == "acme").then(|| Tenant {
                tenant_id: "tenant-1".to_string(),
                slug: "acme".to_string(),
                realm_name: "acme_realm".to_string(),
                created_at: None,
                updated_at: None,
            }))
        });
        mock
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

    fn router(devices: MockDeviceRepository) -> Router {
        build_router(Arc::new(DeviceEventService::new(
            Arc::new(tenant_repo()),
            Arc::new(devices),
            Arc::new(MockOtaOperationRepository::new()),
        )))
    }

    fn trigger(realm: Option<&str>, body: impl Into<Body>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/tenants/acme/triggers")
            .header("content-type", "application/json");
        if let Some(realm) = realm {
            builder = builder.header(REALM_HEADER, realm);
        }
        builder.body(body.into()).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn connected_event() -> String {
        json!({
            "device_id": "DEVICE_A",
            "event": { "type": "device_connected" },
            "timestamp": "2024-01-01T00:00:00Z"
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_trigger_applies_event() {
        let mut devices = MockDeviceRepository::new();
        devices.expect_update_online().return_once(|_| {
            Ok(DeviceUpsert {
                device: Device {
                    online: true,
                    ..device()
                },
                created: true,
            })
        });

        let response = router(devices)
            .oneshot(trigger(Some("acme_realm"), connected_event()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({ "outcome": "applied", "device_id": "dev-1" })
        );
    }

    #[tokio::test]
    async fn test_trigger_without_realm_header_is_not_found() {
        let mut devices = MockDeviceRepository::new();
        devices.expect_upsert_device().times(0);
        devices.expect_update_online().times(0);

        let response = router(devices)
            .oneshot(trigger(None, connected_event()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_trigger_with_wrong_realm_is_not_found() {
        let response = router(MockDeviceRepository::new())
            .oneshot(trigger(Some("other_realm"), connected_event()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_trigger_is_bad_request() {
        let response = router(MockDeviceRepository::new())
            .oneshot(trigger(Some("acme_realm"), "not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_store_failure_is_internal_error() {
        let mut devices = MockDeviceRepository::new();
        devices.expect_update_online().return_once(|_| {
            Err(DomainError::RepositoryError(anyhow::anyhow!(
                "connection refused"
            )))
        });

        let response = router(devices)
            .oneshot(trigger(Some("acme_realm"), connected_event()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_health() {
        let response = router(MockDeviceRepository::new())
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}

use crate::domain::DeviceEventService;
use crate::http::run_device_events_server;
use common::http::HttpServerConfig;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct DeviceEventsApi {
    service: Arc<DeviceEventService>,
    config: HttpServerConfig,
}

impl DeviceEventsApi {
    pub fn new(service: Arc<DeviceEventService>, config: HttpServerConfig) -> Self {
        debug!("Initializing device events API module");
        Self { service, config }
    }

    pub fn into_runner_process(
        self,
    ) -> impl FnOnce(
        CancellationToken,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
    > {
        move |ctx| {
            Box::pin(async move {
                run_device_events_server(self.config, self.service, ctx).await
            })
        }
    }
}

mod config;

use common::postgres::{
    PostgresClient, PostgresDeviceRepository, PostgresOtaOperationRepository,
    PostgresTenantRepository,
};
use common::telemetry::{TelemetryProviders, init_telemetry, shutdown_telemetry};
use crate::config::ServiceConfig;
use device_events::device_events::DeviceEventsApi;
use device_events::domain::DeviceEventService;
use goose::MigrationRunner;
use edgehog_runner::Runner;
use std::sync::Arc;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize telemetry (tracing + OpenTelemetry for traces and logs)
    let telemetry_providers: Option<TelemetryProviders> =
        match init_telemetry(&config.telemetry_config()) {
            Ok(providers) => providers,
            Err(e) => {
                eprintln!("Failed to initialize telemetry: {}", e);
                std::process::exit(1);
            }
        };

    info!(
        otel_enabled = config.otel_enabled,
        otel_endpoint = %config.otel_endpoint,
        "Starting edgehog-all-in-one service"
    );
    debug!("Configuration: {:?}", config);

    let repos = match initialize_postgres(&config).await {
        Ok(repos) => repos,
        Err(e) => {
            error!("Failed to initialize PostgreSQL: {:#}", e);
            std::process::exit(1);
        }
    };

    let device_event_service = Arc::new(DeviceEventService::new(
        repos.tenant,
        repos.device,
        repos.ota_operation,
    ));

    let device_events_api = DeviceEventsApi::new(device_event_service, config.http_server_config());

    Runner::new()
        .with_named_process("device_events", device_events_api.into_runner_process())
        .with_closer(move || async move {
            info!("Running cleanup tasks...");
            // Flush pending traces and logs
            shutdown_telemetry(telemetry_providers);
            info!("Cleanup complete");
            Ok(())
        })
        .with_closer_timeout(config.closer_timeout())
        .run()
        .await;
}

struct PostgresRepositories {
    tenant: Arc<PostgresTenantRepository>,
    device: Arc<PostgresDeviceRepository>,
    ota_operation: Arc<PostgresOtaOperationRepository>,
}

async fn initialize_postgres(config: &ServiceConfig) -> anyhow::Result<PostgresRepositories> {
    info!("Initializing PostgreSQL...");
    let postgres_config = config.postgres_config();

    MigrationRunner::new(
        config.postgres_goose_binary_path.clone(),
        config.postgres_migrations_dir.clone(),
        "postgres".to_string(),
        postgres_config.dsn(),
    )
    .run_migrations()
    .await?;

    let client = PostgresClient::new(&postgres_config)?;
    client.ping().await?;

    Ok(PostgresRepositories {
        tenant: Arc::new(PostgresTenantRepository::new(client.clone())),
        device: Arc::new(PostgresDeviceRepository::new(client.clone())),
        ota_operation: Arc::new(PostgresOtaOperationRepository::new(client)),
    })
}

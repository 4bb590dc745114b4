use crate::domain::{
    Device, DeviceRepository, DeviceUpsert, DomainError, DomainResult,
    LookupSystemModelRepoInput, UpdateDeviceOnlineRepoInput, UpdateDevicePartNumberRepoInput,
    UpdateDeviceSerialNumberRepoInput, UpsertDeviceRepoInput,
};
use crate::postgres::PostgresClient;
use crate::postgres::system_model_repository::lookup_system_model_by_part_number;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Transaction;
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;
use tracing::{debug, instrument};

const DEVICE_COLUMNS: &str = "id, tenant_id, device_identifier, online, serial_number, part_number, system_model_id, created_at, updated_at";

/// Device row for PostgreSQL storage with timestamp metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRow {
    pub id: String,
    pub tenant_id: String,
    pub device_identifier: String,
    pub online: bool,
    pub serial_number: Option<String>,
    pub part_number: Option<String>,
    pub system_model_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Row> for DeviceRow {
    fn from(row: &Row) -> Self {
        DeviceRow {
            id: row.get(0),
            tenant_id: row.get(1),
            device_identifier: row.get(2),
            online: row.get(3),
            serial_number: row.get(4),
            part_number: row.get(5),
            system_model_id: row.get(6),
            created_at: row.get(7),
            updated_at: row.get(8),
        }
    }
}

/// Convert database DeviceRow to domain Device
impl From<DeviceRow> for Device {
    fn from(row: DeviceRow) -> Self {
        Device {
            device_id: row.id, // Map id -> device_id
            tenant_id: row.tenant_id,
            device_identifier: row.device_identifier,
            online: row.online,
            serial_number: row.serial_number,
            part_number: row.part_number,
            system_model_id: row.system_model_id,
            created_at: Some(row.created_at),
            updated_at: Some(row.updated_at),
        }
    }
}

/// Fetch or insert the device row inside an open transaction
///
/// The no-op DO UPDATE locks and returns the existing row on conflict, so
/// concurrent first events for one identifier converge on one record and the
/// row stays locked until the transaction ends. xmax = 0 only holds for a
/// freshly inserted tuple.
pub(crate) async fn upsert_device_in(
    tx: &Transaction<'_>,
    input: &UpsertDeviceRepoInput,
) -> DomainResult<DeviceUpsert> {
    let now = Utc::now();

    let sql = format!(
        "INSERT INTO devices (id, tenant_id, device_identifier, online, created_at, updated_at)
         VALUES ($1, $2, $3, FALSE, $4, $4)
         ON CONFLICT (tenant_id, device_identifier)
         DO UPDATE SET device_identifier = EXCLUDED.device_identifier
         RETURNING {}, (xmax = 0) AS inserted",
        DEVICE_COLUMNS
    );

    let row = tx
        .query_one(
            &sql,
            &[
                &input.device_id,
                &input.tenant_id,
                &input.device_identifier,
                &now,
            ],
        )
        .await
        .map_err(|e| DomainError::RepositoryError(e.into()))?;

    let created: bool = row.get(9);
    let device: Device = DeviceRow::from(&row).into();

    if created {
        debug!(device_id = %device.device_id, "created device record on first event");
    }

    Ok(DeviceUpsert { device, created })
}

/// Run a single-row UPDATE ... RETURNING inside an open transaction
async fn update_device_in(
    tx: &Transaction<'_>,
    sql: &str,
    params: &[&(dyn ToSql + Sync)],
    device_id: &str,
) -> DomainResult<Device> {
    let row = tx
        .query_opt(sql, params)
        .await
        .map_err(|e| DomainError::RepositoryError(e.into()))?;

    match row {
        Some(row) => Ok(DeviceRow::from(&row).into()),
        None => Err(DomainError::DeviceNotFound(device_id.to_string())),
    }
}

/// PostgreSQL implementation of DeviceRepository trait
#[derive(Clone)]
pub struct PostgresDeviceRepository {
    client: PostgresClient,
}

impl PostgresDeviceRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeviceRepository for PostgresDeviceRepository {
    #[instrument(skip(self, input), fields(tenant_id = %input.tenant_id, device_identifier = %input.device_identifier))]
    async fn upsert_device(&self, input: UpsertDeviceRepoInput) -> DomainResult<DeviceUpsert> {
        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let upsert = upsert_device_in(&tx, &input).await?;

        tx.commit()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(upsert)
    }

    #[instrument(skip(self, input), fields(tenant_id = %input.device.tenant_id, device_identifier = %input.device.device_identifier, online = input.online))]
    async fn update_online(&self, input: UpdateDeviceOnlineRepoInput) -> DomainResult<DeviceUpsert> {
        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let upsert = upsert_device_in(&tx, &input.device).await?;

        let sql = format!(
            "UPDATE devices SET online = $3, updated_at = $4
             WHERE tenant_id = $1 AND id = $2
             RETURNING {}",
            DEVICE_COLUMNS
        );

        let now = Utc::now();
        let device = update_device_in(
            &tx,
            &sql,
            &[
                &upsert.device.tenant_id,
                &upsert.device.device_id,
                &input.online,
                &now,
            ],
            &upsert.device.device_id,
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(DeviceUpsert {
            device,
            created: upsert.created,
        })
    }

    #[instrument(skip(self, input), fields(tenant_id = %input.device.tenant_id, device_identifier = %input.device.device_identifier))]
    async fn update_serial_number(
        &self,
        input: UpdateDeviceSerialNumberRepoInput,
    ) -> DomainResult<DeviceUpsert> {
        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let upsert = upsert_device_in(&tx, &input.device).await?;

        let sql = format!(
            "UPDATE devices SET serial_number = $3, updated_at = $4
             WHERE tenant_id = $1 AND id = $2
             RETURNING {}",
            DEVICE_COLUMNS
        );

        let now = Utc::now();
        let device = update_device_in(
            &tx,
            &sql,
            &[
                &upsert.device.tenant_id,
                &upsert.device.device_id,
                &input.serial_number,
                &now,
            ],
            &upsert.device.device_id,
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(DeviceUpsert {
            device,
            created: upsert.created,
        })
    }

    #[instrument(skip(self, input), fields(tenant_id = %input.device.tenant_id, device_identifier = %input.device.device_identifier, part_number = %input.part_number))]
    async fn update_part_number(
        &self,
        input: UpdateDevicePartNumberRepoInput,
    ) -> DomainResult<DeviceUpsert> {
        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let upsert = upsert_device_in(&tx, &input.device).await?;

        let system_model_id = lookup_system_model_by_part_number(
            &tx,
            &LookupSystemModelRepoInput {
                tenant_id: upsert.device.tenant_id.clone(),
                part_number: input.part_number.clone(),
            },
        )
        .await?;

        // An unresolved part number must not erase an association made earlier
        let sql = format!(
            "UPDATE devices
             SET part_number = $3, system_model_id = COALESCE($4, system_model_id), updated_at = $5
             WHERE tenant_id = $1 AND id = $2
             RETURNING {}",
            DEVICE_COLUMNS
        );

        let now = Utc::now();
        let device = update_device_in(
            &tx,
            &sql,
            &[
                &upsert.device.tenant_id,
                &upsert.device.device_id,
                &input.part_number,
                &system_model_id,
                &now,
            ],
            &upsert.device.device_id,
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(DeviceUpsert {
            device,
            created: upsert.created,
        })
    }
}

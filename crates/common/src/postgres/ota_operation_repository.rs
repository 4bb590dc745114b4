use crate::domain::{
    DomainError, DomainResult, OtaOperation, OtaOperationRepository, OtaOperationStatus,
    OtaStatusTransition, OtaStatusUpdate, UpdateOtaOperationStatusRepoInput,
};
use crate::postgres::PostgresClient;
use crate::postgres::device_repository::upsert_device_in;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use tracing::{debug, instrument};

/// OTA operation row for PostgreSQL storage
#[derive(Debug, Clone)]
pub struct OtaOperationRow {
    pub id: String,
    pub tenant_id: String,
    pub device_id: String,
    pub status: String,
    pub status_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Row> for OtaOperationRow {
    fn from(row: &Row) -> Self {
        OtaOperationRow {
            id: row.get(0),
            tenant_id: row.get(1),
            device_id: row.get(2),
            status: row.get(3),
            status_code: row.get(4),
            created_at: row.get(5),
            updated_at: row.get(6),
        }
    }
}

impl TryFrom<OtaOperationRow> for OtaOperation {
    type Error = DomainError;

    fn try_from(row: OtaOperationRow) -> Result<Self, Self::Error> {
        let status = parse_status(&row.status)?;

        Ok(OtaOperation {
            operation_id: row.id,
            tenant_id: row.tenant_id,
            device_id: row.device_id,
            status,
            status_code: row.status_code,
            created_at: Some(row.created_at),
            updated_at: Some(row.updated_at),
        })
    }
}

fn parse_status(value: &str) -> DomainResult<OtaOperationStatus> {
    value
        .parse::<OtaOperationStatus>()
        .map_err(|e| DomainError::RepositoryError(anyhow::anyhow!(e)))
}

/// PostgreSQL implementation of OtaOperationRepository trait
#[derive(Clone)]
pub struct PostgresOtaOperationRepository {
    client: PostgresClient,
}

impl PostgresOtaOperationRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OtaOperationRepository for PostgresOtaOperationRepository {
    #[instrument(skip(self, input), fields(tenant_id = %input.device.tenant_id, operation_id = %input.operation_id, status = %input.status))]
    async fn update_status(
        &self,
        input: UpdateOtaOperationStatusRepoInput,
    ) -> DomainResult<OtaStatusUpdate> {
        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let device = upsert_device_in(&tx, &input.device).await?;
        let tenant_id = &device.device.tenant_id;

        // Row lock keeps the previous status accurate for this transition
        let previous = tx
            .query_opt(
                "SELECT status FROM ota_operations
                 WHERE tenant_id = $1 AND id = $2
                 FOR UPDATE",
                &[tenant_id, &input.operation_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let transition = match previous {
            Some(row) => {
                let previous_status = parse_status(row.get(0))?;
                let now = Utc::now();

                let row = tx
                    .query_one(
                        "UPDATE ota_operations
                         SET status = $3, status_code = $4, updated_at = $5
                         WHERE tenant_id = $1 AND id = $2
                         RETURNING id, tenant_id, device_id, status, status_code, created_at, updated_at",
                        &[
                            tenant_id,
                            &input.operation_id,
                            &input.status.as_str(),
                            &input.status_code,
                            &now,
                        ],
                    )
                    .await
                    .map_err(|e| DomainError::RepositoryError(e.into()))?;

                debug!(previous = %previous_status, "updated OTA operation status");

                Some(OtaStatusTransition {
                    previous_status,
                    operation: OtaOperationRow::from(&row).try_into()?,
                })
            }
            None => None,
        };

        tx.commit()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(OtaStatusUpdate { device, transition })
    }
}

use crate::domain::{DomainError, DomainResult, GetTenantBySlugRepoInput, Tenant, TenantRepository};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

/// Tenant row for PostgreSQL storage
#[derive(Debug, Clone)]
pub struct TenantRow {
    pub id: String,
    pub slug: String,
    pub realm_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TenantRow> for Tenant {
    fn from(row: TenantRow) -> Self {
        Tenant {
            tenant_id: row.id,
            slug: row.slug,
            realm_name: row.realm_name,
            created_at: Some(row.created_at),
            updated_at: Some(row.updated_at),
        }
    }
}

/// PostgreSQL implementation of TenantRepository trait
#[derive(Clone)]
pub struct PostgresTenantRepository {
    client: PostgresClient,
}

impl PostgresTenantRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TenantRepository for PostgresTenantRepository {
    #[instrument(skip(self, input), fields(slug = %input.slug))]
    async fn get_tenant_by_slug(
        &self,
        input: GetTenantBySlugRepoInput,
    ) -> DomainResult<Option<Tenant>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                "SELECT id, slug, realm_name, created_at, updated_at
                 FROM tenants
                 WHERE slug = $1",
                &[&input.slug],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        match row {
            Some(row) => {
                let tenant_row = TenantRow {
                    id: row.get(0),
                    slug: row.get(1),
                    realm_name: row.get(2),
                    created_at: row.get(3),
                    updated_at: row.get(4),
                };
                debug!(tenant_id = %tenant_row.id, "resolved tenant");
                Ok(Some(tenant_row.into()))
            }
            None => Ok(None),
        }
    }
}

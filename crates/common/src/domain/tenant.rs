use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Tenant as seen by the ingestion pipeline
///
/// Tenants are provisioned elsewhere; this crate only resolves them by slug
/// and checks that inbound events come from the realm the tenant is bound to.
#[derive(Debug, Clone, PartialEq)]
pub struct Tenant {
    pub tenant_id: String,
    pub slug: String,
    pub realm_name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Tenant {
    /// Whether an event delivered for `realm` may be applied to this tenant
    pub fn accepts_realm(&self, realm: &str) -> bool {
        self.realm_name == realm
    }
}

/// Repository input for resolving a tenant from the webhook path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetTenantBySlugRepoInput {
    pub slug: String,
}

/// Read-only tenant lookup
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TenantRepository: Send + Sync {
    /// Get a tenant by its unique slug
    async fn get_tenant_by_slug(
        &self,
        input: GetTenantBySlugRepoInput,
    ) -> DomainResult<Option<Tenant>>;
}

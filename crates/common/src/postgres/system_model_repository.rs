use crate::domain::{DomainError, DomainResult, LookupSystemModelRepoInput};
use deadpool_postgres::Transaction;
use tracing::{debug, instrument};

/// Resolve a part number to the system model of the tenant it belongs to
///
/// Runs inside the transaction that stores the part number; the mapping row is
/// share-locked until that transaction ends.
#[instrument(skip(tx, input), fields(tenant_id = %input.tenant_id, part_number = %input.part_number))]
pub(crate) async fn lookup_system_model_by_part_number(
    tx: &Transaction<'_>,
    input: &LookupSystemModelRepoInput,
) -> DomainResult<Option<String>> {
    let row = tx
        .query_opt(
            "SELECT system_model_id
             FROM system_model_part_numbers
             WHERE tenant_id = $1 AND part_number = $2
             FOR SHARE",
            &[&input.tenant_id, &input.part_number],
        )
        .await
        .map_err(|e| DomainError::RepositoryError(e.into()))?;

    let system_model_id: Option<String> = row.map(|row| row.get(0));
    debug!(found = system_model_id.is_some(), "looked up part number");

    Ok(system_model_id)
}

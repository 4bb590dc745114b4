/// Lookup of a part number within a tenant
///
/// Part number mappings are created elsewhere; this pipeline only reads them,
/// inside the transaction that stores a device's part number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupSystemModelRepoInput {
    pub tenant_id: String,
    pub part_number: String,
}

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid event payload: {0}")]
    InvalidPayload(String),

    #[error("Unknown tenant or realm: {0}")]
    UnknownTenantOrRealm(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("OTA operation not found: {0}")]
    OperationNotFound(String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

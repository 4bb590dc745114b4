mod client;
mod config;
mod device_repository;
mod ota_operation_repository;
mod system_model_repository;
mod tenant_repository;

pub use client::*;
pub use config::*;
pub use device_repository::*;
pub use ota_operation_repository::*;
pub use system_model_repository::*;
pub use tenant_repository::*;

mod device;
mod ota_operation;
mod result;
mod system_model;
mod tenant;

pub use device::*;
pub use ota_operation::*;
pub use result::*;
pub use system_model::*;
pub use tenant::*;

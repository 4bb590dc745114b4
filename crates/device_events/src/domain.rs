mod device_event_service;
mod device_resolver;
mod device_state_reconciler;
mod event_envelope;
mod interface_router;
mod ota_operation_tracker;

pub use device_event_service::*;
pub use device_resolver::*;
pub use device_state_reconciler::*;
pub use event_envelope::*;
pub use interface_router::*;
pub use ota_operation_tracker::*;

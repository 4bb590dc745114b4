pub mod device_events;
pub mod domain;
pub mod http;

pub use device_events::*;
pub use domain::*;
pub use http::*;

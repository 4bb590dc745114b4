mod error;
mod logging;
mod otel_tracing;
mod server;

pub use error::*;
pub use logging::*;
pub use otel_tracing::*;
pub use server::*;

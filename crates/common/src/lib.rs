pub mod domain;
pub mod garde;
pub mod http;
pub mod postgres;
pub mod telemetry;

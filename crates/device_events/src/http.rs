mod server;
mod webhook_handler;

pub use server::*;
pub use webhook_handler::*;

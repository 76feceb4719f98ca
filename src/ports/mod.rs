//! Port traits at the I/O seams of the core.

pub mod config_port;
pub mod model_store_port;
pub mod price_port;
pub mod report_port;

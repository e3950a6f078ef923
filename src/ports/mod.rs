//! Port traits at the edges of the engine.

pub mod config_port;
pub mod indicator_port;
pub mod report_port;

//! Core domain types and logic.

pub mod alerts;
pub mod alignment;
pub mod allocation;
pub mod config_validation;
pub mod cycle;
pub mod engine_config;
pub mod error;
pub mod evaluation;
pub mod phase;
pub mod screening;
pub mod sector;
pub mod snapshot;
pub mod step_table;
pub mod timing;
pub mod valuation;

/// Shared modules for the OracleX dashboard
pub mod config;
pub mod coordinator;
pub mod debug_log;
pub mod merge;
pub mod narrative;
pub mod presentation;
pub mod state;
pub mod view;

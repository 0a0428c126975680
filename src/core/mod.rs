// Public modules
pub mod command;
pub mod config;
pub mod context;
pub mod database;
pub mod error;
pub mod plan;
pub mod releases;
pub mod role;
pub mod runner;
pub mod ssh;
pub mod tasks;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};

//! Application-level utilities for the Lockbox CLI.
//!
//! This module provides:
//! - The per-invocation context (`AppContext`)
//! - Path resolution for config and the data directory
//! - Master password handling with retry logic

mod context;
mod resolver;
mod unlock;

pub use context::AppContext;
pub use resolver::{missing_store_message, resolve_config_path};
pub use unlock::unlock_vault;

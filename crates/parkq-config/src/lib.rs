//! # Parkq Config
//!
//! Configuration management for parkq.
//! Supports layered configuration from files and environment variables,
//! validated once at start-up.

mod app_config;
mod loader;
mod policy;
mod validation;

pub use app_config::*;
pub use loader::*;
pub use policy::*;
pub use validation::*;

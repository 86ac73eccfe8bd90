//! # Parkq Server Library
//!
//! Wiring for the parkq server: builds the queue, the lease monitor and the
//! HTTP router from configuration, and runs them until shutdown.

pub mod app;
pub mod startup;

pub use app::App;

//! # Parkq REST
//!
//! REST API layer using Axum for parkq.
//! Provides the producer and worker endpoints of the lookup queue, plus
//! health checks, Prometheus metrics and Swagger UI.

pub mod controllers;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod responses;
pub mod router;
pub mod state;

pub use router::*;
pub use state::*;

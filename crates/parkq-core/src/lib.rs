//! # Parkq Core
//!
//! Error types, result aliases and request validation helpers shared by
//! every parkq crate.

pub mod error;
pub mod result;
pub mod validation;

pub use error::*;
pub use result::*;
pub use validation::*;

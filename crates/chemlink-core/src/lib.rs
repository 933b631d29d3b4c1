//! # chemlink-core
//!
//! Core types, traits, and abstractions for the chemlink chemistry service.
//!
//! This crate provides the request and record types, the error type, and the
//! trait seams that the engine, pipeline, search, and API crates depend on.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;

//! Ocibom Core - Foundational Types and Abstractions
//!
//! This module provides the error type and the bounded worker pool used
//! across the ocibom SBOM generator.

pub mod error;
pub mod pool;

// Re-export commonly used types
pub use error::{BomError, Result};
pub use pool::WorkerPool;

/// Ocibom version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

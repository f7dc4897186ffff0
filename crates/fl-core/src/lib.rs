//! farmlog/crates/fl-core/src/lib.rs
//!
//! The central domain model, authority rules and port definitions for Farmlog.

pub mod error;
pub mod models;
pub mod policy;
pub mod traits;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use traits::*;
